use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use watchpost_sync::{MessageWindow, PollInterval};

pub const CONFIG_FILE_NAME: &str = "watchpost.toml";

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

/// Defaults for `watchpost watch`, overridable per invocation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WatchConfig {
    #[serde(default)]
    pub interval: PollInterval,
    #[serde(default)]
    pub window: MessageWindow,
    #[serde(default)]
    pub include_inactive: bool,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            user: String::new(),
            password: String::new(),
        }
    }
}

/// Get the config directory path (~/.config/watchpost/)
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("watchpost"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

fn load_from(path: &Path) -> Result<CliConfig> {
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))
}

fn save_to(path: &Path, config: &CliConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;
    Ok(())
}

/// Load config from disk, returning defaults if the file does not exist.
pub fn load_config() -> Result<CliConfig> {
    load_from(&config_path()?)
}

/// Save config to disk.
pub fn save_config(config: &CliConfig) -> Result<()> {
    save_to(&config_path()?, config)
}

/// Print current config.
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    let path = config_path()?;
    println!("Config file: {}", path.display());
    println!();
    println!("[server]");
    println!("  url      = {}", config.server.url);
    println!(
        "  user     = {}",
        if config.server.user.is_empty() {
            "(not set)"
        } else {
            &config.server.user
        }
    );
    println!(
        "  password = {}",
        if config.server.password.is_empty() {
            "(not set)"
        } else {
            "(set)"
        }
    );
    println!();
    println!("[watch]");
    println!("  interval         = {}", config.watch.interval);
    println!("  window           = {}", config.watch.window);
    println!("  include_inactive = {}", config.watch.include_inactive);
    Ok(())
}

/// Update config with provided values.
pub fn set_config(
    server: Option<String>,
    user: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let mut config = load_config()?;

    if let Some(url) = server {
        config.server.url = url;
    }
    if let Some(user) = user {
        config.server.user = user;
    }
    if let Some(password) = password {
        config.server.password = password;
    }

    save_config(&config)?;
    println!("Configuration updated.");
    show_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("temp dir");
        let config = load_from(&dir.path().join(CONFIG_FILE_NAME)).expect("load defaults");
        assert_eq!(config.server.url, DEFAULT_SERVER_URL);
        assert!(config.server.user.is_empty());
        assert_eq!(config.watch.interval, PollInterval::S5);
        assert_eq!(config.watch.window, MessageWindow::Min30);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = CliConfig::default();
        config.server.url = "https://watch.example.net".to_string();
        config.server.user = "ops".to_string();
        config.watch.interval = PollInterval::S1;
        config.watch.window = MessageWindow::Hour1;
        save_to(&path, &config).expect("save config");

        let loaded = load_from(&path).expect("load config");
        assert_eq!(loaded.server.url, "https://watch.example.net");
        assert_eq!(loaded.server.user, "ops");
        assert_eq!(loaded.watch.interval, PollInterval::S1);
        assert_eq!(loaded.watch.window, MessageWindow::Hour1);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[server]\nurl = \"http://box:9000\"\n").expect("write config");

        let loaded = load_from(&path).expect("load config");
        assert_eq!(loaded.server.url, "http://box:9000");
        assert_eq!(
            loaded.watch.interval,
            PollInterval::S5,
            "missing sections fall back to defaults"
        );
    }
}
