use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use watchpost_api_client::{ApiClient, CredentialStore};

use crate::config::CliConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build an API client for the configured server. Basic auth is attached
/// when the config carries a user.
pub fn build(config: &CliConfig) -> Result<ApiClient> {
    let credentials = if config.server.user.trim().is_empty() {
        CredentialStore::new()
    } else {
        CredentialStore::with_basic(&config.server.user, &config.server.password)
    };
    ApiClient::new(&config.server.url, REQUEST_TIMEOUT, Arc::new(credentials))
        .with_context(|| format!("Failed to create client for {}", config.server.url))
}
