mod action;
mod client;
mod config;
mod list;
mod show;
mod watch;

use clap::{Parser, Subcommand, ValueEnum};
use watchpost_api::EntityAction;
use watchpost_sync::{MessageWindow, PollInterval};

#[derive(Parser)]
#[command(
    name = "watchpost",
    about = "watchpost CLI - follow long-running processes from the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List monitored entities
    List {
        /// Only entities on this host
        #[arg(long, conflicts_with = "ip")]
        host: Option<String>,

        /// Only entities reporting from this IP
        #[arg(long)]
        ip: Option<String>,

        /// Include entities that have already exited
        #[arg(long)]
        inactive: bool,
    },

    /// List hosts with monitored entities
    Hosts {
        /// Count hosts whose entities have all exited
        #[arg(long)]
        inactive: bool,
    },

    /// List IPs with monitored entities
    Ips {
        /// Count IPs whose entities have all exited
        #[arg(long)]
        inactive: bool,
    },

    /// Show one entity: introduction, liveness, exit record
    Show {
        /// Entity id
        id: String,
    },

    /// Follow an entity live until it exits or ctrl-c
    Watch {
        /// Entity id
        id: String,

        /// Poll cadence (off, 100ms, 0.5s, 1s, 5s, 10s, 30s)
        #[arg(long)]
        interval: Option<PollInterval>,

        /// How far back messages start (all, 1d, 1h, 30m, 15m, 5m)
        #[arg(long)]
        window: Option<MessageWindow>,
    },

    /// Ask the agent to restart or exit an entity
    Action {
        /// Entity id
        id: String,

        /// What the agent should do
        #[arg(value_enum)]
        verb: ActionVerb,
    },

    /// Delete an entity and its recorded history
    Delete {
        /// Entity id
        id: String,
    },

    /// Show or set configuration
    Config {
        /// Set the server URL
        #[arg(long)]
        server: Option<String>,

        /// Set the basic-auth user
        #[arg(long)]
        user: Option<String>,

        /// Set the basic-auth password
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionVerb {
    Restart,
    Exit,
}

impl From<ActionVerb> for EntityAction {
    fn from(verb: ActionVerb) -> Self {
        match verb {
            ActionVerb::Restart => EntityAction::Restart,
            ActionVerb::Exit => EntityAction::Exit,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List { host, ip, inactive } => list::run_list(host, ip, inactive).await,
        Commands::Hosts { inactive } => list::run_hosts(inactive).await,
        Commands::Ips { inactive } => list::run_ips(inactive).await,
        Commands::Show { id } => show::run_show(&id).await,
        Commands::Watch {
            id,
            interval,
            window,
        } => watch::run_watch(&id, interval, window).await,
        Commands::Action { id, verb } => action::run_action(&id, verb.into()).await,
        Commands::Delete { id } => action::run_delete(&id).await,
        Commands::Config {
            server,
            user,
            password,
        } => {
            if server.is_none() && user.is_none() && password.is_none() {
                config::show_config()
            } else {
                config::set_config(server, user, password)
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
