//! `kubedeck`: operator CLI for the identity store.
//!
//! Usage:
//!   kubedeck -c <context-name-or-path> <command>
//!
//! The context name resolves to `/etc/kubedeck/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use commands::search::SearchArgs;
use config::ServerConfig;
use identity::{IdentityService, LdapConnector};
use kubedeck_store::Store;

/// Kubedeck identity CLI.
#[derive(Parser, Debug)]
#[command(name = "kubedeck", about = "Kubedeck identity and directory CLI")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", default_value = "./kubedeck.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Local users.
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Role bindings.
    Bindings {
        #[command(subcommand)]
        action: SearchOnly,
    },

    /// Audit logs.
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },

    /// Image repositories.
    Repos {
        #[command(subcommand)]
        action: SearchOnly,
    },

    /// External directory (LDAP) management.
    Directory {
        #[command(subcommand)]
        action: DirectoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum UsersAction {
    /// Search users.
    Search(SearchArgs),

    /// Authenticate a directory user against the directory.
    Login {
        name: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Subcommand, Debug)]
enum SearchOnly {
    /// Filtered, paged listing.
    Search(SearchArgs),
}

#[derive(Subcommand, Debug)]
enum LogsAction {
    /// Operation logs.
    Operations(SearchArgs),
    /// Login logs.
    Logins(SearchArgs),
}

#[derive(Subcommand, Debug)]
enum DirectoryAction {
    /// Show the configured directory (password redacted).
    Show,

    /// Create or replace the directory from a JSON or TOML descriptor file.
    Configure { file: PathBuf },

    /// Remove the directory. Provisioned users are kept.
    Delete,

    /// Connect and count the entries the search matches.
    TestConnect {
        /// Descriptor file to test instead of the stored one.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Bind as a directory user.
    TestLogin {
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
    },

    /// List directory users that could be imported.
    Preview,

    /// Import users from a candidates file, or every available directory user.
    Import {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Sync the directory into local users and wait for the report.
    Sync,
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();
}

fn open_service(config: &ServerConfig) -> anyhow::Result<Arc<IdentityService>> {
    if let Some(data_dir) = &config.storage.data_dir {
        std::fs::create_dir_all(data_dir)?;
    }
    let db_path = config.storage.resolve_db_path();
    info!("Opening store at {}", db_path.display());
    let store = Arc::new(Store::open(&db_path)?);

    let directory = config.directory_config();
    let connector = Arc::new(LdapConnector::new(directory.connect_timeout));
    Ok(IdentityService::new(store, connector, directory))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    let server_config = ServerConfig::load(&config_path)?;
    init_tracing(&server_config.log.level);
    info!("Loaded configuration from {}", config_path.display());

    let svc = open_service(&server_config)?;

    match cli.command {
        Commands::Users { action } => match action {
            UsersAction::Search(args) => commands::search::users(&svc, &args),
            UsersAction::Login { name, password } => {
                commands::users::login(&svc, &name, &password).await
            }
        },
        Commands::Bindings { action: SearchOnly::Search(args) } => {
            commands::search::role_bindings(&svc, &args)
        }
        Commands::Logs { action } => match action {
            LogsAction::Operations(args) => commands::search::operation_logs(&svc, &args),
            LogsAction::Logins(args) => commands::search::login_logs(&svc, &args),
        },
        Commands::Repos { action: SearchOnly::Search(args) } => {
            commands::search::image_repos(&svc, &args)
        }
        Commands::Directory { action } => match action {
            DirectoryAction::Show => commands::directory::show(&svc),
            DirectoryAction::Configure { file } => {
                commands::directory::configure(&svc, &file).await
            }
            DirectoryAction::Delete => commands::directory::delete(&svc),
            DirectoryAction::TestConnect { file } => {
                commands::directory::test_connect(&svc, file.as_deref()).await
            }
            DirectoryAction::TestLogin { user, password } => {
                commands::directory::test_login(&svc, &user, &password).await
            }
            DirectoryAction::Preview => commands::directory::preview(&svc).await,
            DirectoryAction::Import { file } => {
                commands::directory::import(&svc, file.as_deref()).await
            }
            DirectoryAction::Sync => commands::directory::sync(&svc).await,
        },
    }
}
