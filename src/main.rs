use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pawcare_session::error::ConfigError;
use pawcare_session::guard::{self, GuardDecision, RouteRequirement};
use pawcare_session::{AuthContext, AuthError, Credentials, HttpAuthApi, RegistrationFields, SessionConfig, SessionStorage};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{}", .0.user_message())]
    Auth(#[from] AuthError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "pawcare-session", about = "PawCare client session CLI")]
struct Cli {
    /// Backend root, overrides `PAWCARE_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Directory holding the session record, overrides `PAWCARE_SESSION_DIR`.
    #[arg(long)]
    session_dir: Option<String>,

    /// Storage key of the session record, overrides `PAWCARE_SESSION_KEY`.
    #[arg(long)]
    session_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PAWCARE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and store the session.
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PAWCARE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Sign out and revoke the stored token.
    Logout,
    /// Validate the stored session against the backend and print the user.
    Whoami,
    /// Print the stored session without contacting the backend.
    Status,
    /// Restore the session and print the guard decision for a path.
    Guard {
        path: String,
        #[arg(long, default_value_t = false)]
        public: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let storage = SessionStorage::file(&config.session_dir, config.session_key.clone());
    let api = HttpAuthApi::new(&config)?;
    let ctx = AuthContext::new(Arc::new(api), storage.clone());

    match cli.command {
        Command::Login { email, password } => {
            let user = ctx.login(Credentials::new(email, password)).await?;
            println!("signed in as {} <{}>", user.display_name(), user.email);
        }
        Command::Register { first_name, last_name, email, password, phone, role } => {
            let fields = RegistrationFields { first_name, last_name, email, password, phone, role };
            let user = ctx.register(fields).await?;
            println!("registered and signed in as {} <{}>", user.display_name(), user.email);
        }
        Command::Logout => {
            if let Err(e) = ctx.restore().await {
                tracing::debug!(error = %e, "restore before logout failed");
            }
            if ctx.logout().await {
                println!("signed out");
            } else {
                println!("no session under {}", storage.key());
            }
        }
        Command::Whoami => match ctx.restore().await? {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => println!("anonymous"),
        },
        Command::Status => print_status(&storage)?,
        Command::Guard { path, public } => {
            ctx.restore().await?;
            let requirement = if public { RouteRequirement::Public } else { RouteRequirement::RequiresAuth };
            match guard::decide(requirement, ctx.status(), &path, &config.login_path) {
                GuardDecision::Render => println!("render {path}"),
                GuardDecision::Loading => println!("loading"),
                GuardDecision::Redirect { to } => println!("redirect {to}"),
            }
        }
    }
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<SessionConfig, ConfigError> {
    let mut config = SessionConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.api_base_url = pawcare_session::config::normalize_base_url(base_url)?;
    }
    if let Some(dir) = &cli.session_dir {
        config.session_dir = dir.into();
    }
    if let Some(key) = &cli.session_key {
        config.session_key.clone_from(key);
    }
    Ok(config)
}

fn print_status(storage: &SessionStorage) -> Result<(), CliError> {
    let Some(stored) = storage.load() else {
        println!("no stored session under {}", storage.key());
        return Ok(());
    };
    match stored.user {
        Some(user) => println!("stored session under {}: {}", storage.key(), serde_json::to_string(&user)?),
        None => println!("stored session under {}: <no cached user>", storage.key()),
    }
    Ok(())
}
