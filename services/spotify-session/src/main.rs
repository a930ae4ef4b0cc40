//! Spotify session CLI
//!
//! Single binary that:
//! 1. Loads configuration (file, env, flags)
//! 2. Logs in with Authorization Code + PKCE, serving the callback page
//!    on the loopback redirect address
//! 3. Persists the session to a file between runs
//! 4. Makes authenticated Web API calls (or canned ones in dev mode)

mod callback;
mod config;
mod error;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spotify_api::{ApiResponse, FetchRequest, LiveApi, Method, MockApi, MusicApi};
use spotify_auth::{Clock, FileStore, LoginOptions, MemoryAgent, SessionManager, SystemClock};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::callback::BrowserAgent;
use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "spotify-session", version, about = "Log in to Spotify and call the Web API")]
struct Cli {
    /// Config file (default: $CONFIG_PATH, then ./spotify-session.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Serve canned API data without logging in
    #[arg(long, global = true)]
    dev: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in through the browser
    Login {
        /// Show the consent dialog even if access was granted before
        #[arg(long)]
        force: bool,
    },
    /// Show whether a valid session exists
    Status,
    /// Print the current access token
    Token,
    /// Forget the stored session
    Logout,
    /// Call a Web API path, e.g. `/me` or `/me/top/tracks?limit=5`
    Fetch {
        path: String,
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,
        /// JSON request body
        #[arg(long, short = 'd')]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let (config_path, explicit) = Config::resolve_path(cli.config.as_deref());
    let mut config = if explicit {
        Config::load(&config_path)
    } else {
        Config::load_or_default(&config_path)
    }
    .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    config.dev_mode |= cli.dev;

    info!(
        path = %config_path.display(),
        session_file = %config.storage.session_file.display(),
        dev_mode = config.dev_mode,
        "configuration loaded"
    );

    let page = Arc::new(MemoryAgent::new());
    let session = Arc::new(build_session(&config, page.clone())?);

    match cli.command {
        Command::Login { force } => run_login(&config, session, page, force).await,
        Command::Status => {
            println!("{}", status_line(&config, &session, SystemClock.now_millis()));
            Ok(())
        }
        Command::Token => {
            if config.dev_mode {
                anyhow::bail!("dev mode has no access token");
            }
            let token = session
                .get_access_token()
                .context("not logged in, run `spotify-session login`")?;
            println!("{}", token.expose());
            Ok(())
        }
        Command::Logout => {
            session.logout();
            println!("Logged out.");
            Ok(())
        }
        Command::Fetch { path, method, body } => {
            let request = fetch_request(&method, body.as_deref())?;
            let api: Box<dyn MusicApi> = if config.dev_mode {
                Box::new(MockApi::new())
            } else {
                Box::new(LiveApi::new(session))
            };
            info!(api = api.id(), path = %path, "fetching");
            match api.fetch(&path, request).await? {
                ApiResponse::NoContent => println!("204 No Content"),
                ApiResponse::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            }
            Ok(())
        }
    }
}

/// Initialize tracing on stderr with LOG_LEVEL / RUST_LOG support.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn build_session(config: &Config, page: Arc<MemoryAgent>) -> Result<SessionManager> {
    let store = FileStore::open(config.storage.session_file.clone()).with_context(|| {
        format!(
            "failed to open session file {}",
            config.storage.session_file.display()
        )
    })?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    Ok(SessionManager::new(
        config.auth_config(),
        Arc::new(store),
        Arc::new(BrowserAgent::new(page)),
        http,
    ))
}

async fn run_login(
    config: &Config,
    session: Arc<SessionManager>,
    page: Arc<MemoryAgent>,
    force: bool,
) -> Result<()> {
    if config.dev_mode {
        println!("Dev mode: login skipped, API calls are answered with canned data.");
        return Ok(());
    }
    if !force && session.is_authed() {
        println!("{}", status_line(config, &session, SystemClock.now_millis()));
        println!("Use --force to log in again.");
        return Ok(());
    }

    let wait = Duration::from_secs(config.http.login_timeout_secs);
    tokio::select! {
        result = callback::login(session.clone(), page, LoginOptions { force }, wait) => {
            result.context("login failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("login cancelled");
        }
    }

    println!("{}", status_line(config, &session, SystemClock.now_millis()));
    Ok(())
}

fn status_line(config: &Config, session: &SessionManager, now_millis: u64) -> String {
    if config.dev_mode {
        return "Dev mode: authenticated against the mock API.".into();
    }
    match session.expires_at() {
        Some(expires_at) if session.is_authed() => format!(
            "Logged in to Spotify, token valid for {}.",
            format_remaining(expires_at.saturating_sub(now_millis))
        ),
        _ => "Not logged in.".into(),
    }
}

fn format_remaining(millis: u64) -> String {
    let secs = millis / 1000;
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}

fn fetch_request(method: &str, body: Option<&str>) -> Result<FetchRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method: {method}"))?;
    let mut request = FetchRequest::new(method);
    if let Some(body) = body {
        let value = serde_json::from_str(body).context("--body is not valid JSON")?;
        request = request.with_body(value);
    }
    Ok(request)
}
