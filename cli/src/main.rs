//! Connect CLI - drives the route gate from a terminal.
//!
//! # Architecture
//!
//! Every command boots a [`RouteGate`] at some location, backed by file
//! stores under `~/.connect`, and runs its startup sequence once:
//!
//! ```text
//! main() -> boot(url) -> RouteGate::start() -> render / follow redirects -> print View
//! ```
//!
//! `open` waits out loading pages and follows redirects the way a browser
//! would, up to a fixed hop limit.

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use connect_engine::connect_api::{
    AccountsApi, AuthService, ClientRegistry, http_client_with_timeout,
};
use connect_engine::connect_config::bundle::{BuildMode, BundlePlan};
use connect_engine::connect_config::{ConnectConfig, paths};
use connect_engine::connect_core::{
    CredentialStore, FileStore, KeyValueStore, Location, Platform, StaticPlatform,
    TracingReporter, keys, token_expiry,
};
use connect_engine::{GateOptions, LoginForm, RouteGate, Services, SignupForm};
use connect_types::View;

const MAX_REDIRECTS: usize = 8;

#[derive(Parser)]
#[command(name = "connect")]
#[command(version)]
#[command(about = "Terminal client for the Connect vehicle dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a URL or path and print what it renders
    Open {
        /// e.g. `/`, `/auth/`, `/v2/auth/?code=...&provider=google`
        url: String,

        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CONNECT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CONNECT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored access token
    Logout,
    /// Show session and configuration state
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print the web bundle plugin plan as JSON
    BundlePlan {
        /// Shorthand for `--mode production`
        #[arg(long, conflicts_with = "mode")]
        production: bool,
        /// Build mode: development (dev) or production (prod)
        #[arg(long, value_parser = parse_build_mode)]
        mode: Option<BuildMode>,
        #[arg(long, env = "SENTRY_AUTH_TOKEN", hide_env_values = true)]
        sentry_auth_token: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the config file location
    Path,
    /// Write a commented default config
    Init,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Command output goes to stdout; never interleave log lines with it.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.connect/logs/connect.log
    if let Some(path) = paths::log_path() {
        candidates.push(path);
    }

    // Fallback: ./.connect/logs/connect.log
    candidates.push(PathBuf::from(".connect").join("logs").join("connect.log"));

    candidates
}

fn state_file(path: Option<PathBuf>) -> Result<PathBuf> {
    let path = path.context("Could not determine a home directory; set CONNECT_HOME")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
        paths::restrict_dir_permissions(parent)
            .with_context(|| format!("Failed to secure {}", parent.display()))?;
    }
    Ok(path)
}

/// Wires file-backed stores and HTTP clients into a gate at `url`.
fn boot(config: &ConnectConfig, url: &str) -> Result<RouteGate> {
    let location = Location::parse(url)?;
    let durable: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::new(state_file(paths::storage_path())?));
    let session: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::new(state_file(paths::session_path())?));
    let platform: Arc<dyn Platform> = Arc::new(StaticPlatform::new(
        location,
        Arc::clone(&durable),
        Arc::clone(&session),
    ));

    let endpoints = config.api_endpoints();
    let http =
        http_client_with_timeout(endpoints.timeout).context("Failed to build HTTP client")?;

    let services = Services {
        platform,
        credentials: Arc::new(CredentialStore::new(durable, session)),
        clients: Arc::new(ClientRegistry::with_http(&endpoints, &http)),
        auth: AuthService::new(&endpoints.auth, http.clone()),
        accounts: AccountsApi::new(&endpoints.accounts, http),
        reporter: Arc::new(TracingReporter),
    };
    Ok(RouteGate::new(services, GateOptions::from_config(config)))
}

/// Renders the current location, following redirects.
async fn settle(gate: &RouteGate) -> Result<View> {
    gate.start().await;

    let mut hops = 0;
    loop {
        let view = gate.render()?;
        if view == View::Loading {
            gate.wait_until_ready().await;
            continue;
        }
        let Some(to) = view.redirect_target() else {
            return Ok(view);
        };
        if hops == MAX_REDIRECTS {
            bail!("Too many redirects (last target {to})");
        }
        hops += 1;
        gate.navigate(to)?;
    }
}

fn print_view(view: &View, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    match view {
        View::Loading => println!("Loading..."),
        View::Redirect { to } => println!("-> {to}"),
        View::Page { kind, path, body } => {
            println!("[{}] {path}", kind.display_name());
            println!("{body}");
        }
        View::Fallback { message } => println!("{message}"),
    }
    Ok(())
}

fn parse_build_mode(raw: &str) -> Result<BuildMode, String> {
    BuildMode::parse(raw)
        .ok_or_else(|| format!("unknown build mode `{raw}` (expected development or production)"))
}

fn format_expiry(exp: u64) -> String {
    i64::try_from(exp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map_or_else(|| exp.to_string(), |at| at.to_rfc3339())
}

async fn status(config: &ConnectConfig) -> Result<()> {
    let gate = boot(config, "/")?;
    gate.start().await;

    let token = gate.credentials().get_token();
    println!(
        "authenticated: {}",
        if gate.credentials().is_authenticated() { "yes" } else { "no" }
    );
    if let Some(token) = &token {
        match token_expiry(token) {
            Some(exp) => println!("token expires: {}", format_expiry(exp)),
            None => println!("token expires: never"),
        }
    }

    for client in gate.clients().clients() {
        let state = if client.is_configured() {
            "configured"
        } else {
            "not configured"
        };
        println!("{} api: {} ({state})", client.name(), client.base_url());
    }

    let durable = gate.platform().durable();
    if durable.get(keys::PAIR_TOKEN).is_some() {
        println!("pending pairing code: yes");
    }
    if let Some(target) = gate.platform().session().get(keys::REDIRECT_URL) {
        println!("after login: {target}");
    }

    println!("production: {}", config.production());
    if let Some(path) = ConnectConfig::path() {
        println!("config: {}", path.display());
    }
    Ok(())
}

fn config_command(command: &ConfigCommands) -> Result<()> {
    let path = ConnectConfig::path().context("Could not determine config path")?;
    match command {
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init => {
            ConnectConfig::init(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    // `config` must keep working when the file itself is broken.
    let command = match cli.command {
        Commands::Config { command } => return config_command(&command),
        command => command,
    };

    let config = ConnectConfig::load()?.unwrap_or_default();

    match command {
        Commands::Open { url, json } => {
            let gate = boot(&config, &url)?;
            let view = settle(&gate).await?;
            print_view(&view, json)?;
        }
        Commands::Login { email, password } => {
            let gate = boot(&config, connect_engine::LOGIN_PATH)?;
            gate.start().await;

            let mut form = LoginForm::new(email, password);
            gate.submit_login(&mut form).await?;
            if let Some(error) = form.error() {
                bail!("{error}");
            }
            print_view(&settle(&gate).await?, false)?;
        }
        Commands::Signup {
            name,
            email,
            password,
        } => {
            let gate = boot(&config, connect_engine::REGISTER_PATH)?;
            gate.start().await;

            let mut form = SignupForm::new(name, email, password);
            gate.submit_signup(&mut form).await?;
            if let Some(error) = form.error() {
                bail!("{error}");
            }
            println!("Account created. Log in with `connect login`.");
        }
        Commands::Logout => {
            let gate = boot(&config, "/")?;
            gate.start().await;
            gate.log_out();
            println!("Logged out.");
        }
        Commands::Status => status(&config).await?,
        Commands::BundlePlan {
            production,
            mode,
            sentry_auth_token,
        } => {
            let mode = mode.unwrap_or(if production {
                BuildMode::Production
            } else {
                BuildMode::Development
            });
            let plan = BundlePlan::resolve(mode, sentry_auth_token.as_deref());
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Config { command } => config_command(&command)?,
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(err) = &result {
        tracing::error!("Command failed: {err:#}");
    }
    result
}
