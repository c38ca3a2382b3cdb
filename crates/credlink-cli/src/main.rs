//! `credlink` CLI: operator checks for backend connection configs.
//!
//! Loads a JSON connection config from disk and drives a connection producer
//! with the HTTP connector: validate the config, dial the remote system, or
//! attempt a credential rotation. Secrets are scrubbed from everything the
//! tool prints.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;

use credlink_core::{
    ConnectionProducer, ErrorKind, HttpConnector, ProducerError, ProducerSettings, Statements,
    StaticUserConfig,
};

/// Exit code for config payloads that cannot be used.
const EXIT_CONFIG: u8 = 2;
/// Exit code for failures reaching the remote system.
const EXIT_CONNECTION: u8 = 3;
/// Exit code for operations the backend does not support.
const EXIT_UNSUPPORTED: u8 = 4;

/// credlink: connection and credential lifecycle checks.
#[derive(Parser)]
#[command(
    name = "credlink",
    version,
    about = "credlink CLI: validate connection configs and test credential backends",
    long_about = None,
    after_help = "Environment variables:\n  \
         CREDLINK_CONFIG           Path to the JSON connection config\n  \
         CREDLINK_LOG_LEVEL        Log filter (default: warn)\n  \
         CREDLINK_DEFAULT_PORT     Port for endpoints without one (default: 8086)\n  \
         CREDLINK_CONNECT_TIMEOUT  Dial timeout in seconds (default: 10)\n\n\
         Examples:\n  \
         credlink check --config backend.json\n  \
         credlink check --config backend.json --verify\n  \
         credlink rotate --config backend.json --username svc-app --password '...'"
)]
struct Cli {
    /// Path to the JSON connection config.
    #[arg(long, short, global = true, env = "CREDLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, overridden by `RUST_LOG`.
    #[arg(long, global = true, env = "CREDLINK_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a config and print it with secrets redacted.
    Check {
        /// Also dial the remote system to verify the config.
        #[arg(long)]
        verify: bool,
    },
    /// Dial the remote system and report the resolved address.
    Connect,
    /// Set the password of an existing principal.
    Rotate {
        /// Account whose password is set.
        #[arg(long)]
        username: String,
        /// New password.
        #[arg(long, env = "CREDLINK_NEW_PASSWORD", hide_env_values = true)]
        password: String,
        /// Rotation statement; may be repeated.
        #[arg(long = "statement")]
        statements: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Some(path) = cli.config.as_deref() else {
        bail!("no config given, pass --config or set CREDLINK_CONFIG");
    };
    let raw = load_config(path)?;

    let settings = ProducerSettings::from_env();
    let producer = ConnectionProducer::with_settings(HttpConnector::new(&settings), settings);
    info!(path = %path.display(), backend = producer.type_name(), "loaded config");

    match cli.command {
        Command::Check { verify } => check(&producer, raw, verify).await,
        Command::Connect => connect(&producer, raw).await,
        Command::Rotate {
            username,
            password,
            statements,
        } => {
            let user = StaticUserConfig {
                username,
                password,
                expiration: None,
            };
            rotate(&producer, raw, &Statements { commands: statements }, &user).await
        }
    }
}

fn load_config(path: &Path) -> Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("config file {} is not valid JSON", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("config file {} must contain a JSON object", path.display()),
    }
}

async fn check(
    producer: &ConnectionProducer<HttpConnector>,
    raw: Map<String, Value>,
    verify: bool,
) -> Result<()> {
    producer
        .initialize(raw, verify)
        .await
        .context("config rejected")?;

    let redacted = producer.redacted_config().await.unwrap_or_default();
    let rendered = serde_json::to_string_pretty(&Value::Object(redacted))
        .context("failed to render config")?;
    println!("{rendered}");

    if let Some(config) = producer.config().await {
        println!("address: {}", config.address());
    }
    if verify {
        println!("connection verified");
    }
    Ok(())
}

async fn connect(producer: &ConnectionProducer<HttpConnector>, raw: Map<String, Value>) -> Result<()> {
    producer
        .initialize(raw, false)
        .await
        .context("config rejected")?;
    let connection = producer.connection().await.context("connection failed")?;
    println!("connected to {}", connection.base_url());
    producer.close().await.context("close failed")?;
    Ok(())
}

async fn rotate(
    producer: &ConnectionProducer<HttpConnector>,
    raw: Map<String, Value>,
    statements: &Statements,
    user: &StaticUserConfig,
) -> Result<()> {
    producer
        .initialize(raw, false)
        .await
        .context("config rejected")?;
    let credentials = producer
        .set_credentials(statements, user)
        .await
        .with_context(|| format!("rotation for '{}' failed", user.username))?;
    println!("credentials set for {}", credentials.username);
    producer.close().await.context("close failed")?;
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(producer_err) = err.downcast_ref::<ProducerError>() else {
        return 1;
    };
    match producer_err.kind() {
        ErrorKind::ConfigDecodeError | ErrorKind::InvalidConfig => EXIT_CONFIG,
        ErrorKind::ConnectionFailed | ErrorKind::ConnectionVerificationFailed => EXIT_CONNECTION,
        ErrorKind::NotImplemented => EXIT_UNSUPPORTED,
        _ => 1,
    }
}
