// # ddnsd - Cloudflare DDNS Daemon
//
// The ddnsd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from the environment (optionally from `.env`)
// 2. Setting up logging to stdout and the size-capped log file
// 3. Building the resolver, provider, notifier and engine
// 4. Running the engine until SIGINT/SIGTERM
//
// All DDNS logic lives in ddns-core.
//
// ## Configuration
//
// ### Core
// - `CONFIG_JSON`: Path of the domains file (required)
// - `UPDATE_INTERVAL`: Seconds between passes (default 300)
// - `PUBLIC_IP_SERVICE`: Address-echo URL (required unless debug)
// - `PUBLIC_IP_TIMEOUT`: Resolver timeout in seconds (default 10)
// - `APP_DEBUG` / `DEBUG_IP`: Use a fixed IP instead of the service
// - `DDNS_MODE`: `dry-run` logs record updates instead of sending them
//
// ### Logging
// - `LOG_FILE`: Log file path (default /var/log/cloudflare-ddns.log)
// - `LOG_MAX_SIZE_KB`: Size at which the log file is emptied (default 500)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// ### Notifications
// - `NOTIFICATION_EMAIL`: Recipient, notifications are off when unset
// - `MAIL_HOST`, `MAIL_PORT`, `MAIL_ENCRYPTION`: SMTP server (port 465, tls)
// - `MAIL_USERNAME`, `MAIL_PASSWORD`: SMTP credentials
// - `MAIL_FROM_ADDRESS`, `MAIL_FROM_NAME`, `APP_NAME`, `MAIL_TEMPLATE`
//
// ## Example
//
// ```bash
// export CONFIG_JSON=/etc/ddns/config.json
// export PUBLIC_IP_SERVICE=https://api.ipify.org
// export LOG_FILE=/var/log/cloudflare-ddns.log
//
// ddnsd
// ```

use anyhow::{Context, Result};
use ddns_core::{DdnsEngine, DomainsConfig, EngineEvent, LogFile, Notifier, Settings};
use ddns_notify_smtp::SmtpNotifier;
use ddns_provider_cloudflare::CloudflareProvider;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    if let Err(e) = load_dotenv() {
        eprintln!("Configuration error: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let log_file = match LogFile::open(&settings.log.path, settings.log.max_size_kb) {
        Ok(log_file) => log_file,
        Err(e) => {
            eprintln!("{}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_tracing(&settings.log.level, &log_file) {
        eprintln!("Failed to set tracing subscriber: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon ({})", settings.app_name);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    // The SMTP connection pool spawns onto the current runtime when built
    let built = {
        let _guard = rt.enter();
        build_engine(&settings, log_file)
    };
    let (engine, events) = match built {
        Ok(built) => built,
        Err(e) => {
            error!("{:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(engine, events).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Hydrate the environment from `.env` in the working directory, if present
///
/// Variables already set in the environment win.
fn load_dotenv() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).context("failed to load .env file"),
    }
}

/// Log to stdout and to the log file, both at the configured level
fn init_tracing(level: &str, log_file: &LogFile) -> Result<()> {
    let level: LevelFilter = level
        .parse()
        .with_context(|| format!("invalid log level '{}'", level))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(log_file.clone()),
        )
        .with(level)
        .try_init()
        .context("a global subscriber is already installed")
}

/// Build every component from the settings
fn build_engine(
    settings: &Settings,
    log_file: LogFile,
) -> Result<(DdnsEngine, mpsc::Receiver<EngineEvent>)> {
    let domains = DomainsConfig::load(&settings.config_path)?;
    info!(
        "Configuration loaded: {} domain(s) from {}",
        domains.len(),
        settings.config_path.display()
    );
    for domain in domains.iter() {
        info!(
            "Managing {} (zone {}): {} target(s)",
            domain.name,
            domain.config.zone_id,
            domain.config.records.len()
        );
    }

    let resolver = ddns_ip_http::create(&settings.ip_source)?;
    let provider = CloudflareProvider::new(settings.dry_run)?;

    let notifier: Option<Box<dyn Notifier>> = match &settings.mail {
        Some(mail) => Some(Box::new(SmtpNotifier::new(mail, &settings.app_name)?)),
        None => {
            info!("NOTIFICATION_EMAIL not set, email notifications disabled");
            None
        }
    };

    let (engine, events) = DdnsEngine::new(
        resolver,
        Box::new(provider),
        notifier,
        domains,
        settings.engine.clone(),
    )?;

    Ok((engine.with_log_file(log_file), events))
}

/// Run the engine until a shutdown signal arrives
async fn run_daemon(engine: DdnsEngine, mut events: mpsc::Receiver<EngineEvent>) -> Result<()> {
    // Drain engine events so the channel never fills up
    let monitor = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let result = engine.run().await.context("DDNS engine failed");

    // Dropping the engine closes the channel and ends the monitor
    drop(engine);
    let _ = monitor.await;

    info!("Shutting down daemon");
    result
}
