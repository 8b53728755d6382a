// # flattend - CNAME Flattening Daemon
//
// Thin integration layer around flatten-core:
// 1. Loading `.env` and reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the Mail-in-a-Box zone client and the upstream resolver
// 4. Running the Reconciler once, or on every tick of a cron schedule
//
// No reconciliation logic lives here.
//
// ## Configuration
//
// ### Zone management API
// - `MAILINABOX_USER`: Admin username
// - `MAILINABOX_PASSWORD`: Admin password
// - `MAILINABOX_HOSTNAME`: Host serving `/admin/dns/custom`
//
// ### Behavior
// - `FLATTEN_MODE`: `dry-run` to log writes instead of sending them
// - `FLATTEN_ON_ERROR`: `abort` (default) or `continue`
// - `FLATTEN_MARKER_LABEL`: TXT marker label (default `_cname_flatten`)
// - `FLATTEN_LOG_LEVEL`: trace, debug, info, warn, error
//
// ### Upstream DNS
// - `FLATTEN_DNS_PRIMARY`: `ip:port` (default `1.1.1.1:53`)
// - `FLATTEN_DNS_SECONDARY`: `ip:port` (default `8.8.8.8:53`)
// - `FLATTEN_DNS_TIMEOUT_SECS`: Upstream timeout (default 10)
//
// ## Example
//
// ```bash
// export MAILINABOX_USER=admin@example.com
// export MAILINABOX_PASSWORD=your_password
// export MAILINABOX_HOSTNAME=box.example.com
//
// flattend                      # run once
// flattend 0 */5 * * * *        # every five minutes
// ```

use anyhow::{Context, Result};
use chrono::Utc;
use cron::Schedule;
use flatten_core::{FailurePolicy, FlattenConfig, Reconciler, ResolverConfig};
use flatten_resolver_hickory::HickoryResolver;
use flatten_zone_mailinabox::MailInABoxClient;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean completion
/// - 1: Configuration or startup error (including an invalid schedule)
/// - 2: Runtime error (aborted run or failed directives)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlattenExitCode {
    /// Clean completion
    Clean = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<FlattenExitCode> for ExitCode {
    fn from(code: FlattenExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    flatten: FlattenConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).unwrap_or_default();

        let mut flatten = FlattenConfig::new(
            var("MAILINABOX_HOSTNAME"),
            var("MAILINABOX_USER"),
            var("MAILINABOX_PASSWORD"),
        );

        flatten.zone.dry_run = var("FLATTEN_MODE").to_lowercase() == "dry-run";

        if let Some(policy) = lookup("FLATTEN_ON_ERROR") {
            flatten.engine.on_error = FailurePolicy::from_str(&policy)?;
        }
        if let Some(label) = lookup("FLATTEN_MARKER_LABEL") {
            flatten.engine.marker_label = label;
        }

        flatten.resolver = ResolverConfig {
            primary: parse_upstream(lookup("FLATTEN_DNS_PRIMARY"), flatten.resolver.primary)
                .context("FLATTEN_DNS_PRIMARY")?,
            secondary: parse_upstream(lookup("FLATTEN_DNS_SECONDARY"), flatten.resolver.secondary)
                .context("FLATTEN_DNS_SECONDARY")?,
            timeout_secs: match lookup("FLATTEN_DNS_TIMEOUT_SECS") {
                Some(s) => s
                    .parse()
                    .with_context(|| format!("FLATTEN_DNS_TIMEOUT_SECS is not a number: {}", s))?,
                None => flatten.resolver.timeout_secs,
            },
        };

        Ok(Self {
            flatten,
            log_level: lookup("FLATTEN_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Credentials are not checked: the zone API reports them.
    fn validate(&self) -> Result<()> {
        self.flatten.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "FLATTEN_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse an `ip:port` upstream, keeping `default` when unset
fn parse_upstream(value: Option<String>, default: SocketAddr) -> Result<SocketAddr> {
    match value {
        Some(s) => s
            .parse()
            .with_context(|| format!("expected ip:port, got '{}'", s)),
        None => Ok(default),
    }
}

/// Parse the process arguments into an optional schedule
///
/// No arguments means run once. Otherwise all arguments are joined with a
/// space and parsed as a cron expression (seconds field first).
fn parse_schedule(args: &[String]) -> Result<Option<Schedule>> {
    if args.is_empty() {
        return Ok(None);
    }

    let expression = args.join(" ");
    let schedule = Schedule::from_str(&expression)
        .with_context(|| format!("Invalid cron expression '{}'", expression))?;
    Ok(Some(schedule))
}

fn main() -> ExitCode {
    // A missing .env is fine; a malformed one is not
    let dotenv_path: Option<PathBuf> = match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            eprintln!("Failed to load .env file: {}", e);
            return FlattenExitCode::ConfigError.into();
        }
    };

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FlattenExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return FlattenExitCode::ConfigError.into();
    }

    let args: Vec<String> = env::args().skip(1).collect();
    let schedule = match parse_schedule(&args) {
        Ok(schedule) => schedule,
        Err(e) => {
            eprintln!("{:#}, exiting", e);
            return FlattenExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FlattenExitCode::ConfigError.into();
    }

    info!("Starting flattend");
    if let Some(path) = dotenv_path {
        info!("Loaded environment from {}", path.display());
    }
    if config.flatten.zone.has_missing_credentials() {
        warn!("MAILINABOX_USER, MAILINABOX_PASSWORD or MAILINABOX_HOSTNAME is not set");
    }
    if config.flatten.zone.dry_run {
        warn!("Running in DRY-RUN mode - no records will be changed");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FlattenExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config, schedule).await {
            Ok(code) => code,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                FlattenExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Build the pipeline and run it once or on schedule
async fn run_daemon(config: Config, schedule: Option<Schedule>) -> Result<FlattenExitCode> {
    let zone_client = MailInABoxClient::from_config(&config.flatten.zone)?;
    let resolver = HickoryResolver::new(&config.flatten.resolver);

    info!(
        "Zone host: {}, DNS upstreams: {} then {}, on error: {:?}",
        config.flatten.zone.hostname,
        config.flatten.resolver.primary,
        config.flatten.resolver.secondary,
        config.flatten.engine.on_error
    );

    let reconciler = Reconciler::new(
        Box::new(zone_client),
        Box::new(resolver),
        config.flatten.engine.clone(),
    )?;

    match schedule {
        None => {
            info!("No cron expression provided, running once");
            Ok(run_once(&reconciler).await)
        }
        Some(schedule) => {
            run_scheduled(&reconciler, &schedule).await?;
            Ok(FlattenExitCode::Clean)
        }
    }
}

/// Run one reconciliation pass and map its result to an exit code
async fn run_once(reconciler: &Reconciler) -> FlattenExitCode {
    match reconciler.run().await {
        Ok(report) if report.has_failures() => {
            for outcome in report.failed() {
                error!(
                    "Directive {} failed: {}",
                    outcome.directive.source,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
            FlattenExitCode::RuntimeError
        }
        Ok(_) => FlattenExitCode::Clean,
        Err(e) => {
            error!("Flatten run aborted: {}", e);
            FlattenExitCode::RuntimeError
        }
    }
}

/// Run the reconciler on every schedule tick until a shutdown signal
///
/// Ticks run sequentially; a failed run is logged and the schedule goes on.
/// Signals are only acted on between runs.
async fn run_scheduled(reconciler: &Reconciler, schedule: &Schedule) -> Result<()> {
    let mut shutdown = ShutdownSignal::new()?;

    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            info!("Schedule has no further occurrences, exiting");
            return Ok(());
        };

        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        info!("Next run at {}", next);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            name = shutdown.recv() => {
                info!("Received shutdown signal: {}", name);
                return Ok(());
            }
        }

        if run_once(reconciler).await != FlattenExitCode::Clean {
            warn!("Run did not complete cleanly, waiting for next tick");
        }
    }
}

/// Shutdown signal listener (SIGTERM, SIGINT)
#[cfg(unix)]
struct ShutdownSignal {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    fn new() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?,
            sigint: signal(SignalKind::interrupt())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Shutdown signal listener (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "SIGINT"
    }
}
