// # routerdnsd - Router DNS Updater Daemon
//
// This is a THIN integration layer. All update, retry and liveness logic
// lives in routerdns-core; the browser adapter lives in routerdns-webdriver.
//
// The routerdnsd daemon is responsible for:
// 1. Reading configuration from environment variables (and `.env`)
// 2. Initializing logging (stdout, plus a log file when enabled) and the runtime
// 3. Wiring the WebDriver session factory, workflow and liveness marker
// 4. Running the cycle scheduler until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Router (all required)
// - `router_url`: Router management URL (e.g. http://192.168.29.1)
// - `user_name`, `password`: Router login
// - `ipv4_dns_server1`, `ipv4_dns_server2`: LAN IPv4 DNS servers
// - `ipv6_dns_server1`, `ipv6_dns_server2`: LAN IPv6 DNS servers
// - `update_interval_time`: Seconds between cycles
//
// ### Daemon (optional)
// - `ROUTERDNS_WEBDRIVER_URL`: chromedriver endpoint (default http://localhost:9515)
// - `ROUTERDNS_BROWSER_BINARY`: Preferred browser binary, empty for driver default
// - `ROUTERDNS_LIVENESS_PATH`: Liveness marker file (default /tmp/dns_updater_healthy)
// - `ROUTERDNS_FAULT_BACKOFF_SECS`: Wait after an unexpected fault (default 60)
// - `ROUTERDNS_ELEMENT_TIMEOUT_SECS`: Element lookup bound (default 10)
// - `ROUTERDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `ROUTERDNS_LOG_DIR`: Also append logs to `dns_updater.log` here when the
//   directory exists (default /app/logs, empty to disable)
//
// A `.env` file in the working directory is loaded first; variables already
// set in the environment take precedence over it.
//
// ## Example
//
// ```bash
// export router_url=http://192.168.29.1
// export user_name=admin
// export password=...
// export ipv4_dns_server1=1.1.1.1
// export ipv4_dns_server2=1.0.0.1
// export ipv6_dns_server1=2606:4700:4700::1111
// export ipv6_dns_server2=2606:4700:4700::1001
// export update_interval_time=3600
//
// routerdnsd
// ```

use anyhow::Result;
use routerdns_core::liveness::DEFAULT_LIVENESS_PATH;
use routerdns_core::{
    CycleScheduler, FileLivenessMarker, RouterConfig, RouterUpdateWorkflow, SchedulerConfig,
};
use routerdns_webdriver::{
    DEFAULT_BROWSER_BINARY, DEFAULT_ENDPOINT, WebDriverSessionFactory, WebDriverSettings,
};
use std::env;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Default directory for the log file
const DEFAULT_LOG_DIR: &str = "/app/logs";

/// Log file name inside the log directory
const LOG_FILE_NAME: &str = "dns_updater.log";

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon-level settings (everything except the router configuration)
#[derive(Debug)]
struct DaemonSettings {
    webdriver_url: String,
    browser_binary: Option<String>,
    liveness_path: String,
    fault_backoff_secs: u64,
    element_timeout_secs: u64,
    log_level: String,
    log_dir: Option<PathBuf>,
}

impl DaemonSettings {
    /// Load daemon settings from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            webdriver_url: env::var("ROUTERDNS_WEBDRIVER_URL")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            browser_binary: match env::var("ROUTERDNS_BROWSER_BINARY") {
                Ok(binary) if binary.trim().is_empty() => None,
                Ok(binary) => Some(binary),
                Err(_) => Some(DEFAULT_BROWSER_BINARY.to_string()),
            },
            liveness_path: env::var("ROUTERDNS_LIVENESS_PATH")
                .unwrap_or_else(|_| DEFAULT_LIVENESS_PATH.to_string()),
            fault_backoff_secs: parse_secs("ROUTERDNS_FAULT_BACKOFF_SECS", 60)?,
            element_timeout_secs: parse_secs("ROUTERDNS_ELEMENT_TIMEOUT_SECS", 10)?,
            log_level: env::var("ROUTERDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_dir: match env::var("ROUTERDNS_LOG_DIR") {
                Ok(dir) if dir.trim().is_empty() => None,
                Ok(dir) => Some(PathBuf::from(dir)),
                Err(_) => Some(PathBuf::from(DEFAULT_LOG_DIR)),
            },
        })
    }

    /// Validate the settings
    fn validate(&self) -> Result<()> {
        if !self.webdriver_url.starts_with("http://") && !self.webdriver_url.starts_with("https://") {
            anyhow::bail!(
                "ROUTERDNS_WEBDRIVER_URL must use HTTP or HTTPS scheme. Got: {}",
                self.webdriver_url
            );
        }

        if self.liveness_path.trim().is_empty() {
            anyhow::bail!("ROUTERDNS_LIVENESS_PATH cannot be empty");
        }

        if !(1..=3600).contains(&self.fault_backoff_secs) {
            anyhow::bail!(
                "ROUTERDNS_FAULT_BACKOFF_SECS must be between 1 and 3600 seconds. Got: {}",
                self.fault_backoff_secs
            );
        }

        if !(1..=300).contains(&self.element_timeout_secs) {
            anyhow::bail!(
                "ROUTERDNS_ELEMENT_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.element_timeout_secs
            );
        }

        self.tracing_level()?;
        Ok(())
    }

    fn tracing_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ROUTERDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Log file to append to, if file logging is enabled and its directory exists
    fn log_file_path(&self) -> Option<PathBuf> {
        let dir = self.log_dir.as_deref()?;
        dir.is_dir().then(|| dir.join(LOG_FILE_NAME))
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn parse_secs(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds. Got: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn main() -> ExitCode {
    // A missing .env is fine; the environment alone may carry everything
    let _ = dotenvy::dotenv();

    let settings = match DaemonSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    let log_level = settings.tracing_level().unwrap_or(Level::INFO);
    let log_file = settings.log_file_path();
    let file_layer = match log_file.as_deref().map(open_log_file).transpose() {
        Ok(file) => file.map(|file| fmt::layer().with_ansi(false).with_writer(Arc::new(file))),
        Err(e) => {
            eprintln!("Failed to open log file: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let init = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(LevelFilter::from_level(log_level))
        .try_init();

    if let Err(e) = init {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting DNS Updater Service v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &log_file {
        info!("Logging to file: {}", path.display());
    }

    // Missing or malformed router settings are fatal: no cycle is attempted
    let router = match RouterConfig::from_lookup(|key| env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(settings, router).await {
            error!("Daemon error: {}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(settings: DaemonSettings, router: RouterConfig) -> Result<()> {
    let webdriver = WebDriverSettings::default()
        .with_endpoint(settings.webdriver_url.clone())
        .with_browser_binary(settings.browser_binary.clone())
        .with_element_timeout(Duration::from_secs(settings.element_timeout_secs));
    let factory = WebDriverSessionFactory::new(webdriver)?;
    info!("WebDriver endpoint: {}", factory.settings().endpoint);

    let liveness = FileLivenessMarker::new(&settings.liveness_path);
    info!("Liveness marker: {}", liveness.path().display());

    let router = Arc::new(router);
    let scheduler_config = SchedulerConfig::new(router.interval())
        .with_fault_backoff(Duration::from_secs(settings.fault_backoff_secs));
    let workflow = RouterUpdateWorkflow::new(router);

    let (scheduler, mut events) = CycleScheduler::new(
        Box::new(factory),
        workflow,
        Box::new(liveness),
        scheduler_config,
    )?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Scheduler event: {:?}", event);
        }
    });

    // Handlers must exist before the first cycle so a signal mid-cycle is held
    let shutdown = shutdown_signal();

    scheduler
        .run_until(async move {
            let signal = shutdown.await;
            info!("Received shutdown signal: {}", signal);
        })
        .await?;

    info!("Daemon stopped");
    Ok(())
}

/// Register SIGTERM/SIGINT handlers now and wait for either later
///
/// Registration happens when this is called, not when the returned future
/// is first polled. Resolves to the name of the signal received.
#[cfg(unix)]
fn shutdown_signal() -> impl Future<Output = &'static str> {
    let handlers = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => Some((sigterm, sigint)),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to set up signal handlers: {}, falling back to CTRL-C", e);
            None
        }
    };

    async move {
        match handlers {
            Some((mut sigterm, mut sigint)) => tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            },
            None => wait_for_ctrl_c().await,
        }
    }
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> impl Future<Output = &'static str> {
    wait_for_ctrl_c()
}

async fn wait_for_ctrl_c() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(e) => {
            error!("Failed to wait for CTRL-C: {}", e);
            // Never resolve: without a signal source the daemon runs until killed
            std::future::pending().await
        }
    }
}
