// # dhcpv6pd - DHCPv6 Prefix Delegation Daemon
//
// This daemon is a THIN integration layer: all reconciliation logic lives
// in dhcpv6pd-core, all host access in dhcpv6pd-linux.
//
// The dhcpv6pd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime
// 3. Loading the cached interface configuration and starting the pipeline
// 4. Replaying delegated prefixes found in DHCPv6 lease files
// 5. Feeding notifications from the Unix socket into the pipeline
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Interface Configuration
// - `DHCPV6PD_CONFIG_CACHE`: Cache file for the last accepted configuration
// - `DHCPV6PD_CONFIG_FILE`: Configuration document applied at startup and on SIGHUP (optional)
//
// ### Lease Recovery
// - `DHCPV6PD_LEASE_DIR`: Directory holding DHCPv6 client lease files
// - `DHCPV6PD_LEASE_PATTERN`: Lease file name regex, one capture group for the interface
//
// ### Host Access
// - `DHCPV6PD_SOCKET`: Notification socket path
// - `DHCPV6PD_IP_BINARY`: iproute2 binary
// - `DHCPV6PD_SYSFS_NET`: sysfs network class directory
// - `DHCPV6PD_BATCH_TIMEOUT_SECS`: Upper bound for one `ip -batch` run
//
// ## Example
//
// ```bash
// export DHCPV6PD_CONFIG_FILE=/etc/dhcpv6pd/interfaces.json
// export DHCPV6PD_LOG_LEVEL=debug
//
// dhcpv6pd
// ```
//
// ## Signals
//
// - SIGTERM / SIGINT: drain the pipeline and exit
// - SIGHUP: re-apply `DHCPV6PD_CONFIG_FILE`

use anyhow::{Context, Result};
use dhcpv6pd_core::leases::{DEFAULT_LEASE_PATTERN, lease_pattern, scan_lease_dir};
use dhcpv6pd_core::pipeline::ReconcilerEvent;
use dhcpv6pd_core::traits::NotificationSource;
use dhcpv6pd_core::{ConfigTree, Dhcpv6Pd, FileConfigCache, PipelineSettings, PrefixEvent};
use dhcpv6pd_linux::{
    DEFAULT_IP_BINARY, DEFAULT_SOCKET_PATH, DEFAULT_SYSFS_NET, IpBatchExecutor,
    SysfsInterfaceLookup, UnixSocketNotificationSource,
};
use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_CONFIG_CACHE: &str = "/run/vci-dhcpv6-pd/config.cache";
const DEFAULT_LEASE_DIR: &str = "/var/lib/dhcp/";
const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 10;

/// Upper bound on draining the pipeline at shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum Dhcpv6PdExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<Dhcpv6PdExitCode> for ExitCode {
    fn from(code: Dhcpv6PdExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
#[derive(Debug)]
struct Config {
    config_cache: PathBuf,
    config_file: Option<PathBuf>,
    lease_dir: PathBuf,
    lease_pattern: String,
    socket: PathBuf,
    ip_binary: String,
    sysfs_net: PathBuf,
    batch_timeout_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `var`, which returns a variable's value if set
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let batch_timeout_secs = match var("DHCPV6PD_BATCH_TIMEOUT_SECS") {
            Some(value) => value.trim().parse().with_context(|| {
                format!("DHCPV6PD_BATCH_TIMEOUT_SECS must be a number of seconds. Got: {}", value)
            })?,
            None => DEFAULT_BATCH_TIMEOUT_SECS,
        };

        Ok(Self {
            config_cache: var("DHCPV6PD_CONFIG_CACHE")
                .unwrap_or_else(|| DEFAULT_CONFIG_CACHE.to_string())
                .into(),
            config_file: var("DHCPV6PD_CONFIG_FILE")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            lease_dir: var("DHCPV6PD_LEASE_DIR")
                .unwrap_or_else(|| DEFAULT_LEASE_DIR.to_string())
                .into(),
            lease_pattern: var("DHCPV6PD_LEASE_PATTERN")
                .unwrap_or_else(|| DEFAULT_LEASE_PATTERN.to_string()),
            socket: var("DHCPV6PD_SOCKET")
                .unwrap_or_else(|| DEFAULT_SOCKET_PATH.to_string())
                .into(),
            ip_binary: var("DHCPV6PD_IP_BINARY").unwrap_or_else(|| DEFAULT_IP_BINARY.to_string()),
            sysfs_net: var("DHCPV6PD_SYSFS_NET")
                .unwrap_or_else(|| DEFAULT_SYSFS_NET.to_string())
                .into(),
            batch_timeout_secs,
            log_level: var("DHCPV6PD_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Returns the compiled lease file pattern.
    fn validate(&self) -> Result<Regex> {
        if self.config_cache.as_os_str().is_empty() {
            anyhow::bail!("DHCPV6PD_CONFIG_CACHE cannot be empty");
        }

        if self.socket.as_os_str().is_empty() {
            anyhow::bail!("DHCPV6PD_SOCKET cannot be empty");
        }

        if self.ip_binary.is_empty() {
            anyhow::bail!("DHCPV6PD_IP_BINARY cannot be empty");
        }

        if !(1..=300).contains(&self.batch_timeout_secs) {
            anyhow::bail!(
                "DHCPV6PD_BATCH_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.batch_timeout_secs
            );
        }

        if let Some(ref path) = self.config_file
            && !path.is_file()
        {
            anyhow::bail!("DHCPV6PD_CONFIG_FILE does not exist: {}", path.display());
        }

        // Validate log level
        log_level(&self.log_level).with_context(|| {
            format!(
                "DHCPV6PD_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            )
        })?;

        lease_pattern(&self.lease_pattern)
            .map_err(|e| anyhow::anyhow!("DHCPV6PD_LEASE_PATTERN: {}", e))
    }
}

fn log_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return Dhcpv6PdExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    let lease_pattern = match config.validate() {
        Ok(pattern) => pattern,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return Dhcpv6PdExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let level = log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return Dhcpv6PdExitCode::ConfigError.into();
    }

    info!("Starting dhcpv6pd daemon");
    debug!("Configuration: {:?}", config);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return Dhcpv6PdExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, lease_pattern).await {
            error!("Daemon error: {:#}", e);
            Dhcpv6PdExitCode::RuntimeError
        } else {
            Dhcpv6PdExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until SIGTERM/SIGINT
async fn run_daemon(config: Config, lease_pattern: Regex) -> Result<()> {
    let cache = FileConfigCache::new(&config.config_cache)
        .await
        .context("failed to open config cache")?;
    let initial = cache.load().await.context("failed to load config cache")?;
    info!("Loaded cached configuration from {}", cache.path().display());

    let settings = PipelineSettings {
        batch_timeout_secs: config.batch_timeout_secs,
        ..PipelineSettings::default()
    };
    let (pd, events) = Dhcpv6Pd::spawn(
        initial,
        Arc::new(cache),
        Arc::new(SysfsInterfaceLookup::new(&config.sysfs_net)),
        Arc::new(IpBatchExecutor::new(&config.ip_binary)),
        settings,
    )?;
    let event_logger = tokio::spawn(log_events(events));

    if let Some(ref path) = config.config_file {
        apply_config_file(&pd, path).await?;
    }

    // Listen before replaying leases so no notification is missed
    let source = UnixSocketNotificationSource::bind(&config.socket)?;
    let mut notifications = source.watch();

    recover_leases(&pd, &config.lease_dir, &lease_pattern).await;

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
    let mut sighup = signal(SignalKind::hangup())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGHUP handler: {}", e))?;

    info!("Ready to handle prefix notifications");

    let outcome: Result<&'static str> = loop {
        tokio::select! {
            notification = notifications.next() => match notification {
                Some(notification) => {
                    let event = notification.event();
                    info!("{} {} {}", notification.name(), event.interface, event.prefix);
                    if let Err(e) = pd.dispatch(notification) {
                        break Err(e.into());
                    }
                }
                None => break Err(anyhow::anyhow!("notification listener stopped")),
            },
            _ = sighup.recv() => match config.config_file {
                Some(ref path) => {
                    info!("Received SIGHUP, reloading {}", path.display());
                    if let Err(e) = apply_config_file(&pd, path).await {
                        error!("Failed to reload configuration: {:#}", e);
                    }
                }
                None => warn!("Received SIGHUP but DHCPV6PD_CONFIG_FILE is not set"),
            },
            _ = sigterm.recv() => break Ok("SIGTERM"),
            _ = sigint.recv() => break Ok("SIGINT"),
        }
    };

    match &outcome {
        Ok(signal) => info!("Received shutdown signal: {}", signal),
        Err(e) => error!("Shutting down after error: {:#}", e),
    }

    drop(notifications);
    drop(source);

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, pd.shutdown())
        .await
        .is_err()
    {
        anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT);
    }
    if let Err(e) = event_logger.await {
        warn!("event logger ended abnormally: {}", e);
    }

    outcome.map(|_| ())
}

/// Read a configuration document and apply it through the config surface
async fn apply_config_file(pd: &Dhcpv6Pd, path: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let tree = ConfigTree::from_json(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    pd.config().validate(&tree)?;
    // A cache write failure still leaves the new configuration live
    if let Err(e) = pd.config().set(tree).await {
        warn!("Configuration applied but not cached: {}", e);
    }
    info!("Applied configuration from {}", path.display());
    Ok(())
}

/// Replay delegated prefixes from the DHCPv6 client's lease files
async fn recover_leases(pd: &Dhcpv6Pd, dir: &Path, pattern: &Regex) {
    let leased = match scan_lease_dir(dir, pattern).await {
        Ok(leased) => leased,
        Err(e) => {
            warn!("Skipping lease recovery: {}", e);
            return;
        }
    };

    for lease in leased {
        info!("Recovered prefix {} on {}", lease.prefix, lease.interface);
        if let Err(e) = pd.handle_prefix_assigned(PrefixEvent::new(lease.interface, lease.prefix)) {
            warn!("Failed to replay lease: {}", e);
        }
    }
}

async fn log_events(mut events: mpsc::Receiver<ReconcilerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ReconcilerEvent::Reconciled { removed, added } => {
                if !removed.is_empty() || !added.is_empty() {
                    info!("Reconciled: {} removed, {} added", removed.len(), added.len());
                }
            }
            ReconcilerEvent::BatchFailed { action, error } => {
                error!("Address {} batch failed: {}", action, error);
            }
        }
    }
}
