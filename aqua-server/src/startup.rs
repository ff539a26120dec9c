// Process bootstrap: CLI, configuration, logging and component wiring

use aqua_core::config::{EndOfInput, LoggingConfig};
use aqua_core::{AquaConfig, ConfigError};
use aqua_eye::{
    dispatch, AlertThrottle, AnalysisControl, AnalysisLoop, ClassNames, LogNotifier, LoopOutcome, Notifier,
    ReplayDetector, ReplaySource, RuntimeSettings, SmsNotifier, SnapshotStore,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Default)]
#[command(name = "aqua-server")]
#[command(about = "AquaAnalyzer - live fish tracking aggregates over HTTP", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (JSON, TOML or YAML)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Recorded tracker output to replay
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP port
    #[arg(long)]
    pub port: Option<u16>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Stop at end of input instead of replaying from the start
    #[arg(long)]
    pub no_loop: bool,
}

/// Build the effective configuration: defaults, then the file, then the
/// environment, then command-line flags
pub fn load_config(cli: &Cli) -> Result<AquaConfig, ConfigError> {
    resolve_config(cli, |key| std::env::var(key).ok())
}

pub fn resolve_config<F>(cli: &Cli, lookup: F) -> Result<AquaConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &cli.config {
        Some(path) => AquaConfig::from_file(path)?,
        None => AquaConfig::default(),
    };
    config.apply_env(lookup);

    if let Some(source) = &cli.source {
        config.source.path = source.clone();
    }
    if let Some(host) = &cli.host {
        config.server.bind_address = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.no_loop {
        config.analysis.end_of_input = EndOfInput::Stop;
    }

    config.validate()?;
    Ok(config)
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", config.level, e))?;

    let result = if config.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// SMS when credentials are configured, log-only otherwise
pub fn build_notifier(config: &AquaConfig) -> Arc<dyn Notifier> {
    if !config.notifier.has_credentials() {
        info!("SMS credentials not configured; notifications will only be logged");
        return Arc::new(LogNotifier);
    }

    match SmsNotifier::new(&config.notifier, config.alerts.notify_timeout()) {
        Ok(notifier) => {
            info!("SMS notifications enabled via {}", config.notifier.api_base);
            Arc::new(notifier)
        }
        Err(e) => {
            warn!("Falling back to log notifications: {}", e);
            Arc::new(LogNotifier)
        }
    }
}

/// Send the "system is live" message, outside the alert cooldown
pub async fn announce_startup(notifier: &dyn Notifier, settings: &RuntimeSettings, config: &AquaConfig) {
    dispatch(
        notifier,
        settings,
        &config.alerts.startup_message,
        config.alerts.notify_timeout(),
    )
    .await;
}

/// Spawn the analysis loop over the configured replay file
pub fn start_analysis(
    config: &AquaConfig,
    store: Arc<SnapshotStore>,
    settings: Arc<RuntimeSettings>,
    notifier: Arc<dyn Notifier>,
) -> (AnalysisControl, JoinHandle<LoopOutcome>) {
    let source = ReplaySource::new(&config.source.path);
    let detector = ReplayDetector::new(ClassNames::from_names(config.source.class_names.iter().cloned()));
    let throttle = AlertThrottle::from_config(&config.alerts, settings, notifier);

    let analysis = AnalysisLoop::new(source, detector, store, throttle, config.analysis.clone())
        .with_default_fps(config.source.default_fps);
    let control = analysis.control();
    info!("Starting analysis of {}", config.source.path.display());
    (control, analysis.spawn())
}
