use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration for docsight
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub quiet: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            quiet: false,
        }
    }
}

/// Initialize the logging system. Safe to call once per process;
/// later calls are ignored so tests can init freely.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docsight={},reqwest=warn", config.level)));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    let _ = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .try_init();

    if !config.quiet {
        info!("docsight logging initialized (level: {})", config.level);
    }
}
