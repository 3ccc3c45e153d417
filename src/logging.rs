//! Structured logging setup via tracing-subscriber.

use tracing_subscriber::EnvFilter;

use crate::config::UgearSettings;

/// Configure the global tracing subscriber. `RUST_LOG` wins over the given
/// level when set. Calling twice is a no-op.
pub fn init_logging(json_output: bool, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_output {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Configure logging from settings.
pub fn init_from_settings(settings: &UgearSettings) {
    init_logging(settings.log_json, &settings.log_level);
}
