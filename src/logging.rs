//! Tracing infrastructure.
//!
//! Structured logging for the pipeline via the `tracing` and
//! `tracing-subscriber` crates: environment-based filtering (`RUST_LOG`
//! takes precedence over the configured level) and pretty or compact
//! console output.

use crate::config::ApplicationConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber from application settings.
///
/// Returns an error string if a subscriber was already installed, which
/// only happens if this is called twice.
pub fn init(config: &ApplicationConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = match config.log_format.as_str() {
        "compact" => builder.compact().with_ansi(false).try_init(),
        _ => builder.try_init(),
    };

    result.map_err(|err| format!("Failed to initialize tracing: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApplicationConfig;

    #[test]
    fn double_init_reports_error_instead_of_panicking() {
        let config = ApplicationConfig::default();
        assert!(init(&config).is_ok());
        assert!(init(&config).is_err());
    }
}
