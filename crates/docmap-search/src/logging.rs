//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::error::SearchError;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `settings.log_level` is the filter.
/// Fails if a global subscriber is already installed.
pub fn init_tracing(settings: &Settings) -> Result<(), SearchError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| SearchError::Settings(format!("Failed to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_fails() {
        let settings = Settings::default();
        // Another test may have installed one already
        let _ = init_tracing(&settings);
        assert!(init_tracing(&settings).is_err());
    }
}
