//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("Failed to init subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `filter` when set. Call once at startup.
pub fn init_tracing(filter: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
            filter: filter.to_string(),
            reason: e.to_string(),
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::info!(filter, ?format, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // Whichever test initializes first wins; the second call must error.
        let _ = init_tracing("tabdeck=debug", LogFormat::Pretty);
        assert!(matches!(
            init_tracing("tabdeck=debug", LogFormat::Json),
            Err(TelemetryError::Init(_))
        ));
    }
}
