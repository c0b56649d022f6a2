//! Error types for the dashboard.

use tabdeck_core::{ConfigurationError, TabdeckError};
use tabdeck_storage::LmdbMediumError;

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("Failed to open medium: {0}")]
    Medium(#[from] LmdbMediumError),
    #[error(transparent)]
    Setup(#[from] ConfigurationError),
    #[error(transparent)]
    Tabdeck(#[from] TabdeckError),
}

pub type DashboardResult<T> = Result<T, DashboardError>;
