//! Error types for mimir-writer.

use mimir_alerts::AlertError;
use mimir_config::ConfigError;
use thiserror::Error;

/// Errors reported by a process supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// The supervisor socket is not reachable.
    #[error("supervisor connection failed: {0}")]
    ConnectionFailed(String),

    /// The supervisor rejected a request.
    #[error("supervisor api error: {0}")]
    Api(String),

    /// A parent directory does not exist and was not requested to be created.
    #[error("path not found: {0}")]
    PathNotFound(String),
}

/// Errors from workload operations.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// The supervisor cannot be reached yet. Retried on the next event.
    #[error("workload container is not ready")]
    NotReady,

    /// The supervisor failed an operation.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// The configuration document could not be rendered.
    #[error("failed to render configuration: {0}")]
    Render(#[from] ConfigError),
}

impl WorkloadError {
    /// Returns true if the workload simply is not reachable yet.
    #[must_use]
    pub const fn is_not_ready(&self) -> bool {
        matches!(
            self,
            Self::NotReady | Self::Supervisor(SupervisorError::ConnectionFailed(_))
        )
    }
}

/// Errors that end a reconciliation early.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Workload operation failed.
    #[error(transparent)]
    Workload(#[from] WorkloadError),

    /// Operator settings are invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Operator alerting configuration is invalid.
    #[error("invalid configuration: {0}")]
    Alerting(#[from] AlertError),
}
