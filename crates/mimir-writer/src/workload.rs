//! Workload lifecycle against the process supervisor.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mimir_config::{ConfigurationDocument, MIMIR_CONFIG_FILE};

use crate::error::WorkloadError;
use crate::supervisor::{FailureAction, Layer, OverridePolicy, ServiceSpec, Startup, Supervisor};

/// Supervised service name.
pub const SERVICE_NAME: &str = "mimir";

/// Layer label the service is registered under.
pub const LAYER_LABEL: &str = "mimir";

const MIMIR_BINARY: &str = "/bin/mimir";

/// Result type for workload operations.
pub type Result<T> = std::result::Result<T, WorkloadError>;

/// Which Mimir components this unit runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentProfile {
    /// Write path only.
    #[default]
    Writer,
    /// Every component in one process.
    Monolithic,
}

impl DeploymentProfile {
    /// The `-target` list for this profile.
    #[must_use]
    pub const fn targets(self) -> &'static [&'static str] {
        match self {
            Self::Writer => &["distributor", "ingester", "ruler", "alertmanager"],
            Self::Monolithic => &["all", "alertmanager"],
        }
    }
}

impl fmt::Display for DeploymentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Writer => write!(f, "writer"),
            Self::Monolithic => write!(f, "monolithic"),
        }
    }
}

impl FromStr for DeploymentProfile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "writer" => Ok(Self::Writer),
            "monolithic" => Ok(Self::Monolithic),
            other => Err(format!(
                "unknown profile '{other}', expected writer or monolithic"
            )),
        }
    }
}

/// Build the service layer that runs Mimir with `targets`.
#[must_use]
pub fn mimir_layer(targets: &[&str]) -> Layer {
    let command = format!(
        "{MIMIR_BINARY} --config.file={MIMIR_CONFIG_FILE} -target={}",
        targets.join(",")
    );
    Layer {
        summary: "mimir layer".to_string(),
        description: "supervisor layer for mimir".to_string(),
        services: BTreeMap::from([(
            SERVICE_NAME.to_string(),
            ServiceSpec {
                override_policy: OverridePolicy::Replace,
                summary: "mimir daemon".to_string(),
                command,
                startup: Startup::Enabled,
                on_failure: FailureAction::Restart,
            },
        )]),
    }
}

/// Drives the Mimir process through the supervisor.
///
/// Every operation checks connectability first and returns
/// [`WorkloadError::NotReady`] instead of touching the supervisor when it is
/// not reachable.
#[derive(Clone)]
pub struct WorkloadController {
    supervisor: Arc<dyn Supervisor>,
}

impl fmt::Debug for WorkloadController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadController").finish_non_exhaustive()
    }
}

impl WorkloadController {
    /// Wrap a supervisor handle.
    #[must_use]
    pub fn new(supervisor: Arc<dyn Supervisor>) -> Self {
        Self { supervisor }
    }

    /// Returns true if the supervisor is reachable.
    #[must_use]
    pub fn can_connect(&self) -> bool {
        self.supervisor.can_connect()
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.supervisor.can_connect() {
            Ok(())
        } else {
            debug!("supervisor not reachable");
            Err(WorkloadError::NotReady)
        }
    }

    /// Create any of `paths` that do not exist yet, with parents.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` if the supervisor is unreachable, or the supervisor
    /// error for the first path that could not be checked or created.
    pub fn ensure_directories(&self, paths: &[&str]) -> Result<()> {
        self.ensure_ready()?;
        for path in paths {
            if self.supervisor.exists(path)? {
                continue;
            }
            self.supervisor.make_dir(path, true)?;
            debug!(path, "created directory");
        }
        Ok(())
    }

    /// Render `document` and write it to the configuration file.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` if the supervisor is unreachable, `Render` if the
    /// document cannot be serialized, or the supervisor's write error.
    pub fn push_config(&self, document: &ConfigurationDocument) -> Result<()> {
        self.ensure_ready()?;
        let yaml = document.to_yaml()?;
        self.supervisor.push(MIMIR_CONFIG_FILE, &yaml, true)?;
        debug!(path = MIMIR_CONFIG_FILE, bytes = yaml.len(), "pushed configuration");
        Ok(())
    }

    /// Register the layer for `targets` and start the service.
    ///
    /// Safe to call when the service is already running.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` if the supervisor is unreachable, or the
    /// supervisor's error.
    pub fn start(&self, targets: &[&str]) -> Result<()> {
        self.ensure_ready()?;
        self.supervisor
            .add_layer(LAYER_LABEL, &mimir_layer(targets), true)?;
        self.supervisor.start(&[SERVICE_NAME])?;
        info!(service = SERVICE_NAME, targets = %targets.join(","), "started workload");
        Ok(())
    }

    /// Stop the service. Stopping a stopped service is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` if the supervisor is unreachable, or the
    /// supervisor's error.
    pub fn stop(&self) -> Result<()> {
        self.ensure_ready()?;
        self.supervisor.stop(&[SERVICE_NAME])?;
        info!(service = SERVICE_NAME, "stopped workload");
        Ok(())
    }

    /// Stop then start with `targets`.
    ///
    /// The layer is registered before stopping so the stop never targets an
    /// undefined service on a fresh container.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` if the supervisor is unreachable, or the
    /// supervisor's error.
    pub fn restart(&self, targets: &[&str]) -> Result<()> {
        self.ensure_ready()?;
        self.supervisor
            .add_layer(LAYER_LABEL, &mimir_layer(targets), true)?;
        self.stop()?;
        self.start(targets)
    }
}
