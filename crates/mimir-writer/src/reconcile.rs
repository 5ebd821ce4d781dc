//! The reconcile loop.
//!
//! Each lifecycle [`Event`] is handled to completion and produces an
//! [`Outcome`]: the unit [`Status`] the caller should report, plus any rule
//! groups that could not be pushed. Nothing is carried between events; every
//! reconciliation recomputes state from the unit model.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mimir_alerts::{AlertingConfiguration, RuleClient};
use mimir_config::{build, required_directories, ConfigurationDocument, MimirSettings};

use crate::error::{ReconcileError, WorkloadError};
use crate::peers::PeerDirectory;
use crate::relation::UnitModel;
use crate::workload::{DeploymentProfile, WorkloadController};

/// Reason reported while the supervisor is unreachable.
pub const WAITING_FOR_CONTAINER: &str = "waiting for mimir container";

/// Reason reported when several units would each keep local-only storage.
pub const NEEDS_SHARED_STORAGE: &str = "replication requires durable shared storage";

/// Lifecycle events the loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    /// The workload container's supervisor became reachable.
    WorkloadReady,
    /// Operator settings changed.
    ConfigChanged,
    /// Peer or upstream rule relation data changed.
    PeerRelationChanged,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkloadReady => write!(f, "workload-ready"),
            Self::ConfigChanged => write!(f, "config-changed"),
            Self::PeerRelationChanged => write!(f, "peer-relation-changed"),
        }
    }
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workload-ready" => Ok(Self::WorkloadReady),
            "config-changed" => Ok(Self::ConfigChanged),
            "peer-relation-changed" => Ok(Self::PeerRelationChanged),
            other => Err(format!(
                "unknown event '{other}', expected workload-ready, config-changed or peer-relation-changed"
            )),
        }
    }
}

/// Unit status after a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum Status {
    /// Something transient is missing; a later event retries.
    Waiting(String),
    /// The operator must change something.
    Blocked(String),
    /// The workload runs with the current configuration.
    Active,
}

impl Status {
    /// Returns true for [`Status::Active`].
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting(reason) => write!(f, "waiting: {reason}"),
            Self::Blocked(reason) => write!(f, "blocked: {reason}"),
            Self::Active => write!(f, "active"),
        }
    }
}

impl From<&ReconcileError> for Status {
    fn from(err: &ReconcileError) -> Self {
        match err {
            ReconcileError::Workload(e) if e.is_not_ready() => {
                Self::Waiting(WAITING_FOR_CONTAINER.to_string())
            }
            ReconcileError::Workload(WorkloadError::Render(e)) => {
                Self::Blocked(format!("invalid configuration: {e}"))
            }
            ReconcileError::Workload(e) => Self::Waiting(e.to_string()),
            ReconcileError::Config(_) | ReconcileError::Alerting(_) => {
                Self::Blocked(err.to_string())
            }
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Status to report.
    pub status: Status,
    /// Rule groups that failed to push, as `relation/group`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_groups: Vec<String>,
}

impl Outcome {
    fn status(status: Status) -> Self {
        Self {
            status,
            failed_groups: Vec::new(),
        }
    }
}

/// Event-driven controller for one Mimir unit.
///
/// `handle` takes `&mut self`, so one loop never reconciles two events at
/// once.
pub struct ReconcileLoop {
    model: Arc<dyn UnitModel>,
    peers: PeerDirectory,
    workload: WorkloadController,
    rules: RuleClient,
    profile: DeploymentProfile,
}

impl fmt::Debug for ReconcileLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcileLoop")
            .field("peers", &self.peers)
            .field("workload", &self.workload)
            .field("rules", &self.rules)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl ReconcileLoop {
    /// Assemble a loop from its collaborators.
    #[must_use]
    pub fn new(
        model: Arc<dyn UnitModel>,
        peers: PeerDirectory,
        workload: WorkloadController,
        rules: RuleClient,
    ) -> Self {
        Self {
            model,
            peers,
            workload,
            rules,
            profile: DeploymentProfile::default(),
        }
    }

    /// Use `profile` to pick the start targets.
    #[must_use]
    pub const fn with_profile(mut self, profile: DeploymentProfile) -> Self {
        self.profile = profile;
        self
    }

    /// The deployment profile in use.
    #[must_use]
    pub const fn profile(&self) -> DeploymentProfile {
        self.profile
    }

    /// Handle one event to completion.
    pub async fn handle(&mut self, event: Event) -> Outcome {
        info!(event = %event, "reconciling");
        let result = match event {
            Event::WorkloadReady => self.on_workload_ready().await,
            Event::ConfigChanged => self.on_config_changed().await,
            Event::PeerRelationChanged => self.on_relation_changed().await,
        };

        let outcome = result.unwrap_or_else(|err| {
            let status = Status::from(&err);
            match status {
                Status::Blocked(_) => warn!(event = %event, error = %err, "reconcile blocked"),
                _ => info!(event = %event, error = %err, "reconcile deferred"),
            }
            Outcome::status(status)
        });

        info!(
            event = %event,
            status = %outcome.status,
            failed_groups = outcome.failed_groups.len(),
            "reconciled"
        );
        outcome
    }

    /// Render the configuration document from the current model.
    ///
    /// # Errors
    ///
    /// Returns an error if the operator settings do not parse.
    pub fn render(&self) -> Result<ConfigurationDocument, ReconcileError> {
        let settings = self.model.settings().parse()?;
        Ok(self.document(&settings))
    }

    fn document(&self, settings: &MimirSettings) -> ConfigurationDocument {
        let relation = self.model.peer_relation();
        let peers = self.peers.resolve_peers(relation.as_deref());
        debug!(peers = peers.len(), "resolved peers");
        build(settings, &peers)
    }

    fn alerting_config(&self) -> Result<AlertingConfiguration, ReconcileError> {
        let settings = self.model.settings();
        Ok(AlertingConfiguration::from_operator(
            settings.alertmanager_config.as_deref(),
            settings.alertmanager_templates.as_deref(),
        )?)
    }

    fn ensure_connected(&self) -> Result<(), ReconcileError> {
        if self.workload.can_connect() {
            Ok(())
        } else {
            Err(WorkloadError::NotReady.into())
        }
    }

    async fn on_workload_ready(&self) -> Result<Outcome, ReconcileError> {
        self.ensure_connected()?;
        let settings = self.model.settings().parse()?;
        let alerting = self.alerting_config()?;

        self.workload.ensure_directories(&required_directories())?;
        self.workload.push_config(&self.document(&settings))?;
        self.workload.start(self.profile.targets())?;
        self.model.publish_peer_hostname(self.peers.local_address());
        self.push_alerting_config(&alerting).await;

        Ok(Outcome::status(self.settled_status(&settings)))
    }

    async fn on_config_changed(&self) -> Result<Outcome, ReconcileError> {
        self.ensure_connected()?;
        let settings = self.model.settings().parse()?;
        let alerting = self.alerting_config()?;

        self.workload.push_config(&self.document(&settings))?;
        self.workload.restart(self.profile.targets())?;
        self.push_alerting_config(&alerting).await;

        Ok(Outcome::status(self.settled_status(&settings)))
    }

    async fn on_relation_changed(&self) -> Result<Outcome, ReconcileError> {
        self.ensure_connected()?;

        let mut failed_groups = Vec::new();
        for (relation, file) in self.model.alert_rules() {
            for group in &file.groups {
                let id = format!("{relation}/{}", group.name);
                if let Err(e) = group.validate() {
                    warn!(group = %id, error = %e, "skipping invalid rule group");
                    failed_groups.push(id);
                    continue;
                }
                match self.rules.set_rule_group(group).await {
                    Ok(status) => debug!(group = %id, status, "pushed rule group"),
                    Err(e) => {
                        warn!(group = %id, error = %e, "failed to push rule group");
                        failed_groups.push(id);
                    }
                }
            }
        }

        if !failed_groups.is_empty() {
            warn!(failed = ?failed_groups, "some rule groups were not pushed");
        }
        // Rules are pushed even when the settings are invalid.
        let status = match self.model.settings().parse() {
            Ok(settings) => self.settled_status(&settings),
            Err(e) => Status::from(&ReconcileError::from(e)),
        };
        Ok(Outcome {
            status,
            failed_groups,
        })
    }

    /// Status once an event's work is done. A multi-unit deployment without
    /// shared storage stays blocked until the settings change.
    fn settled_status(&self, settings: &MimirSettings) -> Status {
        let planned = self.model.planned_units();
        if planned > 1 && !settings.has_object_store() {
            warn!(planned_units = planned, "multiple units without object storage");
            Status::Blocked(NEEDS_SHARED_STORAGE.to_string())
        } else {
            Status::Active
        }
    }

    async fn push_alerting_config(&self, config: &AlertingConfiguration) {
        match self.rules.set_alerting_config(config).await {
            Ok(status) => debug!(status, "pushed alerting configuration"),
            Err(e) => warn!(error = %e, "failed to push alerting configuration"),
        }
    }
}
