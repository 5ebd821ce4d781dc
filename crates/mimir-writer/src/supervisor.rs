//! Process supervisor interface.
//!
//! The workload container runs a supervision daemon that owns the Mimir
//! process and the container filesystem. [`Supervisor`] is the narrow set of
//! primitives the controller needs from it; [`FakeSupervisor`] is an
//! in-memory implementation for tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::SupervisorError;

/// How a layer's service definition combines with an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverridePolicy {
    /// Replace the existing definition entirely.
    #[default]
    Replace,
}

/// Whether a service starts with the supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    /// Started at boot.
    #[default]
    Enabled,
}

/// What the supervisor does when the service exits with an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureAction {
    /// Restart the service after a backoff.
    #[default]
    Restart,
}

/// A supervised service definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Combination policy.
    #[serde(rename = "override")]
    pub override_policy: OverridePolicy,
    /// Short description.
    pub summary: String,
    /// Command line.
    pub command: String,
    /// Boot behaviour.
    pub startup: Startup,
    /// Restart policy.
    #[serde(rename = "on-failure", default)]
    pub on_failure: FailureAction,
}

/// A service layer: a named bundle of service definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Short description.
    pub summary: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Services by name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
}

impl Layer {
    /// Render the layer as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Primitives consumed from the process supervisor.
pub trait Supervisor: Send + Sync {
    /// Returns true if the supervisor is reachable.
    fn can_connect(&self) -> bool;

    /// Add a layer under `label`, combining with an existing layer of that
    /// label when `combine` is set.
    fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<(), SupervisorError>;

    /// Start services. Already running services are left alone.
    fn start(&self, services: &[&str]) -> Result<(), SupervisorError>;

    /// Stop services. Already stopped services are left alone.
    fn stop(&self, services: &[&str]) -> Result<(), SupervisorError>;

    /// Returns true if `path` exists in the workload filesystem.
    fn exists(&self, path: &str) -> Result<bool, SupervisorError>;

    /// Create a directory.
    fn make_dir(&self, path: &str, make_parents: bool) -> Result<(), SupervisorError>;

    /// Write a file.
    fn push(&self, path: &str, content: &str, make_dirs: bool) -> Result<(), SupervisorError>;
}

/// A call made against a [`FakeSupervisor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCall {
    /// `add_layer` with this label.
    AddLayer(String),
    /// `start` with these services.
    Start(Vec<String>),
    /// `stop` with these services.
    Stop(Vec<String>),
    /// `make_dir` for this path.
    MakeDir(String),
    /// `push` to this path.
    Push(String),
}

#[derive(Debug, Default)]
struct FakeState {
    disconnected: bool,
    layers: BTreeMap<String, Layer>,
    files: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
    running: BTreeSet<String>,
    calls: Vec<SupervisorCall>,
}

impl FakeState {
    fn check_connected(&self) -> Result<(), SupervisorError> {
        if self.disconnected {
            return Err(SupervisorError::ConnectionFailed(
                "supervisor socket unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "/" || self.dirs.contains(path)
    }

    fn is_defined(&self, service: &str) -> bool {
        self.layers.values().any(|l| l.services.contains_key(service))
    }

    fn create_dir_all(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            let s = ancestor.to_string_lossy();
            if s.is_empty() || s == "/" {
                continue;
            }
            self.dirs.insert(s.into_owned());
        }
    }
}

fn parent_of(path: &str) -> String {
    Path::new(path)
        .parent()
        .map_or_else(|| "/".to_string(), |p| p.to_string_lossy().into_owned())
}

/// In-memory supervisor.
#[derive(Debug, Default)]
pub struct FakeSupervisor {
    state: RwLock<FakeState>,
}

impl FakeSupervisor {
    /// Create a reachable fake supervisor with an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fake supervisor that cannot be reached.
    #[must_use]
    pub fn disconnected() -> Self {
        let fake = Self::default();
        fake.set_connectable(false);
        fake
    }

    /// Toggle reachability.
    pub fn set_connectable(&self, connectable: bool) {
        self.state.write().disconnected = !connectable;
    }

    /// Contents of a pushed file.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<String> {
        self.state.read().files.get(path).cloned()
    }

    /// Returns true if the directory exists.
    #[must_use]
    pub fn has_dir(&self, path: &str) -> bool {
        self.state.read().is_dir(path)
    }

    /// Returns true if the service is running.
    #[must_use]
    pub fn is_running(&self, service: &str) -> bool {
        self.state.read().running.contains(service)
    }

    /// The layer stored under `label`.
    #[must_use]
    pub fn layer(&self, label: &str) -> Option<Layer> {
        self.state.read().layers.get(label).cloned()
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SupervisorCall> {
        self.state.read().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.write().calls.clear();
    }
}

impl Supervisor for FakeSupervisor {
    fn can_connect(&self) -> bool {
        !self.state.read().disconnected
    }

    fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<(), SupervisorError> {
        let mut state = self.state.write();
        state.check_connected()?;
        state.calls.push(SupervisorCall::AddLayer(label.to_string()));

        match state.layers.get_mut(label) {
            Some(existing) if combine => {
                for (name, service) in &layer.services {
                    existing.services.insert(name.clone(), service.clone());
                }
                existing.summary.clone_from(&layer.summary);
                existing.description.clone_from(&layer.description);
            }
            Some(_) => {
                return Err(SupervisorError::Api(format!(
                    "layer \"{label}\" already exists"
                )));
            }
            None => {
                state.layers.insert(label.to_string(), layer.clone());
            }
        }
        Ok(())
    }

    fn start(&self, services: &[&str]) -> Result<(), SupervisorError> {
        let mut state = self.state.write();
        state.check_connected()?;
        state
            .calls
            .push(SupervisorCall::Start(services.iter().map(ToString::to_string).collect()));

        if let Some(unknown) = services.iter().find(|s| !state.is_defined(s)) {
            return Err(SupervisorError::Api(format!(
                "service \"{unknown}\" is not defined"
            )));
        }
        for service in services {
            state.running.insert((*service).to_string());
        }
        Ok(())
    }

    fn stop(&self, services: &[&str]) -> Result<(), SupervisorError> {
        let mut state = self.state.write();
        state.check_connected()?;
        state
            .calls
            .push(SupervisorCall::Stop(services.iter().map(ToString::to_string).collect()));

        if let Some(unknown) = services.iter().find(|s| !state.is_defined(s)) {
            return Err(SupervisorError::Api(format!(
                "service \"{unknown}\" is not defined"
            )));
        }
        for service in services {
            state.running.remove(*service);
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool, SupervisorError> {
        let state = self.state.read();
        state.check_connected()?;
        Ok(state.is_dir(path) || state.files.contains_key(path))
    }

    fn make_dir(&self, path: &str, make_parents: bool) -> Result<(), SupervisorError> {
        let mut state = self.state.write();
        state.check_connected()?;
        state.calls.push(SupervisorCall::MakeDir(path.to_string()));

        if make_parents {
            state.create_dir_all(Path::new(path));
        } else {
            let parent = parent_of(path);
            if !state.is_dir(&parent) {
                return Err(SupervisorError::PathNotFound(parent));
            }
            state.dirs.insert(path.to_string());
        }
        Ok(())
    }

    fn push(&self, path: &str, content: &str, make_dirs: bool) -> Result<(), SupervisorError> {
        let mut state = self.state.write();
        state.check_connected()?;
        state.calls.push(SupervisorCall::Push(path.to_string()));

        let parent = parent_of(path);
        if !state.is_dir(&parent) {
            if !make_dirs {
                return Err(SupervisorError::PathNotFound(parent));
            }
            state.create_dir_all(Path::new(&parent));
        }
        state.files.insert(path.to_string(), content.to_string());
        Ok(())
    }
}
