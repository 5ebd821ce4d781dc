//! Read-only views of the unit's orchestration context.
//!
//! [`RelationView`] is a relation's per-unit data bag; [`UnitModel`] is what
//! the controller reads about its own unit. [`StaticRelation`] and
//! [`StaticModel`] are in-memory implementations, loadable from JSON for the
//! CLI dry run.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use mimir_alerts::RuleFile;
use mimir_config::{CharmSettings, ConfigError};

/// Read access to one relation's remote unit data.
pub trait RelationView: Send + Sync {
    /// Remote units currently visible on the relation.
    fn remote_units(&self) -> Vec<String>;

    /// A field published by `unit`, if any.
    fn get_field(&self, unit: &str, field: &str) -> Option<String>;
}

/// The local unit's view of its orchestration context.
pub trait UnitModel: Send + Sync {
    /// Local unit identifier, e.g. `mimir-writer/0`.
    fn unit_name(&self) -> String;

    /// Current operator settings.
    fn settings(&self) -> CharmSettings;

    /// How many units the deployment is planned to have.
    fn planned_units(&self) -> u32;

    /// The peer relation, once it exists.
    fn peer_relation(&self) -> Option<Arc<dyn RelationView>>;

    /// Rule files published by each upstream relation, keyed by relation id.
    fn alert_rules(&self) -> BTreeMap<String, RuleFile>;

    /// Publish this unit's hostname on the peer relation.
    fn publish_peer_hostname(&self, hostname: &str);
}

/// In-memory relation data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticRelation {
    units: BTreeMap<String, BTreeMap<String, String>>,
}

impl StaticRelation {
    /// Creates a relation with no remote units.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a remote unit that has published nothing.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.units.entry(unit.into()).or_default();
        self
    }

    /// Adds a remote unit field.
    #[must_use]
    pub fn with_field(
        mut self,
        unit: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.units
            .entry(unit.into())
            .or_default()
            .insert(field.into(), value.into());
        self
    }
}

impl RelationView for StaticRelation {
    fn remote_units(&self) -> Vec<String> {
        self.units.keys().cloned().collect()
    }

    fn get_field(&self, unit: &str, field: &str) -> Option<String> {
        self.units.get(unit)?.get(field).cloned()
    }
}

/// Serializable snapshot backing a [`StaticModel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSnapshot {
    /// Local unit identifier.
    pub unit_name: String,
    /// Operator settings.
    pub settings: CharmSettings,
    /// Planned unit count.
    pub planned_units: u32,
    /// Peer relation data; `None` when the relation does not exist yet.
    pub peers: Option<StaticRelation>,
    /// Upstream rule files keyed by relation id.
    pub alert_rules: BTreeMap<String, RuleFile>,
}

impl Default for ModelSnapshot {
    fn default() -> Self {
        Self {
            unit_name: "mimir-writer/0".to_string(),
            settings: CharmSettings::default(),
            planned_units: 1,
            peers: None,
            alert_rules: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct ModelState {
    snapshot: ModelSnapshot,
    published: BTreeMap<String, String>,
}

/// In-memory [`UnitModel`].
#[derive(Debug, Default)]
pub struct StaticModel {
    state: RwLock<ModelState>,
}

impl StaticModel {
    /// Creates a model from a snapshot.
    #[must_use]
    pub fn new(snapshot: ModelSnapshot) -> Self {
        Self {
            state: RwLock::new(ModelState {
                snapshot,
                published: BTreeMap::new(),
            }),
        }
    }

    /// Load a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a snapshot.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    /// Replace the operator settings.
    pub fn set_settings(&self, settings: CharmSettings) {
        self.state.write().snapshot.settings = settings;
    }

    /// Replace the planned unit count.
    pub fn set_planned_units(&self, units: u32) {
        self.state.write().snapshot.planned_units = units;
    }

    /// Replace the peer relation.
    pub fn set_peers(&self, peers: Option<StaticRelation>) {
        self.state.write().snapshot.peers = peers;
    }

    /// Replace one upstream relation's rule file.
    pub fn set_alert_rules(&self, relation: impl Into<String>, rules: RuleFile) {
        self.state
            .write()
            .snapshot
            .alert_rules
            .insert(relation.into(), rules);
    }

    /// A field this unit has published on the peer relation.
    #[must_use]
    pub fn published(&self, field: &str) -> Option<String> {
        self.state.read().published.get(field).cloned()
    }
}

impl UnitModel for StaticModel {
    fn unit_name(&self) -> String {
        self.state.read().snapshot.unit_name.clone()
    }

    fn settings(&self) -> CharmSettings {
        self.state.read().snapshot.settings.clone()
    }

    fn planned_units(&self) -> u32 {
        self.state.read().snapshot.planned_units
    }

    fn peer_relation(&self) -> Option<Arc<dyn RelationView>> {
        self.state
            .read()
            .snapshot
            .peers
            .clone()
            .map(|r| Arc::new(r) as Arc<dyn RelationView>)
    }

    fn alert_rules(&self) -> BTreeMap<String, RuleFile> {
        self.state.read().snapshot.alert_rules.clone()
    }

    fn publish_peer_hostname(&self, hostname: &str) {
        self.state
            .write()
            .published
            .insert(crate::peers::PEER_HOSTNAME_FIELD.to_string(), hostname.to_string());
    }
}
