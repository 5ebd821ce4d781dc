//! The Mimir configuration document.
//!
//! Every section Mimir reads from `config.yaml` is a typed struct here, so a
//! rendered document can be compared field by field and read back without
//! loss.

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::error::Result;

/// HTTP port Mimir listens on.
pub const MIMIR_PORT: u16 = 9009;

/// Where the rendered configuration is written inside the workload.
pub const MIMIR_CONFIG_FILE: &str = "/etc/mimir/config.yaml";

/// Key-value backend used by every ring in this deployment profile.
pub const KV_STORE: &str = "memberlist";

/// Replication factor for ingesters and store gateways.
pub const REPLICATION_FACTOR: u32 = 1;

/// Server log verbosity.
pub const LOG_LEVEL: &str = "error";

/// Fixed local directories used by the filesystem backends.
pub mod dirs {
    /// TSDB head blocks.
    pub const TSDB: &str = "/tmp/mimir/tsdb";
    /// Filesystem block storage.
    pub const DATA: &str = "/tmp/mimir/data/tsdb";
    /// Compactor scratch space.
    pub const COMPACTOR: &str = "/tmp/mimir/compactor";
    /// Filesystem rule storage.
    pub const RULES: &str = "/tmp/mimir/rules";
    /// Filesystem alertmanager storage.
    pub const DATA_ALERTMANAGER: &str = "/tmp/mimir/data-alertmanager";
    /// Rule storage for the anonymous tenant.
    pub const TENANT_RULES: &str = "/tmp/mimir/rules/anonymous";
}

/// Directories that must exist before Mimir starts.
#[must_use]
pub const fn required_directories() -> [&'static str; 6] {
    [
        dirs::TSDB,
        dirs::DATA,
        dirs::COMPACTOR,
        dirs::RULES,
        dirs::DATA_ALERTMANAGER,
        dirs::TENANT_RULES,
    ]
}

/// Local filesystem location for a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemStorage {
    /// Directory holding the stored objects.
    pub dir: String,
}

/// Backend selection for a storage section.
///
/// Serialises as `backend: filesystem` plus a `filesystem` block, or
/// `backend: s3` plus the object store block verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageBackend {
    /// Per-instance local directory.
    Filesystem {
        /// Directory settings.
        filesystem: FilesystemStorage,
    },
    /// Shared object store.
    S3 {
        /// Operator-supplied credentials and bucket block.
        s3: Mapping,
    },
}

impl StorageBackend {
    /// Filesystem backend rooted at `dir`.
    #[must_use]
    pub fn filesystem(dir: impl Into<String>) -> Self {
        Self::Filesystem {
            filesystem: FilesystemStorage { dir: dir.into() },
        }
    }

    /// Returns true for the object store backend.
    #[must_use]
    pub const fn is_object_store(&self) -> bool {
        matches!(self, Self::S3 { .. })
    }
}

/// TSDB settings for block storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsdbConfig {
    /// Head block directory.
    pub dir: String,
    /// How long blocks are kept.
    pub retention_period: String,
}

/// `blocks_storage` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlocksStorageConfig {
    /// Backend selection.
    #[serde(flatten)]
    pub backend: StorageBackend,
    /// TSDB settings.
    pub tsdb: TsdbConfig,
}

/// `ruler_storage` and `alertmanager_storage` sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection.
    #[serde(flatten)]
    pub backend: StorageBackend,
}

/// Ring key-value store reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvStoreConfig {
    /// Backend identifier.
    pub store: String,
}

impl Default for KvStoreConfig {
    fn default() -> Self {
        Self {
            store: KV_STORE.to_string(),
        }
    }
}

/// Distributor ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorRing {
    /// Address advertised to the ring.
    pub instance_addr: String,
    /// Ring backend.
    pub kvstore: KvStoreConfig,
}

/// `distributor` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorConfig {
    /// Ring settings.
    pub ring: DistributorRing,
}

/// Ingester ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngesterRing {
    /// Address advertised to the ring.
    pub instance_addr: String,
    /// Ring backend.
    pub kvstore: KvStoreConfig,
    /// Copies kept of each series.
    pub replication_factor: u32,
}

/// `ingester` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngesterConfig {
    /// Ring settings.
    pub ring: IngesterRing,
}

/// Compactor sharding ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactorRing {
    /// Ring backend.
    pub kvstore: KvStoreConfig,
}

/// `compactor` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactorConfig {
    /// Scratch directory.
    pub data_dir: String,
    /// Ring settings.
    pub sharding_ring: CompactorRing,
}

/// Store gateway sharding ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreGatewayRing {
    /// Copies kept of each block.
    pub replication_factor: u32,
}

/// `store_gateway` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreGatewayConfig {
    /// Ring settings.
    pub sharding_ring: StoreGatewayRing,
}

/// `ruler` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulerConfig {
    /// Where the ruler sends firing alerts.
    pub alertmanager_url: String,
}

/// `server` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port.
    pub http_listen_port: u16,
    /// Log verbosity.
    pub log_level: String,
}

/// `memberlist` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberlistConfig {
    /// This node's name in the gossip cluster.
    pub node_name: String,
    /// Addresses contacted at startup, this node included.
    pub join_members: Vec<String>,
}

/// The full Mimir configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    /// Tenant isolation; off in this profile.
    pub multitenancy_enabled: bool,
    /// Block storage.
    pub blocks_storage: BlocksStorageConfig,
    /// Rule storage.
    pub ruler_storage: StorageConfig,
    /// Alertmanager state storage.
    pub alertmanager_storage: StorageConfig,
    /// Compactor.
    pub compactor: CompactorConfig,
    /// Distributor.
    pub distributor: DistributorConfig,
    /// Ingester.
    pub ingester: IngesterConfig,
    /// Store gateway.
    pub store_gateway: StoreGatewayConfig,
    /// Ruler.
    pub ruler: RulerConfig,
    /// HTTP server.
    pub server: ServerConfig,
    /// Gossip membership.
    pub memberlist: MemberlistConfig,
}

impl ConfigurationDocument {
    /// Render the document as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Read a rendered document back.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not describe a configuration document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Returns true if every storage section uses the object store.
    #[must_use]
    pub const fn uses_object_store(&self) -> bool {
        self.blocks_storage.backend.is_object_store()
            && self.ruler_storage.backend.is_object_store()
            && self.alertmanager_storage.backend.is_object_store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    #[test]
    fn filesystem_backend_serializes_with_tag() {
        let storage = StorageConfig {
            backend: StorageBackend::filesystem(dirs::RULES),
        };
        let value = serde_yaml::to_value(&storage).expect("serialize");
        let expected: Value =
            serde_yaml::from_str("backend: filesystem\nfilesystem:\n  dir: /tmp/mimir/rules\n")
                .expect("yaml");
        assert_eq!(value, expected);
    }

    #[test]
    fn object_store_backend_serializes_verbatim() {
        let block: Mapping = serde_yaml::from_str("bucket_name: mimir\nendpoint: s3.local\n")
            .expect("yaml");
        let storage = StorageConfig {
            backend: StorageBackend::S3 { s3: block },
        };
        let value = serde_yaml::to_value(&storage).expect("serialize");
        let expected: Value = serde_yaml::from_str(
            "backend: s3\ns3:\n  bucket_name: mimir\n  endpoint: s3.local\n",
        )
        .expect("yaml");
        assert_eq!(value, expected);
    }

    #[test]
    fn storage_backend_reads_back() {
        let storage: StorageConfig =
            serde_yaml::from_str("backend: filesystem\nfilesystem:\n  dir: /data\n")
                .expect("deserialize");
        assert_eq!(storage.backend, StorageBackend::filesystem("/data"));
        assert!(!storage.backend.is_object_store());
    }

    #[test]
    fn required_directories_include_tenant_rules() {
        let required = required_directories();
        assert!(required.contains(&dirs::TENANT_RULES));
        assert!(required.contains(&dirs::TSDB));
    }
}
