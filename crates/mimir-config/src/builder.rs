//! Rendering a [`ConfigurationDocument`] from settings and peers.

use tracing::debug;

use crate::document::{
    dirs, BlocksStorageConfig, CompactorConfig, CompactorRing, ConfigurationDocument,
    DistributorConfig, DistributorRing, IngesterConfig, IngesterRing, KvStoreConfig,
    MemberlistConfig, RulerConfig, ServerConfig, StorageBackend, StorageConfig,
    StoreGatewayConfig, StoreGatewayRing, TsdbConfig, LOG_LEVEL, MIMIR_PORT, REPLICATION_FACTOR,
};
use crate::peers::PeerSet;
use crate::settings::MimirSettings;

/// Build the configuration document for the local unit.
///
/// Pure and total: the same `settings` and `peers` always produce an equal
/// document. Object store settings switch every storage section to `s3` at
/// once; otherwise each section gets its fixed local directory.
#[must_use]
pub fn build(settings: &MimirSettings, peers: &PeerSet) -> ConfigurationDocument {
    let backend_for = |dir: &str| match &settings.object_store {
        Some(block) => StorageBackend::S3 { s3: block.clone() },
        None => StorageBackend::filesystem(dir),
    };

    let instance_addr = peers.local_address().to_string();
    debug!(
        unit = %peers.local_unit(),
        members = peers.len(),
        object_store = settings.has_object_store(),
        "building mimir configuration"
    );

    ConfigurationDocument {
        multitenancy_enabled: false,
        blocks_storage: BlocksStorageConfig {
            backend: backend_for(dirs::DATA),
            tsdb: TsdbConfig {
                dir: dirs::TSDB.to_string(),
                retention_period: settings.retention_period.clone(),
            },
        },
        ruler_storage: StorageConfig {
            backend: backend_for(dirs::RULES),
        },
        alertmanager_storage: StorageConfig {
            backend: backend_for(dirs::DATA_ALERTMANAGER),
        },
        compactor: CompactorConfig {
            data_dir: dirs::COMPACTOR.to_string(),
            sharding_ring: CompactorRing {
                kvstore: KvStoreConfig::default(),
            },
        },
        distributor: DistributorConfig {
            ring: DistributorRing {
                instance_addr: instance_addr.clone(),
                kvstore: KvStoreConfig::default(),
            },
        },
        ingester: IngesterConfig {
            ring: IngesterRing {
                instance_addr,
                kvstore: KvStoreConfig::default(),
                replication_factor: REPLICATION_FACTOR,
            },
        },
        store_gateway: StoreGatewayConfig {
            sharding_ring: StoreGatewayRing {
                replication_factor: REPLICATION_FACTOR,
            },
        },
        ruler: RulerConfig {
            alertmanager_url: format!("http://localhost:{MIMIR_PORT}/alertmanager"),
        },
        server: ServerConfig {
            http_listen_port: MIMIR_PORT,
            log_level: LOG_LEVEL.to_string(),
        },
        memberlist: MemberlistConfig {
            node_name: peers.local_unit().to_string(),
            join_members: peers.addresses().map(str::to_string).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FilesystemStorage;
    use crate::settings::CharmSettings;
    use proptest::prelude::*;
    use serde_yaml::{Mapping, Value};

    fn local_peers() -> PeerSet {
        PeerSet::new("mimir-writer/0", "mimir-writer-0.mimir-writer-endpoints")
    }

    fn object_store() -> Mapping {
        serde_yaml::from_str(
            "endpoint: s3.example.com\nbucket_name: mimir\naccess_key_id: ak\nsecret_access_key: sk\n",
        )
        .expect("yaml")
    }

    #[test]
    fn filesystem_block_storage_matches_expected_layout() {
        let settings = CharmSettings::default()
            .with_retention_period("24h")
            .parse()
            .expect("parse");
        let doc = build(&settings, &local_peers());

        assert_eq!(
            doc.blocks_storage,
            BlocksStorageConfig {
                backend: StorageBackend::Filesystem {
                    filesystem: FilesystemStorage {
                        dir: "/tmp/mimir/data/tsdb".to_string(),
                    },
                },
                tsdb: TsdbConfig {
                    dir: "/tmp/mimir/tsdb".to_string(),
                    retention_period: "24h".to_string(),
                },
            }
        );

        let rendered = serde_yaml::to_value(&doc.blocks_storage).expect("serialize");
        let expected: Value = serde_yaml::from_str(
            "backend: filesystem\n\
             filesystem:\n  dir: /tmp/mimir/data/tsdb\n\
             tsdb:\n  dir: /tmp/mimir/tsdb\n  retention_period: 24h\n",
        )
        .expect("yaml");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn object_store_applies_to_every_storage_section() {
        let settings = MimirSettings {
            object_store: Some(object_store()),
            ..MimirSettings::default()
        };
        let doc = build(&settings, &local_peers());

        assert!(doc.uses_object_store());
        for backend in [
            &doc.blocks_storage.backend,
            &doc.ruler_storage.backend,
            &doc.alertmanager_storage.backend,
        ] {
            assert_eq!(
                backend,
                &StorageBackend::S3 {
                    s3: object_store()
                }
            );
        }
        assert_eq!(doc.blocks_storage.tsdb.dir, dirs::TSDB);
    }

    #[test]
    fn ring_and_server_parameters_are_fixed() {
        let doc = build(&MimirSettings::default(), &local_peers());

        assert!(!doc.multitenancy_enabled);
        assert_eq!(doc.ingester.ring.replication_factor, 1);
        assert_eq!(doc.store_gateway.sharding_ring.replication_factor, 1);
        assert_eq!(doc.ingester.ring.kvstore.store, "memberlist");
        assert_eq!(doc.distributor.ring.kvstore.store, "memberlist");
        assert_eq!(doc.compactor.sharding_ring.kvstore.store, "memberlist");
        assert_eq!(
            doc.ingester.ring.instance_addr,
            "mimir-writer-0.mimir-writer-endpoints"
        );
        assert_eq!(doc.server.http_listen_port, 9009);
        assert_eq!(doc.server.log_level, "error");
        assert_eq!(
            doc.ruler.alertmanager_url,
            "http://localhost:9009/alertmanager"
        );
    }

    #[test]
    fn memberlist_joins_every_peer_including_self() {
        let peers = local_peers()
            .with_peer("mimir-writer/1", "h1")
            .with_peer("mimir-writer/2", "h2");
        let doc = build(&MimirSettings::default(), &peers);

        assert_eq!(doc.memberlist.node_name, "mimir-writer/0");
        assert_eq!(
            doc.memberlist.join_members,
            vec!["mimir-writer-0.mimir-writer-endpoints", "h1", "h2"]
        );
    }

    #[test]
    fn rendered_document_reads_back() {
        let settings = MimirSettings {
            object_store: Some(object_store()),
            retention_period: "30d".to_string(),
        };
        let doc = build(&settings, &local_peers().with_peer("mimir-writer/1", "h1"));
        let yaml = doc.to_yaml().expect("render");

        assert!(yaml.contains("multitenancy_enabled: false"));
        assert_eq!(ConfigurationDocument::from_yaml(&yaml).expect("parse"), doc);
    }

    fn peer_sets() -> impl Strategy<Value = PeerSet> {
        prop::collection::btree_map("[a-z]{1,8}/[0-9]", "[a-z0-9.-]{1,20}", 0..6).prop_map(
            |remotes| {
                let mut peers = PeerSet::new("local/0", "local.example");
                for (unit, addr) in remotes {
                    peers.insert(unit, addr);
                }
                peers
            },
        )
    }

    proptest! {
        #[test]
        fn prop_build_is_deterministic(peers in peer_sets(), retention in "[1-9][0-9]{0,2}[hdw]") {
            let settings = MimirSettings { object_store: None, retention_period: retention };
            prop_assert_eq!(build(&settings, &peers), build(&settings, &peers));
        }

        #[test]
        fn prop_no_object_store_means_filesystem_everywhere(peers in peer_sets()) {
            let doc = build(&MimirSettings::default(), &peers);
            prop_assert!(!doc.blocks_storage.backend.is_object_store());
            prop_assert!(!doc.ruler_storage.backend.is_object_store());
            prop_assert!(!doc.alertmanager_storage.backend.is_object_store());
        }

        #[test]
        fn prop_join_members_cover_peer_set(peers in peer_sets()) {
            let doc = build(&MimirSettings::default(), &peers);
            prop_assert_eq!(doc.memberlist.join_members.len(), peers.len());
            for addr in peers.addresses() {
                prop_assert!(doc.memberlist.join_members.iter().any(|m| m == addr));
            }
        }
    }
}
