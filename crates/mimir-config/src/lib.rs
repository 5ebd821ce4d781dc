//! Settings, membership and configuration rendering for a Mimir write-path node.
//!
//! `mimir-config` is the pure part of the controller: it turns operator
//! settings and the discovered peer set into the `config.yaml` Mimir reads at
//! startup. Nothing in this crate performs I/O beyond reading a settings file.
//!
//! # Example
//!
//! ```rust
//! use mimir_config::{build, CharmSettings, PeerSet};
//!
//! let settings = CharmSettings::default()
//!     .with_retention_period("24h")
//!     .parse()
//!     .unwrap();
//! let peers = PeerSet::new("mimir-writer/0", "mimir-writer-0.example")
//!     .with_peer("mimir-writer/1", "mimir-writer-1.example");
//!
//! let doc = build(&settings, &peers);
//! assert_eq!(doc.memberlist.join_members.len(), 2);
//! println!("{}", doc.to_yaml().unwrap());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod document;
pub mod error;
pub mod peers;
pub mod settings;

pub use builder::build;
pub use document::{
    required_directories, ConfigurationDocument, StorageBackend, MIMIR_CONFIG_FILE, MIMIR_PORT,
};
pub use error::{ConfigError, Result};
pub use peers::PeerSet;
pub use settings::{CharmSettings, MimirSettings, DEFAULT_RETENTION_PERIOD};
