//! mimir-writer - lifecycle controller for a Mimir write-path node
//!
//! Reacts to lifecycle events for one unit: discovers peers over the peer
//! relation, renders the Mimir configuration, drives the Mimir process
//! through the container's supervisor, and syncs alert rules and the
//! Alertmanager configuration through Mimir's HTTP API.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mimir_alerts::RuleClient;
//! use mimir_writer::{
//!     Event, FakeSupervisor, PeerDirectory, ReconcileLoop, StaticModel, WorkloadController,
//! };
//!
//! # async fn example() {
//! let mut reconciler = ReconcileLoop::new(
//!     Arc::new(StaticModel::default()),
//!     PeerDirectory::detect("mimir-writer/0"),
//!     WorkloadController::new(Arc::new(FakeSupervisor::new())),
//!     RuleClient::for_host("localhost"),
//! );
//! let outcome = reconciler.handle(Event::WorkloadReady).await;
//! println!("{}", outcome.status);
//! # }
//! ```

pub mod error;
pub mod peers;
pub mod reconcile;
pub mod relation;
pub mod supervisor;
pub mod workload;

pub use error::{ReconcileError, SupervisorError, WorkloadError};
pub use peers::{PeerDirectory, PEER_HOSTNAME_FIELD};
pub use reconcile::{Event, Outcome, ReconcileLoop, Status};
pub use relation::{ModelSnapshot, RelationView, StaticModel, StaticRelation, UnitModel};
pub use supervisor::{FakeSupervisor, Layer, ServiceSpec, Supervisor, SupervisorCall};
pub use workload::{DeploymentProfile, WorkloadController};
