//! Alert rule groups and alerting configuration for Mimir, plus a client for
//! the ruler and Alertmanager HTTP APIs.
//!
//! # Features
//!
//! - **Rule groups**: alerting and recording rules in Prometheus rule-file format
//! - **Alerting configuration**: operator routing and templates with a working fallback
//! - **Best-effort client**: calls never panic or escape; failures come back as values
//!
//! # Example
//!
//! ```rust,no_run
//! use mimir_alerts::{AlertRule, AlertRuleGroup, AlertingConfiguration, RuleClient};
//!
//! # async fn run() {
//! let client = RuleClient::for_host("localhost");
//!
//! let group = AlertRuleGroup::new("cpu").with_rule(
//!     AlertRule::new("HighCPU", "cpu_usage > 80")
//!         .for_duration("5m")
//!         .label("severity", "warning"),
//! );
//!
//! if let Err(e) = client.set_rule_group(&group).await {
//!     eprintln!("rule group not written: {e}");
//! }
//! let _ = client.set_alerting_config(&AlertingConfiguration::default()).await;
//!
//! let groups = client.get_rule_groups().await;
//! println!("tenants with rules: {}", groups.len());
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod error;
pub mod types;

// Re-export main types at crate root
pub use client::{RuleClient, DEFAULT_TENANT, DEFAULT_TIMEOUT};
pub use error::{AlertError, Result, RuleApiError};
pub use types::{
    AlertRule, AlertRuleGroup, AlertingConfiguration, RecordingRule, Rule, RuleFile, RuleGroups,
    DEFAULT_ALERTMANAGER_CONFIG, DEFAULT_ALERT_TEMPLATE, DEFAULT_TEMPLATE_NAME,
};
