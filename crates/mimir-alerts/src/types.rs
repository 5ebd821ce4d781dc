//! Core types for rule groups and alerting configuration.
//!
//! - [`AlertRule`] and [`RecordingRule`]: single rule definitions, wrapped in [`Rule`]
//! - [`AlertRuleGroup`]: a named, ordered set of rules evaluated together
//! - [`RuleFile`]: the `groups` document an upstream relation publishes
//! - [`AlertingConfiguration`]: templates plus Alertmanager routing

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{AlertError, Result};

/// Name under which the notification template is registered.
pub const DEFAULT_TEMPLATE_NAME: &str = "default_template";

/// Template used when the operator supplies none.
pub const DEFAULT_ALERT_TEMPLATE: &str = r#"{{ define "__alertmanager" }}AlertManager{{ end }}
{{ define "__alertmanagerURL" }}{{ .ExternalURL }}/#/alerts?receiver={{ .Receiver | urlquery }}{{ end }}
"#;

/// Routing used when the operator supplies none.
///
/// Mimir's Alertmanager refuses to start without at least one receiver, so
/// the fallback routes everything to a local dummy webhook.
pub const DEFAULT_ALERTMANAGER_CONFIG: &str = r#"global:
  http_config:
    tls_config:
      insecure_skip_verify: true
templates:
  - default_template
route:
  group_wait: 30s
  group_interval: 5m
  repeat_interval: 1h
  receiver: dummy
receivers:
  - name: dummy
    webhook_configs:
      - url: http://127.0.0.1:5001/
"#;

/// An alerting rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Alert name.
    #[serde(rename = "alert")]
    pub name: String,
    /// PromQL expression.
    pub expr: String,
    /// How long the expression must hold before the alert fires.
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_duration: Option<String>,
    /// Labels attached to the alert.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations attached to the alert.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl AlertRule {
    /// Creates an alerting rule.
    #[must_use]
    pub fn new(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
            for_duration: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    /// Sets the `for` duration.
    #[must_use]
    pub fn for_duration(mut self, duration: impl Into<String>) -> Self {
        self.for_duration = Some(duration.into());
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// A recording rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingRule {
    /// Name of the recorded series.
    pub record: String,
    /// PromQL expression.
    pub expr: String,
    /// Labels added to the recorded series.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Any rule a group can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rule {
    /// `alert:` rule.
    Alerting(AlertRule),
    /// `record:` rule.
    Recording(RecordingRule),
}

impl Rule {
    /// The alert or record name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Alerting(r) => &r.name,
            Self::Recording(r) => &r.record,
        }
    }

    /// The PromQL expression.
    #[must_use]
    pub fn expr(&self) -> &str {
        match self {
            Self::Alerting(r) => &r.expr,
            Self::Recording(r) => &r.expr,
        }
    }
}

impl From<AlertRule> for Rule {
    fn from(rule: AlertRule) -> Self {
        Self::Alerting(rule)
    }
}

impl From<RecordingRule> for Rule {
    fn from(rule: RecordingRule) -> Self {
        Self::Recording(rule)
    }
}

/// A named group of rules.
///
/// Groups are identified by name within a tenant. Writing a group replaces
/// any existing group of the same name wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRuleGroup {
    /// Group name, unique within a tenant.
    pub name: String,
    /// Evaluation interval override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl AlertRuleGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: None,
            rules: Vec::new(),
        }
    }

    /// Appends a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    /// Check that the group can be written to the ruler.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` if the group or any rule has an
    /// empty name or expression.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AlertError::InvalidRule {
                reason: "rule group name cannot be empty".to_string(),
            });
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.name().trim().is_empty() {
                return Err(AlertError::InvalidRule {
                    reason: format!("rule {idx} in group '{}' has no name", self.name),
                });
            }
            if rule.expr().trim().is_empty() {
                return Err(AlertError::InvalidRule {
                    reason: format!(
                        "rule '{}' in group '{}' has an empty expression",
                        rule.name(),
                        self.name
                    ),
                });
            }
        }

        Ok(())
    }

    /// Render the group as the YAML body the ruler API expects.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Rule groups as published by one upstream relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFile {
    /// Groups in publication order.
    #[serde(default)]
    pub groups: Vec<AlertRuleGroup>,
}

impl RuleFile {
    /// Parse a rule file from YAML or JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a `groups` document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Rule groups keyed by tenant, as returned by the ruler API.
pub type RuleGroups = BTreeMap<String, Vec<AlertRuleGroup>>;

/// Alertmanager configuration: notification templates plus routing.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertingConfiguration {
    /// Template name to template text.
    pub template_files: BTreeMap<String, String>,
    /// Routing and receivers document.
    pub alertmanager_config: Value,
}

impl Default for AlertingConfiguration {
    fn default() -> Self {
        Self {
            template_files: default_templates(),
            alertmanager_config: serde_yaml::from_str(DEFAULT_ALERTMANAGER_CONFIG)
                .unwrap_or_default(),
        }
    }
}

fn default_templates() -> BTreeMap<String, String> {
    BTreeMap::from([(
        DEFAULT_TEMPLATE_NAME.to_string(),
        DEFAULT_ALERT_TEMPLATE.to_string(),
    )])
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

impl AlertingConfiguration {
    /// Build the configuration from operator text, falling back to the
    /// built-in routing and template for whatever is absent.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::MalformedInput` if `config` is not a YAML mapping.
    pub fn from_operator(config: Option<&str>, template: Option<&str>) -> Result<Self> {
        let defaults = Self::default();

        let alertmanager_config = match non_blank(config) {
            Some(text) => {
                let value: Value =
                    serde_yaml::from_str(text).map_err(|e| AlertError::MalformedInput {
                        reason: e.to_string(),
                    })?;
                if !value.is_mapping() {
                    return Err(AlertError::MalformedInput {
                        reason: "alertmanager configuration must be a mapping".to_string(),
                    });
                }
                value
            }
            None => defaults.alertmanager_config,
        };

        let template_files = match non_blank(template) {
            Some(text) => BTreeMap::from([(DEFAULT_TEMPLATE_NAME.to_string(), text.to_string())]),
            None => defaults.template_files,
        };

        Ok(Self {
            template_files,
            alertmanager_config,
        })
    }

    /// Render the request body for `POST /api/v1/alerts`.
    ///
    /// Mimir expects the routing document embedded as a YAML string next to
    /// the template map.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_request_body(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Body<'a> {
            template_files: &'a BTreeMap<String, String>,
            alertmanager_config: String,
        }

        let body = Body {
            template_files: &self.template_files,
            alertmanager_config: serde_yaml::to_string(&self.alertmanager_config)?,
        };
        Ok(serde_yaml::to_string(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const UPSTREAM_RULES: &str = r#"
groups:
  - name: cpu
    rules:
      - alert: HighCPU
        expr: cpu_usage > 80
        for: 5m
        labels:
          severity: warning
        annotations:
          summary: CPU usage is above 80%
      - record: job:cpu_usage:avg
        expr: avg by (job) (cpu_usage)
  - name: memory
    rules:
      - alert: HighMemory
        expr: mem_usage > 90
"#;

    #[test]
    fn rule_file_parses_alert_and_recording_rules() {
        let file = RuleFile::from_yaml(UPSTREAM_RULES).expect("parse");
        assert_eq!(file.groups.len(), 2);

        let cpu = &file.groups[0];
        assert_eq!(cpu.name, "cpu");
        assert_eq!(cpu.rules.len(), 2);
        assert_eq!(
            cpu.rules[0],
            Rule::Alerting(
                AlertRule::new("HighCPU", "cpu_usage > 80")
                    .for_duration("5m")
                    .label("severity", "warning")
                    .annotation("summary", "CPU usage is above 80%")
            )
        );
        assert!(matches!(cpu.rules[1], Rule::Recording(ref r) if r.record == "job:cpu_usage:avg"));
    }

    #[test]
    fn rule_file_without_groups_is_empty() {
        let file = RuleFile::from_yaml("{}").expect("parse");
        assert!(file.groups.is_empty());
    }

    #[test]
    fn group_yaml_reads_back() {
        let group = AlertRuleGroup::new("disk")
            .with_rule(AlertRule::new("DiskFull", "disk_free < 0.1").label("severity", "critical"));
        let yaml = group.to_yaml().expect("render");
        assert!(yaml.contains("alert: DiskFull"));
        let back: AlertRuleGroup = serde_yaml::from_str(&yaml).expect("parse");
        assert_eq!(back, group);
    }

    #[test]
    fn group_yaml_omits_empty_optionals() {
        let yaml = AlertRuleGroup::new("g")
            .with_rule(AlertRule::new("A", "up == 0"))
            .to_yaml()
            .expect("render");
        assert!(!yaml.contains("labels"));
        assert!(!yaml.contains("for:"));
        assert!(!yaml.contains("interval"));
    }

    #[test]
    fn valid_group_passes_validation() {
        let group = AlertRuleGroup::new("ok").with_rule(AlertRule::new("Up", "up == 0"));
        assert!(group.validate().is_ok());
    }

    #[test_case(AlertRuleGroup::new("") ; "empty group name")]
    #[test_case(AlertRuleGroup::new("g").with_rule(AlertRule::new("", "up")) ; "empty rule name")]
    #[test_case(AlertRuleGroup::new("g").with_rule(AlertRule::new("A", " ")) ; "empty expression")]
    fn invalid_groups_fail_validation(group: AlertRuleGroup) {
        assert!(matches!(group.validate(), Err(AlertError::InvalidRule { .. })));
    }

    #[test]
    fn default_alerting_config_routes_to_dummy_receiver() {
        let config = AlertingConfiguration::default();
        assert_eq!(
            config.alertmanager_config["route"]["receiver"],
            Value::String("dummy".to_string())
        );
        assert_eq!(
            config.alertmanager_config["receivers"][0]["webhook_configs"][0]["url"],
            Value::String("http://127.0.0.1:5001/".to_string())
        );
        assert!(config.template_files.contains_key(DEFAULT_TEMPLATE_NAME));
    }

    #[test_case(None, None ; "both absent")]
    #[test_case(Some(""), Some("  ") ; "both blank")]
    fn absent_operator_input_falls_back_to_defaults(config: Option<&str>, template: Option<&str>) {
        let built = AlertingConfiguration::from_operator(config, template).expect("build");
        assert_eq!(built, AlertingConfiguration::default());
    }

    #[test]
    fn operator_config_and_template_are_used() {
        let built = AlertingConfiguration::from_operator(
            Some("route:\n  receiver: pager\nreceivers:\n  - name: pager\n"),
            Some("{{ define \"custom\" }}x{{ end }}"),
        )
        .expect("build");
        assert_eq!(
            built.alertmanager_config["route"]["receiver"],
            Value::String("pager".to_string())
        );
        assert_eq!(
            built.template_files[DEFAULT_TEMPLATE_NAME],
            "{{ define \"custom\" }}x{{ end }}"
        );
    }

    #[test]
    fn operator_config_without_template_keeps_default_template() {
        let built = AlertingConfiguration::from_operator(Some("route:\n  receiver: r\n"), None)
            .expect("build");
        assert_eq!(built.template_files, default_templates());
    }

    #[test_case("- not\n- a mapping" ; "sequence")]
    #[test_case("route: [unclosed" ; "invalid yaml")]
    fn malformed_operator_config_is_rejected(text: &str) {
        let err = AlertingConfiguration::from_operator(Some(text), None).unwrap_err();
        assert!(matches!(err, AlertError::MalformedInput { .. }));
    }

    #[test]
    fn request_body_embeds_config_as_string() {
        let body = AlertingConfiguration::default()
            .to_request_body()
            .expect("render");
        let parsed: Value = serde_yaml::from_str(&body).expect("parse");

        let embedded = parsed["alertmanager_config"]
            .as_str()
            .expect("alertmanager_config is a string");
        let routing: Value = serde_yaml::from_str(embedded).expect("embedded yaml");
        assert_eq!(routing["route"]["group_wait"], Value::String("30s".to_string()));
        assert!(parsed["template_files"][DEFAULT_TEMPLATE_NAME].is_string());
    }
}
