//! Operator settings.
//!
//! [`CharmSettings`] holds the raw, operator-facing options exactly as they
//! were supplied. [`CharmSettings::parse`] validates them into
//! [`MimirSettings`], the structured input the config builder consumes.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{ConfigError, Result};

/// Retention period applied when the operator leaves it unset.
pub const DEFAULT_RETENTION_PERIOD: &str = "24h";

fn default_retention_period() -> String {
    DEFAULT_RETENTION_PERIOD.to_string()
}

/// Raw operator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmSettings {
    /// Object store block as YAML text. Blank means "use local filesystem".
    #[serde(default)]
    pub s3: Option<String>,
    /// Block retention, e.g. `24h` or `30d`.
    #[serde(default = "default_retention_period")]
    pub retention_period: String,
    /// Alertmanager routing and receivers as YAML text.
    #[serde(default)]
    pub alertmanager_config: Option<String>,
    /// Notification template text.
    #[serde(default)]
    pub alertmanager_templates: Option<String>,
}

impl Default for CharmSettings {
    fn default() -> Self {
        Self {
            s3: None,
            retention_period: default_retention_period(),
            alertmanager_config: None,
            alertmanager_templates: None,
        }
    }
}

impl CharmSettings {
    /// Load settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse settings from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Sets the object store YAML.
    #[must_use]
    pub fn with_s3(mut self, s3: impl Into<String>) -> Self {
        self.s3 = Some(s3.into());
        self
    }

    /// Sets the retention period.
    #[must_use]
    pub fn with_retention_period(mut self, period: impl Into<String>) -> Self {
        self.retention_period = period.into();
        self
    }

    /// Validate the raw settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedInput`] if the object store block is not
    /// a YAML mapping or the retention period is not a valid duration.
    pub fn parse(&self) -> Result<MimirSettings> {
        let object_store = parse_object_store(self.s3.as_deref())?;
        let retention_period = self.retention_period.trim();
        validate_duration(retention_period)
            .map_err(|reason| ConfigError::malformed("retention_period", reason))?;

        Ok(MimirSettings {
            object_store,
            retention_period: retention_period.to_string(),
        })
    }
}

/// Validated settings consumed by [`crate::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct MimirSettings {
    /// Object store block, present only when non-empty.
    pub object_store: Option<Mapping>,
    /// Block retention period.
    pub retention_period: String,
}

impl Default for MimirSettings {
    fn default() -> Self {
        Self {
            object_store: None,
            retention_period: default_retention_period(),
        }
    }
}

impl MimirSettings {
    /// Returns true if durable shared storage is configured.
    #[must_use]
    pub const fn has_object_store(&self) -> bool {
        self.object_store.is_some()
    }
}

fn parse_object_store(raw: Option<&str>) -> Result<Option<Mapping>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let value: Value =
        serde_yaml::from_str(raw).map_err(|e| ConfigError::malformed("s3", e.to_string()))?;

    match value {
        Value::Null => Ok(None),
        Value::Mapping(map) if map.is_empty() => Ok(None),
        Value::Mapping(map) => Ok(Some(map)),
        other => Err(ConfigError::malformed(
            "s3",
            format!("expected a mapping, got {}", value_kind(&other)),
        )),
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Prometheus-style duration: unit groups in descending order, e.g. `1y2w` or `1h30m`.
static DURATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+y)?(\d+w)?(\d+d)?(\d+h)?(\d+m)?(\d+s)?(\d+ms)?$")
        .unwrap_or_else(|_| unreachable!())
});

/// Check a duration such as `1y2w`, `24h`, `90m` or `0`.
fn validate_duration(s: &str) -> std::result::Result<(), String> {
    if s.is_empty() {
        return Err("duration cannot be empty".to_string());
    }
    if s == "0" || DURATION_REGEX.is_match(s) {
        Ok(())
    } else {
        Err(format!("'{s}' is not a duration like 24h, 30d or 1h30m"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;

    #[test]
    fn defaults_apply_to_empty_json() {
        let settings = CharmSettings::from_json("{}").expect("parse");
        assert_eq!(settings, CharmSettings::default());
        assert_eq!(settings.retention_period, "24h");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(br#"{"retention_period": "7d", "s3": "bucket_name: metrics"}"#)
            .expect("write");

        let settings = CharmSettings::from_file(file.path()).expect("load");
        assert_eq!(settings.retention_period, "7d");
        assert_eq!(settings.s3.as_deref(), Some("bucket_name: metrics"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CharmSettings::from_file("/nonexistent/settings.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test_case(None ; "absent")]
    #[test_case(Some("") ; "empty")]
    #[test_case(Some("   \n") ; "whitespace")]
    #[test_case(Some("null") ; "null")]
    #[test_case(Some("{}") ; "empty mapping")]
    fn blank_object_store_means_filesystem(raw: Option<&str>) {
        let settings = CharmSettings {
            s3: raw.map(str::to_string),
            ..CharmSettings::default()
        };
        let parsed = settings.parse().expect("parse");
        assert!(!parsed.has_object_store());
    }

    #[test]
    fn object_store_mapping_is_kept_verbatim() {
        let settings = CharmSettings::default().with_s3(
            "endpoint: s3.example.com\nbucket_name: mimir\naccess_key_id: key\nsecret_access_key: secret\n",
        );
        let parsed = settings.parse().expect("parse");
        let store = parsed.object_store.expect("object store");
        assert_eq!(store.len(), 4);
        assert_eq!(
            store.get("bucket_name"),
            Some(&Value::String("mimir".to_string()))
        );
    }

    #[test_case("just-a-string" ; "scalar")]
    #[test_case("- a\n- b" ; "sequence")]
    #[test_case("key: [unclosed" ; "invalid yaml")]
    fn malformed_object_store_is_rejected(raw: &str) {
        let err = CharmSettings::default().with_s3(raw).parse().unwrap_err();
        assert!(matches!(err, ConfigError::MalformedInput { ref field, .. } if field == "s3"));
    }

    #[test_case("0" ; "zero")]
    #[test_case("24h" ; "hours")]
    #[test_case("30d" ; "days")]
    #[test_case("1y2w" ; "compound")]
    #[test_case("1h30m15s500ms" ; "milliseconds")]
    fn valid_retention_periods(period: &str) {
        let settings = CharmSettings::default().with_retention_period(period);
        assert_eq!(settings.parse().expect("parse").retention_period, period);
    }

    #[test_case("" ; "empty")]
    #[test_case("h" ; "no number")]
    #[test_case("24" ; "no unit")]
    #[test_case("24x" ; "unknown unit")]
    #[test_case("1.5h" ; "fractional")]
    #[test_case("30m1h" ; "units out of order")]
    fn invalid_retention_periods(period: &str) {
        let err = CharmSettings::default()
            .with_retention_period(period)
            .parse()
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::MalformedInput { ref field, .. } if field == "retention_period")
        );
    }

    #[test]
    fn retention_period_is_trimmed() {
        let parsed = CharmSettings::default()
            .with_retention_period(" 12h ")
            .parse()
            .expect("parse");
        assert_eq!(parsed.retention_period, "12h");
    }
}
