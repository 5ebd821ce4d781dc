//! Error types for the mimir-alerts crate.

use thiserror::Error;

/// Errors raised while building rule groups or alerting configuration.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Invalid alert rule or rule group.
    #[error("invalid alert rule: {reason}")]
    InvalidRule {
        /// The reason the rule is invalid.
        reason: String,
    },

    /// Operator-supplied alerting configuration could not be parsed.
    #[error("malformed alerting configuration: {reason}")]
    MalformedInput {
        /// What failed to parse.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_yaml::Error> for AlertError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;

/// A failed call against the Mimir HTTP API.
///
/// These are returned as values and logged at debug level by the client;
/// none of them is meant to stop the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleApiError {
    /// The request URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Connection refused, reset, DNS failure and similar.
    #[error("request to {url} failed: {reason}")]
    Transport {
        /// Target URL.
        url: String,
        /// Underlying error.
        reason: String,
    },

    /// No response within the request timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Target URL.
        url: String,
    },

    /// The API answered with a non-2xx status.
    #[error("request to {url} returned status {code}")]
    Status {
        /// Target URL.
        url: String,
        /// HTTP status code.
        code: u16,
    },

    /// The request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_rule() {
        let err = AlertError::InvalidRule {
            reason: "empty name".to_string(),
        };
        assert_eq!(err.to_string(), "invalid alert rule: empty name");
    }

    #[test]
    fn error_display_malformed_input() {
        let err = AlertError::MalformedInput {
            reason: "route must be a mapping".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed alerting configuration: route must be a mapping"
        );
    }

    #[test]
    fn error_from_serde_yaml() {
        let yaml_err = serde_yaml::from_str::<u32>("not a number").unwrap_err();
        let err: AlertError = yaml_err.into();
        assert!(matches!(err, AlertError::SerializationError(_)));
    }

    #[test]
    fn api_error_display_status() {
        let err = RuleApiError::Status {
            url: "http://localhost:9009/api/v1/alerts".to_string(),
            code: 503,
        };
        assert_eq!(
            err.to_string(),
            "request to http://localhost:9009/api/v1/alerts returned status 503"
        );
    }

    #[test]
    fn api_error_display_timeout() {
        let err = RuleApiError::Timeout {
            url: "http://mimir:9009/prometheus/api/v1/alerts".to_string(),
        };
        assert!(err.to_string().ends_with("timed out"));
    }
}
