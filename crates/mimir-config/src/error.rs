//! Error types for the mimir-config crate.

use thiserror::Error;

/// Errors raised while parsing operator settings or rendering configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An operator-supplied setting could not be parsed.
    #[error("malformed {field}: {reason}")]
    MalformedInput {
        /// The setting that failed to parse.
        field: String,
        /// Why it failed.
        reason: String,
    },

    /// A settings file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A settings file is not valid JSON.
    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration document could not be rendered or read back.
    #[error("render error: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Creates a malformed input error for the named setting.
    #[must_use]
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_malformed_input() {
        let err = ConfigError::malformed("s3", "expected a mapping");
        assert_eq!(err.to_string(), "malformed s3: expected a mapping");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConfigError = io_err.into();
        assert!(err.to_string().starts_with("io error"));
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
