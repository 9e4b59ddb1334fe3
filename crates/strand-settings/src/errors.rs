//! Errors raised while reading the settings file.

use std::path::PathBuf;

/// Settings load failure.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not JSON, or a merged value has the wrong type.
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    /// A value parsed but cannot be used (an endpoint that is not a URL).
    #[error("invalid setting {0}")]
    InvalidValue(String),
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_file() {
        let err = SettingsError::Io {
            path: PathBuf::from("/etc/strand/settings.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "cannot read /etc/strand/settings.json: denied"
        );
    }

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue("api.baseUrl: relative URL".to_owned());
        assert_eq!(err.to_string(), "invalid setting api.baseUrl: relative URL");
    }
}
