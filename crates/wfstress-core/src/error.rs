use thiserror::Error;

/// Canonical error type for stress runs.
#[derive(Debug, Error)]
pub enum StressError {
    /// Remote object was not found.
    #[error("{kind} `{name}` was not found")]
    NotFound {
        /// Resource kind (e.g. `"workflow"`).
        kind: &'static str,
        /// Name of the missing object.
        name: String,
    },

    /// Remote API answered with a non-success status.
    #[error("remote API returned {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Request never produced a response (connect, TLS, timeout, decode).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Every creation attempt for one instance failed; the batch was abandoned.
    #[error("submission aborted at index {index} after {attempts} attempts: {source}")]
    SubmitExhausted {
        /// Index of the instance that could not be created.
        index: usize,
        /// Attempts spent on that index.
        attempts: u32,
        /// Error returned by the last attempt.
        #[source]
        source: Box<StressError>,
    },

    /// A round was requested with zero instances.
    #[error("batch size must be greater than zero")]
    EmptyBatch,

    /// Manifest is malformed or lacks a required field.
    #[error("invalid manifest: {0}")]
    Manifest(String),

    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but holds unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while reading manifests or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StressError {
    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a `Remote` variant.
    #[must_use]
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Creates an `InvalidConfig` variant.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true for the not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true when only the current batch submission was abandoned.
    pub fn is_batch_abort(&self) -> bool {
        matches!(self, Self::SubmitExhausted { .. })
    }
}

impl From<serde_yaml::Error> for StressError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Manifest(err.to_string())
    }
}

/// Convenient result alias for stress operations.
pub type StressResult<T> = Result<T, StressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(StressError::not_found("workflow", "stress-0").is_not_found());
        assert!(!StressError::remote(500, "boom").is_not_found());

        let exhausted = StressError::SubmitExhausted {
            index: 7,
            attempts: 5,
            source: Box::new(StressError::remote(409, "AlreadyExists")),
        };
        assert!(exhausted.is_batch_abort());
        assert!(exhausted.to_string().contains("index 7"));
    }
}
