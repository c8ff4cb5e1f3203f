//! Error types for WARD operations

use thiserror::Error;

/// Failure of a single fetch attempt, classified for the retry policy.
///
/// `Transient` failures (network unreachable, server unavailable) are
/// eligible for retry. `Permanent` failures (bad request, not found,
/// malformed payload) will not succeed on retry and surface immediately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{message}")]
    Transient { message: String },

    #[error("{message}")]
    Permanent { message: String },
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Returns true if another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }

    /// Human-readable message suitable for an error panel.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message } | Self::Permanent { message } => message,
        }
    }
}

/// Invalid cache key construction.
///
/// These indicate a defect in the calling code and are never retried or
/// swallowed by the cache engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CanonicalizationError {
    #[error("Resource name must not be empty")]
    EmptyResource,

    #[error("Empty parameter name for resource {resource}")]
    EmptyParameterName { resource: String },

    #[error("Duplicate parameter {name} for resource {resource}")]
    DuplicateParameter { resource: String, name: String },

    #[error("Required parameter {name} for resource {resource} is blank")]
    BlankRequiredParameter { resource: String, name: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for WARD core errors.
#[derive(Debug, Clone, Error)]
pub enum WardError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for WARD operations.
pub type WardResult<T> = Result<T, WardError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_classification() {
        let transient = FetchError::transient("connection refused");
        assert!(transient.is_transient());
        assert!(!transient.is_permanent());

        let permanent = FetchError::permanent("404 Not Found");
        assert!(permanent.is_permanent());
        assert!(!permanent.is_transient());
    }

    #[test]
    fn test_fetch_error_display_is_message() {
        let err = FetchError::permanent("API request failed: 404 Not Found");
        assert_eq!(err.to_string(), "API request failed: 404 Not Found");
        assert_eq!(err.message(), "API request failed: 404 Not Found");
    }

    #[test]
    fn test_canonicalization_error_display_duplicate() {
        let err = CanonicalizationError::DuplicateParameter {
            resource: "patients".to_string(),
            name: "limit".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Duplicate parameter"));
        assert!(msg.contains("limit"));
        assert!(msg.contains("patients"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "retry.max_attempts".to_string(),
            value: "0".to_string(),
            reason: "must be >= 1".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("retry.max_attempts"));
        assert!(msg.contains("must be >= 1"));
    }

    #[test]
    fn test_ward_error_from_fetch() {
        let err: WardError = FetchError::transient("timeout").into();
        assert!(matches!(err, WardError::Fetch(_)));
        assert!(err.to_string().contains("timeout"));
    }
}
