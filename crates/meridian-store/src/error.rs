//! Store error types

use meridian_core::ResourceType;

/// Error type for store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backing storage unavailable or failing
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// What failed
        message: String,
    },

    /// Query uses parameters the store does not understand
    #[error("Unsupported search parameters for {resource_type}: {}", .parameters.join(", "))]
    UnsupportedQuery {
        /// Type searched
        resource_type: ResourceType,
        /// Offending parameter names
        parameters: Vec<String>,
    },

    /// Write would duplicate a natural key held by another resource
    #[error("Unique constraint violated: {key}")]
    UniqueConstraintViolation {
        /// Rendered natural key
        key: String,
    },

    /// Resource does not exist
    #[error("Not found: {resource_type}/{id}")]
    NotFound {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },

    /// Write request is malformed
    #[error("Invalid write: {message}")]
    Invalid {
        /// What is wrong
        message: String,
    },
}

impl StoreError {
    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create an invalid write error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// Short class name for sanitized logging
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unavailable { .. } => "Unavailable",
            StoreError::UnsupportedQuery { .. } => "UnsupportedQuery",
            StoreError::UniqueConstraintViolation { .. } => "UniqueConstraintViolation",
            StoreError::NotFound { .. } => "NotFound",
            StoreError::Invalid { .. } => "Invalid",
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_query_lists_parameters() {
        let err = StoreError::UnsupportedQuery {
            resource_type: ResourceType::Task,
            parameters: vec!["color".into(), "size".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported search parameters for Task: color, size"
        );
        assert_eq!(err.kind(), "UnsupportedQuery");
    }
}
