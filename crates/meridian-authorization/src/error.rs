//! Authorization fault types
//!
//! Faults are distinct from denials: a denial is a normal
//! [`Decision`](crate::Decision) value, a fault means no decision could be
//! reached.

use meridian_store::StoreError;

/// Fault raised while evaluating an authorization rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// An internal query used an unsupported capability; a defect in the
    /// rule or catalogue, never caused by the caller
    #[error("Authorization configuration error: {message}")]
    Configuration {
        /// What is misconfigured
        message: String,
    },

    /// Storage failed while gathering facts for the decision
    #[error("Authorization store error: {0}")]
    Store(StoreError),
}

impl AuthorizationError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Short class name for sanitized logging
    pub fn kind(&self) -> &'static str {
        match self {
            AuthorizationError::Configuration { .. } => "Configuration",
            AuthorizationError::Store(err) => err.kind(),
        }
    }
}

impl From<StoreError> for AuthorizationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnsupportedQuery { .. } => Self::configuration(err.to_string()),
            other => Self::Store(other),
        }
    }
}

/// Result type for rule evaluation
pub type AuthResult<T> = std::result::Result<T, AuthorizationError>;
