use thiserror::Error;

use crate::snapshot::Visibility;

/// Errors raised while configuring, composing or invoking overridable methods
#[derive(Error, Debug)]
pub enum OverrideError {
    #[error("Only :only and :except options are accepted (got '{key}')")]
    InvalidConfiguration { key: String },

    #[error("Cannot compose overrides onto '{host}': host has no shadow layer")]
    UnsupportedHostKind { host: String },

    #[error(
        "Visibility of '{method}' on '{host}' changed during composition: expected {expected}, got {actual}"
    )]
    VisibilityInvariantViolation {
        host: String,
        method: String,
        expected: Visibility,
        actual: String,
    },

    #[error("undefined method `{method}' for {receiver}")]
    MethodNotFound { method: String, receiver: String },

    #[error("{visibility} method `{method}' called for {receiver}")]
    VisibilityError {
        method: String,
        visibility: Visibility,
        receiver: String,
    },

    #[error("super: no superclass method `{method}' for {receiver}")]
    NoSuperMethod { method: String, receiver: String },

    #[error("Call depth exceeded while calling `{method}' (limit: {limit})")]
    CallDepthExceeded { method: String, limit: usize },

    #[error("Method `{method}' was called without a block")]
    NoBlockGiven { method: String },

    #[error("Class '{name}' not found")]
    UnknownClass { name: String },

    #[error("Unit '{name}' not found")]
    UnknownUnit { name: String },

    #[error("Cannot include '{unit}' into '{into}': units would include each other")]
    CyclicInclude { unit: String, into: String },

    #[error("'{name}' is already defined")]
    AlreadyDefined { name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Method raised: {0}")]
    Raised(#[from] anyhow::Error),
}

impl OverrideError {
    /// Create an invalid configuration error for an unrecognized option key
    pub fn invalid_configuration(key: &str) -> Self {
        Self::InvalidConfiguration {
            key: key.to_string(),
        }
    }

    /// Create an unsupported host error
    pub fn unsupported_host(host: &str) -> Self {
        Self::UnsupportedHostKind {
            host: host.to_string(),
        }
    }

    /// Create a method not found error
    pub fn method_not_found(method: &str, receiver: &str) -> Self {
        Self::MethodNotFound {
            method: method.to_string(),
            receiver: receiver.to_string(),
        }
    }

    /// Create a visibility error for an external call to a non-public method
    pub fn visibility(method: &str, visibility: Visibility, receiver: &str) -> Self {
        Self::VisibilityError {
            method: method.to_string(),
            visibility,
            receiver: receiver.to_string(),
        }
    }

    /// Create a missing super method error
    pub fn no_super(method: &str, receiver: &str) -> Self {
        Self::NoSuperMethod {
            method: method.to_string(),
            receiver: receiver.to_string(),
        }
    }
}

/// Result type for override composition and invocation
pub type Result<T> = std::result::Result<T, OverrideError>;
