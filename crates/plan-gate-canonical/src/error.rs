use thiserror::Error;

/// Errors from canonical serialization and strict parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonicalError {
    #[error("number cannot be represented as a finite IEEE-754 double: {0}")]
    NonFiniteNumber(String),

    #[error("duplicate key: '{key}' appears multiple times in object")]
    DuplicateKey { key: String },

    #[error("max depth exceeded: JSON nested deeper than {max_depth} levels")]
    MaxDepthExceeded { max_depth: usize },

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid digest '{value}': {reason}")]
    InvalidDigest { value: String, reason: String },
}
