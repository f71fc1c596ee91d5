//! Error types for a3s-data-masking

use thiserror::Error;

/// Why a body could not be turned into scannable segments
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// Body is not valid JSON, or lacks the expected message structure
    #[error("Malformed body: {0}")]
    Malformed(String),

    /// None of the configured paths resolved to a string leaf
    #[error("No field to scan at {0}")]
    NoField(String),
}

/// Errors that can occur in the masking filter
#[derive(Debug, Error)]
pub enum MaskingError {
    /// Extraction failure that the policy escalated
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// No policy is bound to the host
    #[error("No masking policy bound to host '{host}'")]
    PolicyResolution { host: String },

    /// A structurally valid body could not be re-serialized
    #[error("Failed to rewrite body: {0}")]
    Rewrite(String),

    /// A rule pattern failed to compile
    #[error("Invalid pattern in rule '{rule}': {reason}")]
    InvalidPattern { rule: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for masking operations
pub type Result<T> = std::result::Result<T, MaskingError>;
