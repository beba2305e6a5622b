//! Error types for datatype canonicalization

use thiserror::Error;

use crate::datatype::TypeName;

/// Result type for datatype operations
pub type Result<T> = std::result::Result<T, DatatypeError>;

/// Datatype canonicalization errors
#[derive(Error, Debug)]
pub enum DatatypeError {
    #[error("Missing definition for datatype: {name}")]
    MissingDefinition { name: TypeName },

    #[error("Reference cycle between datatypes: {}", members.join(" -> "))]
    ReferenceCycle { members: Vec<TypeName> },

    #[error("Invalid source {source_key}: {reason}")]
    InvalidSource { source_key: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl DatatypeError {
    /// Create a missing definition error
    pub fn missing(name: impl Into<TypeName>) -> Self {
        Self::MissingDefinition { name: name.into() }
    }
}
