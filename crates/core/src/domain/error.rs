// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Missing 'smiles' parameter")]
    MissingSmiles,

    #[error("SMILES must be a single line")]
    MultiLineSmiles,

    #[error("Invalid probability threshold: {0}")]
    InvalidThreshold(String),

    #[error("Invalid input identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
