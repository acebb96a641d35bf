use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON input: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Malformed wire input: {0}")]
    Conversion(String),

    #[error("Inconsistent plan: {0}")]
    Inconsistency(String),

    #[error("Constraint '{constraint}' cannot be satisfied: {detail}")]
    Injection { constraint: String, detail: String },

    #[error("Constraint kind '{0}' only supports the continuous restriction")]
    UnsupportedRestriction(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
