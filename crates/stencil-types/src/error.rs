use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid document id: {0}")]
    InvalidId(String),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}
