//! Error types for composition.

use thiserror::Error;

use crate::namespace::Kind;

/// Errors that can occur while composing a definition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// A document, trait, or fragment name was never declared.
    #[error("{kind} declaration not found: \"{name}\"")]
    NotFound { kind: Kind, name: String },

    /// A parent chain loops back on itself.
    #[error("{kind} inheritance cycle: {}", chain.join(" -> "))]
    Cycle { kind: Kind, chain: Vec<String> },
}

impl ComposeError {
    pub(crate) fn not_found(kind: Kind, name: &str) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Returns `true` for the not-found class of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias for composition results.
pub type ComposeResult<T> = Result<T, ComposeError>;
