//! Error types for lazy resolution.

use thiserror::Error;

/// Boxed error used to carry failures from outside this crate (fragment
/// expansion, nested persistence calls) through a generator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while reading or resolving a lazy tree.
#[derive(Debug, Error)]
pub enum LazyError {
    /// A map node has no entry under the requested key.
    #[error("missing key `{key}` at {path}")]
    MissingKey { path: String, key: String },

    /// A list node is shorter than the requested index.
    #[error("index {index} out of bounds at {path} (len {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    /// A keyed read was attempted on a list, or an indexed read on a map,
    /// or a nested read on a scalar.
    #[error("{path} is {actual}, expected {expected}")]
    ShapeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A typed read found a value of another JSON type.
    #[error("value at {path} is {actual}, expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A generator (directly or transitively) read the position it is
    /// currently computing.
    #[error("self-referential read of {path} while it is being evaluated")]
    SelfReference { path: String },

    /// An embed was reached in a tree built without a fragment source.
    #[error("cannot embed fragment `{fragment}` at {path}: no fragment source attached")]
    NoFragmentSource { fragment: String, path: String },

    /// A fragment embeds itself, directly or through other fragments.
    #[error("fragment `{fragment}` embeds itself at {path}")]
    EmbedCycle { fragment: String, path: String },

    /// The fragment source failed to expand an embed.
    #[error("failed to expand fragment `{fragment}` at {path}: {source}")]
    Expand {
        fragment: String,
        path: String,
        #[source]
        source: BoxError,
    },

    /// A position whose generator or embed already failed was read again.
    #[error("{path} failed earlier: {reason}")]
    Failed { path: String, reason: String },

    /// A generator failed for a reason outside the tree.
    #[error("generator failed: {0}")]
    Generator(#[source] BoxError),
}

impl LazyError {
    /// Wrap an arbitrary error raised inside a generator.
    pub fn generator(err: impl Into<BoxError>) -> Self {
        Self::Generator(err.into())
    }

    /// A generator failure carrying only a message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Generator(msg.into().into())
    }
}

/// Convenience alias for lazy tree operations.
pub type LazyResult<T> = Result<T, LazyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_wraps_foreign_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = LazyError::generator(io);
        assert_eq!(err.to_string(), "generator failed: disk on fire");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn message_builds_generator_error() {
        let err = LazyError::message("no registry");
        assert!(matches!(err, LazyError::Generator(_)));
        assert_eq!(err.to_string(), "generator failed: no registry");
    }
}
