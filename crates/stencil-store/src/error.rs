use stencil_types::{DocumentId, TypeError};

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested document was not found.
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    /// A document with the same identifier is already stored.
    #[error("duplicate document id {id} in collection `{collection}`")]
    DuplicateId { collection: String, id: DocumentId },

    /// The document carries an `_id` the store cannot use.
    #[error("invalid document id: {0}")]
    InvalidId(#[from] TypeError),

    /// Failure reported by the underlying backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
