use stencil_types::{Document, DocumentId};

use crate::error::StoreResult;

/// Where `create`d documents go.
///
/// All implementations must satisfy these invariants:
/// - `insert` either stores the document and returns its identifier, or
///   stores nothing and returns `Err`.
/// - An identifier returned by `insert` stays valid for `find_one` and
///   `remove` until it is removed.
/// - All backend errors are propagated, never silently ignored.
pub trait DocumentStore: Send + Sync {
    /// Name of the collection documents are written to.
    fn collection(&self) -> &str;

    /// Persist a document and return the identifier assigned to it.
    fn insert(&self, document: &Document) -> StoreResult<DocumentId>;

    /// Read a document back in its stored form.
    ///
    /// Returns `Ok(None)` if the identifier is unknown.
    fn find_one(&self, id: &DocumentId) -> StoreResult<Option<Document>>;

    /// Remove a document by identifier. Returns `true` if it existed.
    fn remove(&self, id: &DocumentId) -> StoreResult<bool>;
}
