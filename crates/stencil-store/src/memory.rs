use std::collections::HashMap;
use std::sync::RwLock;

use stencil_types::{Document, DocumentId, TypeError, Value, ID_FIELD};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::DocumentStore;

/// In-memory, HashMap-based document store.
///
/// Intended for tests and embedding. Documents are held behind a `RwLock`
/// and cloned on read/write. Stored documents carry their identifier as a
/// leading `_id` string field.
pub struct InMemoryDocumentStore {
    collection: String,
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store for `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.documents.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.read().expect("lock poisoned").is_empty()
    }

    /// Remove all documents from the store.
    pub fn clear(&self) {
        self.documents.write().expect("lock poisoned").clear();
    }

    /// Sorted list of all stored identifiers (insertion order, as ids are
    /// time-ordered).
    pub fn ids(&self) -> Vec<DocumentId> {
        let map = self.documents.read().expect("lock poisoned");
        let mut ids: Vec<DocumentId> = map.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Identifier for `document`: its own `_id` if it has one, else a fresh one.
    fn assign_id(document: &Document) -> StoreResult<DocumentId> {
        match document.get(ID_FIELD) {
            None => Ok(DocumentId::new()),
            Some(Value::String(raw)) => Ok(raw.parse::<DocumentId>()?),
            Some(other) => {
                let reason = format!("`{ID_FIELD}` must be a string, got {other}");
                Err(TypeError::InvalidId(reason).into())
            }
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new("documents")
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn insert(&self, document: &Document) -> StoreResult<DocumentId> {
        let id = Self::assign_id(document)?;
        let mut stored = Document::new();
        stored.insert(ID_FIELD.to_string(), id.to_value());
        for (key, value) in document {
            if key != ID_FIELD {
                stored.insert(key.clone(), value.clone());
            }
        }

        let mut map = self.documents.write().expect("lock poisoned");
        if map.contains_key(&id) {
            return Err(StoreError::DuplicateId {
                collection: self.collection.clone(),
                id,
            });
        }
        map.insert(id, stored);
        debug!(collection = %self.collection, %id, "inserted document");
        Ok(id)
    }

    fn find_one(&self, id: &DocumentId) -> StoreResult<Option<Document>> {
        let map = self.documents.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn remove(&self, id: &DocumentId) -> StoreResult<bool> {
        let mut map = self.documents.write().expect("lock poisoned");
        let existed = map.remove(id).is_some();
        debug!(collection = %self.collection, %id, existed, "removed document");
        Ok(existed)
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryDocumentStore")
            .field("collection", &self.collection)
            .field("document_count", &count)
            .finish()
    }
}
