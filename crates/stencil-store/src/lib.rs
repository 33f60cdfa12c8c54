//! Persistence collaborator for Stencil.
//!
//! Blueprints that `create` documents hand the resolved, fully static
//! document to a [`DocumentStore`] and keep the returned [`DocumentId`] until
//! cleanup. The store is the only place a document leaves memory; Stencil
//! never inspects what the store does with it beyond the round trip.
//!
//! # Storage Backends
//!
//! - [`InMemoryDocumentStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. `insert` assigns the identifier; callers never pick one unless the
//!    document already carries an `_id`.
//! 2. `find_one` returns the stored form, which may differ from what was
//!    inserted (the in-memory store prepends `_id`).
//! 3. `remove` reports whether the identifier existed; absence is not an
//!    error at this layer.
//!
//! [`DocumentId`]: stencil_types::DocumentId

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryDocumentStore;
pub use traits::DocumentStore;
