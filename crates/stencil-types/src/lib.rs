//! Foundation types for Stencil.
//!
//! Stencil is a declarative test-fixture generator: blueprints describe the
//! shape of documents, and concrete instances are synthesised (and optionally
//! persisted) on demand. Every other Stencil crate depends on `stencil-types`.
//!
//! # Key Types
//!
//! - [`Document`]: A fully static, resolved document (ordered JSON object)
//! - [`DocumentId`]: Opaque identifier assigned by a persistence backend
//! - [`DEFAULT_DOCUMENT`]: Reserved name of a blueprint's unnamed document

pub mod document;
pub mod error;
pub mod id;

pub use document::{Document, Value, DEFAULT_DOCUMENT, ID_FIELD};
pub use error::TypeError;
pub use id::DocumentId;
