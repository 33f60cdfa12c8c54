//! Blueprints and the blueprint registry for Stencil.
//!
//! A [`Blueprint`] declares documents, traits, and fragments and turns them
//! into concrete documents:
//!
//! - [`Blueprint::build`] composes the named document, lays the caller's
//!   overrides on top, and resolves every generator exactly once.
//! - [`Blueprint::create`] builds, inserts through the blueprint's
//!   [`DocumentStore`](stencil_store::DocumentStore), and tracks the new id.
//! - [`Blueprint::cleanup`] removes tracked documents, newest first.
//!
//! A [`Registry`] owns blueprints by name together with the global trait
//! namespace, and offers the same operations keyed by blueprint name. The
//! [`helpers`] module provides ready-made generators (sequences, random
//! values, dates, related-document ids).
//!
//! ```ignore
//! let registry = Registry::new(RegistryConfig::default());
//! registry.declare("user", Some(store), |bp| {
//!     bp.default_document(
//!         AttributeSpec::new()
//!             .with("first", "John")
//!             .with("age", helpers::sequence(|n| n + 20)),
//!     );
//!     Ok(())
//! })?;
//! let user = registry.create("user", None, &AttributeSpec::new())?;
//! registry.cleanup()?;
//! ```

pub mod blueprint;
pub mod config;
pub mod error;
pub mod helpers;
pub mod registry;

pub use blueprint::{Blueprint, BlueprintBuilder, DefinitionHandle, TraitHandle};
pub use config::RegistryConfig;
pub use error::{DeclarationError, FactoryError, FactoryResult};
pub use registry::Registry;

pub use stencil_lazy::{Attr, AttributeSpec, Embed, Generator, LazyError, Scope};
pub use stencil_types::{Document, DocumentId, Value};
