//! Lazy document trees for Stencil.
//!
//! An [`AttributeSpec`] describes a document whose positions may be static
//! values, nested specifications, [`Generator`]s, or [`Embed`] references to
//! named fragments. A [`LazyTree`] wraps a specification and resolves it on
//! demand: reading a position evaluates it at most once and memoizes the
//! result, so generators that read sibling or ancestor fields observe the
//! same values regardless of read order.
//!
//! # Architecture
//!
//! The tree is an arena. Every nested map or list is a node holding its own
//! slots plus the index of its root node; generators receive a [`Scope`]
//! cursor (node index + mutable arena borrow) rather than owning references
//! into the tree, so nested wrappers never own their root.
//!
//! # Modules
//!
//! - [`error`]: [`LazyError`] and the [`LazyResult`] alias
//! - [`spec`]: [`Attr`], [`AttributeSpec`], [`Generator`], [`Embed`]
//! - [`tree`]: [`LazyTree`], [`Scope`], and the [`FragmentSource`] seam

pub mod error;
pub mod spec;
pub mod tree;

pub use error::{BoxError, LazyError, LazyResult};
pub use spec::{Attr, AttributeSpec, Embed, Generator};
pub use tree::{FragmentSource, LazyTree, Scope};
