//! Composition for Stencil.
//!
//! Blueprints declare three kinds of named definitions, each an
//! [`AttributeSpec`](stencil_lazy::AttributeSpec) plus an optional parent:
//!
//! - **Documents**: what a blueprint builds; may list traits.
//! - **Traits**: reusable attribute sets; may live in a blueprint or in the
//!   process-wide (global) namespace.
//! - **Fragments**: sub-structures embedded at one attribute position; may
//!   list traits.
//!
//! The [`Resolver`] flattens a definition into one specification by
//! layering parent, then traits in declared order, then local attributes,
//! and wraps the result in a [`LazyTree`](stencil_lazy::LazyTree). It also
//! acts as the tree's [`FragmentSource`](stencil_lazy::FragmentSource), so
//! embeds expand lazily against the same namespaces.
//!
//! # Modules
//!
//! - [`error`]: [`ComposeError`] and [`ComposeResult`]
//! - [`namespace`]: [`Definition`], [`Kind`], [`Namespace`]
//! - [`resolver`]: [`Resolver`]

pub mod error;
pub mod namespace;
pub mod resolver;

pub use error::{ComposeError, ComposeResult};
pub use namespace::{Definition, Kind, Namespace};
pub use resolver::Resolver;
