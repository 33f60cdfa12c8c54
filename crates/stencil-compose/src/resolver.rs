//! Layered composition of documents, traits, and fragments.
//!
//! Every kind is composed the same way:
//!
//! 1. the parent (if any) is composed first and becomes the base;
//! 2. each listed trait, in order, is composed and shallow-merged on top;
//! 3. the definition's own attributes are shallow-merged last.
//!
//! Parent chains are followed with an explicit stack so a loop is reported
//! as [`ComposeError::Cycle`] instead of recursing forever.

use stencil_lazy::{AttributeSpec, BoxError, Embed, FragmentSource, LazyTree};
use tracing::debug;

use crate::error::{ComposeError, ComposeResult};
use crate::namespace::{Definition, Kind, Namespace};

/// Composes definitions from a blueprint-local namespace, falling back to a
/// global namespace for traits.
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'a> {
    local: &'a Namespace,
    global: Option<&'a Namespace>,
}

impl<'a> Resolver<'a> {
    /// A resolver over `local` only.
    pub fn new(local: &'a Namespace) -> Self {
        Self {
            local,
            global: None,
        }
    }

    /// A resolver that looks traits up in `local` first, then `global`.
    pub fn with_global(local: &'a Namespace, global: &'a Namespace) -> Self {
        Self {
            local,
            global: Some(global),
        }
    }

    /// Flattened specification of the document `name`.
    pub fn document_spec(&self, name: &str) -> ComposeResult<AttributeSpec> {
        self.compose(Kind::Document, name, &mut Vec::new())
    }

    /// Flattened specification of the trait `name` (parent chain applied).
    pub fn trait_spec(&self, name: &str) -> ComposeResult<AttributeSpec> {
        self.compose(Kind::Trait, name, &mut Vec::new())
    }

    /// Flattened specification of the fragment `name`.
    pub fn fragment_spec(&self, name: &str) -> ComposeResult<AttributeSpec> {
        self.compose(Kind::Fragment, name, &mut Vec::new())
    }

    /// Specification for an embed: the fragment, with the embed's inline
    /// traits laid over it in order.
    pub fn embed_spec(&self, embed: &Embed) -> ComposeResult<AttributeSpec> {
        let mut spec = self.fragment_spec(&embed.fragment)?;
        for name in &embed.traits {
            spec.merge(&self.trait_spec(name)?);
        }
        Ok(spec)
    }

    /// The document `name` wrapped in a lazy tree whose embeds expand
    /// through this resolver.
    pub fn resolve_document(&self, name: &str) -> ComposeResult<LazyTree<'_>> {
        let spec = self.document_spec(name)?;
        Ok(LazyTree::with_source(spec, self))
    }

    /// The fragment `name` wrapped in a lazy tree rooted at itself.
    pub fn resolve_fragment(&self, name: &str) -> ComposeResult<LazyTree<'_>> {
        let spec = self.fragment_spec(name)?;
        Ok(LazyTree::with_source(spec, self))
    }

    /// Trait lookups prefer the local namespace; documents and fragments
    /// are always local.
    fn lookup(&self, kind: Kind, name: &str) -> ComposeResult<&'a Definition> {
        let local = self.local.get(kind, name);
        let found = match (kind, local) {
            (_, Some(def)) => Some(def),
            (Kind::Trait, None) => self.global.and_then(|g| g.get(kind, name)),
            _ => None,
        };
        found.ok_or_else(|| ComposeError::not_found(kind, name))
    }

    fn compose(
        &self,
        kind: Kind,
        name: &str,
        stack: &mut Vec<String>,
    ) -> ComposeResult<AttributeSpec> {
        if stack.iter().any(|seen| seen == name) {
            let mut chain = stack.clone();
            chain.push(name.to_string());
            return Err(ComposeError::Cycle { kind, chain });
        }
        let definition = self.lookup(kind, name)?;

        stack.push(name.to_string());
        let mut spec = match &definition.parent {
            Some(parent) => self.compose(kind, parent, stack)?,
            None => AttributeSpec::new(),
        };
        stack.pop();

        for trait_name in &definition.traits {
            spec.merge(&self.trait_spec(trait_name)?);
        }
        spec.merge(&definition.attrs);

        debug!(%kind, definition = name, fields = spec.len(), "composed specification");
        Ok(spec)
    }
}

impl FragmentSource for Resolver<'_> {
    fn expand(&self, embed: &Embed) -> Result<AttributeSpec, BoxError> {
        self.embed_spec(embed).map_err(Into::into)
    }
}
