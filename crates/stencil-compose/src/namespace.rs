//! Named definitions and the namespaces holding them.

use std::collections::HashMap;
use std::fmt;

use stencil_lazy::AttributeSpec;

/// The three kinds of named definitions a blueprint can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Document,
    Trait,
    Fragment,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Document => "document",
            Self::Trait => "trait",
            Self::Fragment => "fragment",
        };
        f.write_str(name)
    }
}

/// A declared document, trait, or fragment.
///
/// Traits never carry a trait list of their own; the field stays empty for
/// them.
#[derive(Clone, Debug, Default)]
pub struct Definition {
    pub attrs: AttributeSpec,
    pub parent: Option<String>,
    pub traits: Vec<String>,
}

impl Definition {
    pub fn new(attrs: AttributeSpec) -> Self {
        Self {
            attrs,
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits = traits.into_iter().map(Into::into).collect();
        self
    }
}

/// Definitions of every kind, keyed by name.
///
/// Each blueprint owns one namespace; the process-wide trait namespace is a
/// `Namespace` whose documents and fragments stay empty.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    documents: HashMap<String, Definition>,
    traits: HashMap<String, Definition>,
    fragments: HashMap<String, Definition>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: Kind) -> &HashMap<String, Definition> {
        match kind {
            Kind::Document => &self.documents,
            Kind::Trait => &self.traits,
            Kind::Fragment => &self.fragments,
        }
    }

    fn table_mut(&mut self, kind: Kind) -> &mut HashMap<String, Definition> {
        match kind {
            Kind::Document => &mut self.documents,
            Kind::Trait => &mut self.traits,
            Kind::Fragment => &mut self.fragments,
        }
    }

    /// Register `definition` under `name`, replacing (and returning) any
    /// previous definition of the same kind.
    pub fn insert(
        &mut self,
        kind: Kind,
        name: impl Into<String>,
        definition: Definition,
    ) -> Option<Definition> {
        self.table_mut(kind).insert(name.into(), definition)
    }

    pub fn get(&self, kind: Kind, name: &str) -> Option<&Definition> {
        self.table(kind).get(name)
    }

    pub fn get_mut(&mut self, kind: Kind, name: &str) -> Option<&mut Definition> {
        self.table_mut(kind).get_mut(name)
    }

    pub fn contains(&self, kind: Kind, name: &str) -> bool {
        self.table(kind).contains_key(name)
    }

    /// Sorted names of every definition of `kind`.
    pub fn names(&self, kind: Kind) -> Vec<&str> {
        let mut names: Vec<&str> = self.table(kind).keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Total number of definitions across all kinds.
    pub fn len(&self) -> usize {
        self.documents.len() + self.traits.len() + self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_separate_tables() {
        let mut ns = Namespace::new();
        ns.insert(Kind::Trait, "shared", Definition::default());
        assert!(ns.contains(Kind::Trait, "shared"));
        assert!(!ns.contains(Kind::Document, "shared"));
        assert!(!ns.contains(Kind::Fragment, "shared"));
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn insert_replaces_previous_definition() {
        let mut ns = Namespace::new();
        assert!(ns.insert(Kind::Document, "a", Definition::default()).is_none());
        let previous = ns.insert(Kind::Document, "a", Definition::default().with_parent("b"));
        assert!(previous.is_some_and(|d| d.parent.is_none()));
        assert_eq!(ns.get(Kind::Document, "a").and_then(|d| d.parent.as_deref()), Some("b"));
    }

    #[test]
    fn names_are_sorted() {
        let mut ns = Namespace::new();
        for name in ["zed", "alpha", "mid"] {
            ns.insert(Kind::Fragment, name, Definition::default());
        }
        assert_eq!(ns.names(Kind::Fragment), vec!["alpha", "mid", "zed"]);
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut ns = Namespace::new();
        ns.insert(Kind::Document, "car", Definition::default());
        if let Some(def) = ns.get_mut(Kind::Document, "car") {
            def.traits.push("versioned".into());
        }
        assert_eq!(ns.get(Kind::Document, "car").map(|d| d.traits.len()), Some(1));
    }

    #[test]
    fn kind_display_is_lowercase() {
        assert_eq!(Kind::Document.to_string(), "document");
        assert_eq!(Kind::Fragment.to_string(), "fragment");
    }
}
