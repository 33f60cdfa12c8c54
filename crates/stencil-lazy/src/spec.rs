//! Attribute specifications: the still-lazy description of a document.
//!
//! A specification is an insertion-ordered mapping from field name to
//! [`Attr`]. Every value shape is an explicit variant, so resolution is a
//! `match` rather than runtime type inspection.

use std::fmt;
use std::sync::Arc;

use stencil_types::document::type_name;
use stencil_types::{TypeError, Value};

use crate::error::LazyResult;
use crate::tree::Scope;

type GeneratorFn = dyn Fn(&mut Scope<'_, '_>) -> LazyResult<Value> + Send + Sync;

/// A function computing a field's value from the node it lives in and that
/// node's root.
///
/// Generators are reference-counted: cloning a specification shares the
/// underlying function, so stateful generators (sequences) advance once per
/// built document no matter how many specifications carry them.
#[derive(Clone)]
pub struct Generator(Arc<GeneratorFn>);

impl Generator {
    /// Wrap a closure as a generator.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_, '_>) -> LazyResult<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the generator at `scope`.
    pub fn call(&self, scope: &mut Scope<'_, '_>) -> LazyResult<Value> {
        (self.0)(scope)
    }

    /// Returns `true` if both handles share the same function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generator(..)")
    }
}

/// Reference to a named fragment, expanded lazily when its position is read.
///
/// `traits` supplement the fragment's own declared traits and are laid over
/// the fragment's resolved attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Embed {
    pub fragment: String,
    pub traits: Vec<String>,
}

impl Embed {
    /// Embed `fragment` with no inline traits.
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            traits: Vec::new(),
        }
    }

    /// Add inline traits, applied in order after the fragment's own.
    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits.extend(traits.into_iter().map(Into::into));
        self
    }
}

/// The value held at one position of a specification.
#[derive(Clone, Debug)]
pub enum Attr {
    /// A fixed value, returned as-is.
    Static(Value),
    /// A nested specification, wrapped on first read.
    Map(AttributeSpec),
    /// A nested list, wrapped on first read.
    List(Vec<Attr>),
    /// A function evaluated at most once per tree.
    Generator(Generator),
    /// A fragment embedded at this position.
    Embed(Embed),
}

impl Attr {
    /// Shorthand for [`Attr::Generator`] from a closure.
    pub fn generator<F>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_, '_>) -> LazyResult<Value> + Send + Sync + 'static,
    {
        Self::Generator(Generator::new(f))
    }

    /// Shorthand for [`Attr::Embed`] without inline traits.
    pub fn embed(fragment: impl Into<String>) -> Self {
        Self::Embed(Embed::new(fragment))
    }

}

impl From<Value> for Attr {
    fn from(value: Value) -> Self {
        Self::Static(value)
    }
}

macro_rules! static_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Attr {
                fn from(value: $ty) -> Self {
                    Self::Static(Value::from(value))
                }
            }
        )*
    };
}

static_from!(&str, String, bool, i32, i64, u32, u64, f64);

impl From<Generator> for Attr {
    fn from(generator: Generator) -> Self {
        Self::Generator(generator)
    }
}

impl From<Embed> for Attr {
    fn from(embed: Embed) -> Self {
        Self::Embed(embed)
    }
}

impl From<AttributeSpec> for Attr {
    fn from(spec: AttributeSpec) -> Self {
        Self::Map(spec)
    }
}

impl From<Vec<Attr>> for Attr {
    fn from(items: Vec<Attr>) -> Self {
        Self::List(items)
    }
}

/// An insertion-ordered mapping of field name to [`Attr`].
///
/// Overlaying (`merge`) is shallow: a key present in the overlay replaces the
/// base entry in place, keeping the base's position; new keys are appended.
#[derive(Clone, Debug, Default)]
pub struct AttributeSpec {
    entries: Vec<(String, Attr)>,
}

impl AttributeSpec {
    /// Create an empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, attr: impl Into<Attr>) -> Self {
        self.insert(key, attr);
        self
    }

    /// Insert or replace `key`, returning the previous attribute.
    pub fn insert(&mut self, key: impl Into<String>, attr: impl Into<Attr>) -> Option<Attr> {
        let key = key.into();
        let attr = attr.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, attr)),
            None => {
                self.entries.push((key, attr));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Attr> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, a)| a)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Attr> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attr)> {
        self.entries.iter().map(|(k, a)| (k.as_str(), a))
    }

    /// Shallow-overlay `other` onto this specification; `other` wins on
    /// collisions.
    pub fn merge(&mut self, other: &AttributeSpec) {
        for (key, attr) in &other.entries {
            self.insert(key.clone(), attr.clone());
        }
    }

    /// Owned variant of [`merge`](Self::merge).
    pub fn merged(mut self, other: &AttributeSpec) -> Self {
        self.merge(other);
        self
    }

    /// Build a specification of static values from a JSON object.
    pub fn from_json(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, Attr::Static(v))).collect()),
            other => Err(TypeError::NotAnObject(type_name(&other))),
        }
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Attr)> {
        self.entries
    }
}

impl<K: Into<String>> FromIterator<(K, Attr)> for AttributeSpec {
    fn from_iter<T: IntoIterator<Item = (K, Attr)>>(iter: T) -> Self {
        let mut spec = Self::new();
        for (key, attr) in iter {
            spec.insert(key, attr);
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(spec: &AttributeSpec) -> Vec<&str> {
        spec.keys().collect()
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut spec = AttributeSpec::new().with("a", 1).with("b", 2).with("c", 3);
        let previous = spec.insert("b", "two");
        assert!(matches!(previous, Some(Attr::Static(v)) if v == json!(2)));
        assert_eq!(keys(&spec), vec!["a", "b", "c"]);
        assert!(matches!(spec.get("b"), Some(Attr::Static(v)) if *v == json!("two")));
    }

    #[test]
    fn merge_overlays_and_appends() {
        let mut base = AttributeSpec::new().with("k", "base").with("only_base", true);
        let overlay = AttributeSpec::new().with("extra", 1).with("k", "overlay");
        base.merge(&overlay);
        assert_eq!(keys(&base), vec!["k", "only_base", "extra"]);
        assert!(matches!(base.get("k"), Some(Attr::Static(v)) if *v == json!("overlay")));
    }

    #[test]
    fn merge_shares_generators() {
        let generator = Generator::new(|_| Ok(json!(1)));
        let overlay = AttributeSpec::new().with("g", generator.clone());
        let merged = AttributeSpec::new().merged(&overlay);
        match merged.get("g") {
            Some(Attr::Generator(g)) => assert!(g.ptr_eq(&generator)),
            other => panic!("expected generator, got {other:?}"),
        }
    }

    #[test]
    fn remove_drops_entry() {
        let mut spec = AttributeSpec::new().with("a", 1).with("b", 2);
        assert!(spec.remove("a").is_some());
        assert!(spec.remove("a").is_none());
        assert_eq!(keys(&spec), vec!["b"]);
    }

    #[test]
    fn from_json_builds_static_entries() {
        let spec = AttributeSpec::from_json(json!({"name": "x", "tags": [1, 2]})).unwrap();
        assert_eq!(keys(&spec), vec!["name", "tags"]);
        assert!(matches!(spec.get("tags"), Some(Attr::Static(v)) if *v == json!([1, 2])));
    }

    #[test]
    fn from_json_rejects_scalars() {
        let err = AttributeSpec::from_json(json!(5)).unwrap_err();
        assert_eq!(err, TypeError::NotAnObject("number"));
    }

    #[test]
    fn embed_collects_inline_traits() {
        let embed = Embed::new("prefs").with_traits(["sms", "versioned"]);
        assert_eq!(embed.fragment, "prefs");
        assert_eq!(embed.traits, vec!["sms".to_string(), "versioned".to_string()]);
    }
}
