//! The arena-backed lazy document tree.
//!
//! [`LazyTree`] stores every nested map or list as a node in a flat arena.
//! A node owns its slots and records the index of its root; reads go through
//! [`Scope`], a cursor pairing a node index with a mutable borrow of the
//! arena. Each slot moves through `Pending -> Evaluating -> Ready | Node | Failed`
//! exactly once, which is what makes generators run at most once.
//!
//! # Invariants
//!
//! - Node 0 is the document root and is always a map.
//! - A slot is `Evaluating` only while its generator or embed is running;
//!   reading it in that state is a [`LazyError::SelfReference`].
//! - Embedded fragments are rooted at themselves; every other nested node
//!   shares its parent's root.
//! - A fragment is never expanded inside itself.
//! - A failed generator or embed is not retried; later reads of its slot
//!   return [`LazyError::Failed`].

use std::fmt;

use stencil_types::document::type_name;
use stencil_types::{Document, Value};
use tracing::{debug, trace};

use crate::error::{BoxError, LazyError, LazyResult};
use crate::spec::{Attr, AttributeSpec, Embed};

/// Expands [`Embed`] references into fragment specifications.
///
/// The tree calls this lazily, the first time an embedded position is read.
pub trait FragmentSource {
    fn expand(&self, embed: &Embed) -> Result<AttributeSpec, BoxError>;
}

type NodeId = usize;

const ROOT: NodeId = 0;

/// Outcome of forcing one slot.
enum Forced {
    Value(Value),
    Node(NodeId),
}

impl Forced {
    fn to_slot(&self) -> Slot {
        match self {
            Self::Value(value) => Slot::Ready(value.clone()),
            Self::Node(id) => Slot::Node(*id),
        }
    }
}

#[derive(Debug)]
enum Slot {
    Pending(Attr),
    Evaluating,
    Ready(Value),
    Node(NodeId),
    Failed(String),
}

enum Begin {
    Pending(Attr),
    Done(Forced),
    Busy,
    Failed(String),
}

impl Slot {
    /// Claim a pending slot for evaluation, leaving it `Evaluating`.
    /// Settled slots are left untouched.
    fn begin(&mut self) -> Begin {
        match std::mem::replace(self, Self::Evaluating) {
            Self::Pending(attr) => Begin::Pending(attr),
            Self::Evaluating => Begin::Busy,
            Self::Ready(value) => {
                let forced = Forced::Value(value.clone());
                *self = Self::Ready(value);
                Begin::Done(forced)
            }
            Self::Node(id) => {
                *self = Self::Node(id);
                Begin::Done(Forced::Node(id))
            }
            Self::Failed(reason) => {
                *self = Self::Failed(reason.clone());
                Begin::Failed(reason)
            }
        }
    }
}

#[derive(Debug)]
enum Body {
    Map(Vec<(String, Slot)>),
    List(Vec<Slot>),
}

impl Body {
    fn from_spec(spec: AttributeSpec) -> Self {
        Self::Map(
            spec.into_entries()
                .into_iter()
                .map(|(key, attr)| (key, Slot::Pending(attr)))
                .collect(),
        )
    }

    fn from_items(items: Vec<Attr>) -> Self {
        Self::List(items.into_iter().map(Slot::Pending).collect())
    }

    /// Wrap an already-static container so it can be walked by a [`Scope`].
    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self::Map(
                map.into_iter().map(|(k, v)| (k, Slot::Ready(v))).collect(),
            )),
            Value::Array(items) => Ok(Self::List(items.into_iter().map(Slot::Ready).collect())),
            other => Err(other),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Map(entries) => entries.len(),
            Self::List(items) => items.len(),
        }
    }

    fn slot_mut(&mut self, pos: usize) -> &mut Slot {
        match self {
            Self::Map(entries) => &mut entries[pos].1,
            Self::List(items) => &mut items[pos],
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Map(_) => "a map",
            Self::List(_) => "a list",
        }
    }
}

#[derive(Debug)]
struct Node {
    root: NodeId,
    parent: Option<NodeId>,
    /// Set on the top node of an embedded fragment.
    fragment: Option<String>,
    path: String,
    body: Body,
}

/// A lazily resolved document.
///
/// Build one from an [`AttributeSpec`], read individual positions through
/// [`get`](Self::get) or [`scope`](Self::scope), and finally call
/// [`resolve`](Self::resolve) to force everything into a static [`Document`].
///
/// The tree is single-threaded by construction: every read takes `&mut self`.
pub struct LazyTree<'s> {
    nodes: Vec<Node>,
    source: Option<&'s dyn FragmentSource>,
    generator_calls: usize,
}

impl LazyTree<'static> {
    /// Wrap a specification with no fragment source; reading an embed fails
    /// with [`LazyError::NoFragmentSource`].
    pub fn new(spec: AttributeSpec) -> Self {
        Self::build(spec, None)
    }
}

impl<'s> LazyTree<'s> {
    /// Wrap a specification, expanding embeds through `source`.
    pub fn with_source(spec: AttributeSpec, source: &'s dyn FragmentSource) -> Self {
        Self::build(spec, Some(source))
    }

    fn build(spec: AttributeSpec, source: Option<&'s dyn FragmentSource>) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            source,
            generator_calls: 0,
        };
        tree.nodes.push(Node {
            root: ROOT,
            parent: None,
            fragment: None,
            path: "$".to_string(),
            body: Body::from_spec(spec),
        });
        tree
    }

    /// A cursor on the document root.
    pub fn scope(&mut self) -> Scope<'_, 's> {
        Scope {
            tree: self,
            node: ROOT,
        }
    }

    /// Read (and memoize) the top-level field `key`.
    pub fn get(&mut self, key: &str) -> LazyResult<Value> {
        self.scope().get(key)
    }

    /// Number of generator invocations performed so far.
    pub fn generator_calls(&self) -> usize {
        self.generator_calls
    }

    /// Force every position, in insertion order for maps and index order for
    /// lists, and return the fully static document.
    pub fn resolve(mut self) -> LazyResult<Document> {
        let resolved = self.resolve_node(ROOT)?;
        debug!(
            nodes = self.nodes.len(),
            generator_calls = self.generator_calls,
            "resolved lazy tree"
        );
        match resolved {
            Value::Object(document) => Ok(document),
            other => Err(LazyError::ShapeMismatch {
                path: "$".to_string(),
                expected: "a map",
                actual: type_name(&other),
            }),
        }
    }

    // ---------------------------------------------------------------
    // Arena internals
    // ---------------------------------------------------------------

    /// Push a node under `parent`, sharing its root.
    fn alloc(&mut self, parent: NodeId, path: String, body: Body) -> NodeId {
        let id = self.nodes.len();
        let root = self.nodes[parent].root;
        self.nodes.push(Node {
            root,
            parent: Some(parent),
            fragment: None,
            path,
            body,
        });
        id
    }

    /// Push an embedded fragment under `parent`, rooted at itself.
    fn alloc_fragment(&mut self, parent: NodeId, fragment: &str, path: String, body: Body) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            root: id,
            parent: Some(parent),
            fragment: Some(fragment.to_string()),
            path,
            body,
        });
        id
    }

    /// Returns `true` if `node` sits inside an expansion of `fragment`.
    fn within_fragment(&self, node: NodeId, fragment: &str) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            let n = &self.nodes[id];
            if n.fragment.as_deref() == Some(fragment) {
                return true;
            }
            cursor = n.parent;
        }
        false
    }

    fn slot_path(&self, node: NodeId, pos: usize) -> String {
        let n = &self.nodes[node];
        match &n.body {
            Body::Map(entries) => format!("{}.{}", n.path, entries[pos].0),
            Body::List(_) => format!("{}[{}]", n.path, pos),
        }
    }

    fn position(&self, node: NodeId, key: &str) -> LazyResult<usize> {
        let n = &self.nodes[node];
        match &n.body {
            Body::Map(entries) => entries
                .iter()
                .position(|(k, _)| k == key)
                .ok_or_else(|| LazyError::MissingKey {
                    path: n.path.clone(),
                    key: key.to_string(),
                }),
            Body::List(_) => Err(LazyError::ShapeMismatch {
                path: n.path.clone(),
                expected: "a map",
                actual: n.body.shape(),
            }),
        }
    }

    fn index(&self, node: NodeId, index: usize) -> LazyResult<usize> {
        let n = &self.nodes[node];
        match &n.body {
            Body::List(items) if index < items.len() => Ok(index),
            Body::List(items) => Err(LazyError::IndexOutOfBounds {
                path: n.path.clone(),
                index,
                len: items.len(),
            }),
            Body::Map(_) => Err(LazyError::ShapeMismatch {
                path: n.path.clone(),
                expected: "a list",
                actual: n.body.shape(),
            }),
        }
    }

    /// Evaluate the slot at `pos` of `node` if it has not been evaluated
    /// yet, memoize, and return the outcome.
    fn force_at(&mut self, node: NodeId, pos: usize) -> LazyResult<Forced> {
        let attr = match self.nodes[node].body.slot_mut(pos).begin() {
            Begin::Pending(attr) => attr,
            Begin::Done(forced) => return Ok(forced),
            Begin::Busy => {
                return Err(LazyError::SelfReference {
                    path: self.slot_path(node, pos),
                })
            }
            Begin::Failed(reason) => {
                return Err(LazyError::Failed {
                    path: self.slot_path(node, pos),
                    reason,
                })
            }
        };

        let forced = match attr {
            Attr::Static(value) => Forced::Value(value),
            Attr::Map(spec) => {
                let path = self.slot_path(node, pos);
                Forced::Node(self.alloc(node, path, Body::from_spec(spec)))
            }
            Attr::List(items) => {
                let path = self.slot_path(node, pos);
                Forced::Node(self.alloc(node, path, Body::from_items(items)))
            }
            Attr::Generator(generator) => {
                trace!(path = %self.slot_path(node, pos), "invoking generator");
                self.generator_calls += 1;
                let result = generator.call(&mut Scope {
                    tree: &mut *self,
                    node,
                });
                match result {
                    Ok(value) => Forced::Value(value),
                    Err(err) => {
                        *self.nodes[node].body.slot_mut(pos) = Slot::Failed(err.to_string());
                        return Err(err);
                    }
                }
            }
            Attr::Embed(embed) => {
                let path = self.slot_path(node, pos);
                match self.expand(node, &embed, &path) {
                    Ok(spec) => {
                        debug!(fragment = %embed.fragment, %path, "embedded fragment");
                        let body = Body::from_spec(spec);
                        Forced::Node(self.alloc_fragment(node, &embed.fragment, path, body))
                    }
                    Err(err) => {
                        *self.nodes[node].body.slot_mut(pos) = Slot::Failed(err.to_string());
                        return Err(err);
                    }
                }
            }
        };

        *self.nodes[node].body.slot_mut(pos) = forced.to_slot();
        Ok(forced)
    }

    fn expand(&self, node: NodeId, embed: &Embed, path: &str) -> LazyResult<AttributeSpec> {
        if self.within_fragment(node, &embed.fragment) {
            return Err(LazyError::EmbedCycle {
                fragment: embed.fragment.clone(),
                path: path.to_string(),
            });
        }
        let source = self.source.ok_or_else(|| LazyError::NoFragmentSource {
            fragment: embed.fragment.clone(),
            path: path.to_string(),
        })?;
        source.expand(embed).map_err(|source| LazyError::Expand {
            fragment: embed.fragment.clone(),
            path: path.to_string(),
            source,
        })
    }

    /// Force the slot and return it as a walkable node. Static containers
    /// are wrapped on the way.
    fn force_node_at(&mut self, node: NodeId, pos: usize) -> LazyResult<NodeId> {
        match self.force_at(node, pos)? {
            Forced::Node(id) => Ok(id),
            Forced::Value(value) => {
                let path = self.slot_path(node, pos);
                match Body::from_value(value) {
                    Ok(body) => {
                        let id = self.alloc(node, path, body);
                        *self.nodes[node].body.slot_mut(pos) = Slot::Node(id);
                        Ok(id)
                    }
                    Err(scalar) => Err(LazyError::ShapeMismatch {
                        path,
                        expected: "a map or a list",
                        actual: type_name(&scalar),
                    }),
                }
            }
        }
    }

    fn value_at(&mut self, node: NodeId, pos: usize) -> LazyResult<Value> {
        match self.force_at(node, pos)? {
            Forced::Value(value) => Ok(value),
            Forced::Node(id) => self.resolve_node(id),
        }
    }

    fn resolve_node(&mut self, node: NodeId) -> LazyResult<Value> {
        let len = self.nodes[node].body.len();
        let mut values = Vec::with_capacity(len);
        for pos in 0..len {
            values.push(self.value_at(node, pos)?);
        }
        Ok(match &self.nodes[node].body {
            Body::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, _)| key.clone())
                    .zip(values)
                    .collect(),
            ),
            Body::List(_) => Value::Array(values),
        })
    }
}

impl fmt::Debug for LazyTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyTree")
            .field("nodes", &self.nodes.len())
            .field("generator_calls", &self.generator_calls)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// A cursor on one node of a [`LazyTree`], handed to generators.
///
/// Every read forces (and memoizes) the positions it touches. Reads return
/// fully static values; use [`child`](Self::child) or [`item`](Self::item)
/// to walk into a nested node without resolving all of it.
pub struct Scope<'t, 's> {
    tree: &'t mut LazyTree<'s>,
    node: NodeId,
}

impl<'t, 's> Scope<'t, 's> {
    /// Dotted path of this node (`$` is the document root).
    pub fn path(&self) -> &str {
        &self.tree.nodes[self.node].path
    }

    /// Returns `true` if this cursor sits on its own root.
    pub fn is_root(&self) -> bool {
        self.tree.nodes[self.node].root == self.node
    }

    /// Number of entries (map) or items (list) in this node.
    pub fn len(&self) -> usize {
        self.tree.nodes[self.node].body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if this node is a map containing `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.tree.position(self.node, key).is_ok()
    }

    /// Field names of this node, in insertion order. Empty for lists.
    pub fn keys(&self) -> Vec<String> {
        match &self.tree.nodes[self.node].body {
            Body::Map(entries) => entries.iter().map(|(k, _)| k.clone()).collect(),
            Body::List(_) => Vec::new(),
        }
    }

    /// Read the field `key` of this map node as a static value.
    pub fn get(&mut self, key: &str) -> LazyResult<Value> {
        let pos = self.tree.position(self.node, key)?;
        self.tree.value_at(self.node, pos)
    }

    /// Read the item at `index` of this list node as a static value.
    pub fn at(&mut self, index: usize) -> LazyResult<Value> {
        let pos = self.tree.index(self.node, index)?;
        self.tree.value_at(self.node, pos)
    }

    /// Read `key` as a string.
    pub fn get_str(&mut self, key: &str) -> LazyResult<String> {
        match self.get(key)? {
            Value::String(s) => Ok(s),
            other => Err(self.type_mismatch(key, "a string", &other)),
        }
    }

    /// Read `key` as a signed integer.
    pub fn get_i64(&mut self, key: &str) -> LazyResult<i64> {
        let value = self.get(key)?;
        value
            .as_i64()
            .ok_or_else(|| self.type_mismatch(key, "an integer", &value))
    }

    /// Descend into the nested map or list at `key`.
    pub fn child(&mut self, key: &str) -> LazyResult<Scope<'_, 's>> {
        let pos = self.tree.position(self.node, key)?;
        let node = self.tree.force_node_at(self.node, pos)?;
        Ok(Scope {
            tree: &mut *self.tree,
            node,
        })
    }

    /// Descend into the nested map or list at `index`.
    pub fn item(&mut self, index: usize) -> LazyResult<Scope<'_, 's>> {
        let pos = self.tree.index(self.node, index)?;
        let node = self.tree.force_node_at(self.node, pos)?;
        Ok(Scope {
            tree: &mut *self.tree,
            node,
        })
    }

    /// A cursor on this node's root.
    pub fn root(&mut self) -> Scope<'_, 's> {
        let root = self.tree.nodes[self.node].root;
        Scope {
            tree: &mut *self.tree,
            node: root,
        }
    }

    /// Force this whole node and return it as a static value.
    pub fn resolve(&mut self) -> LazyResult<Value> {
        self.tree.resolve_node(self.node)
    }

    fn type_mismatch(&self, key: &str, expected: &'static str, found: &Value) -> LazyError {
        LazyError::TypeMismatch {
            path: format!("{}.{}", self.path(), key),
            expected,
            actual: type_name(found),
        }
    }
}

impl fmt::Debug for Scope<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("path", &self.path()).finish()
    }
}
