//! Blueprints: declared documents plus the build/create/cleanup lifecycle.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use stencil_compose::{Definition, Kind, Namespace, Resolver};
use stencil_lazy::{AttributeSpec, LazyTree};
use stencil_store::{DocumentStore, StoreError};
use stencil_types::{Document, DocumentId, DEFAULT_DOCUMENT};
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{DeclarationError, FactoryError, FactoryResult};

/// Process-wide trait namespace shared by every blueprint of a registry.
///
/// Writers replace the inner `Arc` copy-on-write; builds take a snapshot and
/// never hold the lock while resolving.
pub(crate) type GlobalTraits = Arc<RwLock<Arc<Namespace>>>;

/// A named generator of documents.
///
/// A blueprint owns its document, trait, and fragment definitions (immutable
/// once built), an optional [`DocumentStore`], and the identifiers of every
/// document it has created since the last [`cleanup`](Self::cleanup).
pub struct Blueprint {
    name: String,
    namespace: Namespace,
    store: Option<Arc<dyn DocumentStore>>,
    config: RegistryConfig,
    globals: Option<GlobalTraits>,
    created: Mutex<Vec<DocumentId>>,
}

impl Blueprint {
    /// Start declaring a blueprint called `name`.
    pub fn builder(name: impl Into<String>) -> BlueprintBuilder {
        BlueprintBuilder {
            name: name.into(),
            store: None,
            namespace: Namespace::new(),
            config: RegistryConfig::default(),
            globals: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The document store, if this blueprint persists documents.
    pub fn store(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.store.as_ref()
    }

    /// Collection name of the document store, if any.
    pub fn collection(&self) -> Option<&str> {
        self.store.as_deref().map(|store| store.collection())
    }

    /// The blueprint's own definitions.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Sorted names of the declared documents (`default` included).
    pub fn document_names(&self) -> Vec<&str> {
        self.namespace.names(Kind::Document)
    }

    /// Identifiers created since the last cleanup, oldest first.
    pub fn tracked_ids(&self) -> Vec<DocumentId> {
        self.created.lock().expect("lock poisoned").clone()
    }

    /// Synthesize the document `document` (default if `None`) with
    /// `overrides` laid over every declared layer.
    pub fn build(&self, document: Option<&str>, overrides: &AttributeSpec) -> FactoryResult<Document> {
        let name = document.unwrap_or(DEFAULT_DOCUMENT);
        let globals = self.global_traits();
        let resolver = match globals.as_deref() {
            Some(global) => Resolver::with_global(&self.namespace, global),
            None => Resolver::new(&self.namespace),
        };

        let spec = resolver.document_spec(name)?.merged(overrides);
        let built = LazyTree::with_source(spec, &resolver).resolve()?;
        debug!(blueprint = %self.name, document = name, fields = built.len(), "built document");
        Ok(built)
    }

    /// Build, insert through the store, track the new id, and return the
    /// document as the store reads it back.
    pub fn create(&self, document: Option<&str>, overrides: &AttributeSpec) -> FactoryResult<Document> {
        let store = self.require_store("create")?;
        let built = self.build(document, overrides)?;
        let id = store.insert(&built)?;
        self.created.lock().expect("lock poisoned").push(id);

        let record = store.find_one(&id)?.ok_or(StoreError::NotFound(id))?;
        let name = document.unwrap_or(DEFAULT_DOCUMENT);
        if self.config.debug {
            let overrides: Vec<&str> = overrides.keys().collect();
            info!(blueprint = %self.name, document = name, %id, ?overrides, ?record, "created document");
        } else {
            debug!(blueprint = %self.name, document = name, %id, "created document");
        }
        Ok(record)
    }

    /// `count` independent builds; sequences advance once per document.
    pub fn build_many(
        &self,
        count: usize,
        document: Option<&str>,
        overrides: &AttributeSpec,
    ) -> FactoryResult<Vec<Document>> {
        (0..count).map(|_| self.build(document, overrides)).collect()
    }

    /// `count` independent creates. Documents created before a failure stay
    /// tracked.
    pub fn create_many(
        &self,
        count: usize,
        document: Option<&str>,
        overrides: &AttributeSpec,
    ) -> FactoryResult<Vec<Document>> {
        (0..count).map(|_| self.create(document, overrides)).collect()
    }

    /// Remove every tracked document, newest first, and return how many the
    /// store actually removed.
    ///
    /// On a store failure the failing id stays tracked (with everything older
    /// than it) and the error is returned.
    pub fn cleanup(&self) -> FactoryResult<usize> {
        let store = self.require_store("cleanup")?;
        let mut created = self.created.lock().expect("lock poisoned");
        let mut removed = 0;
        while let Some(id) = created.pop() {
            match store.remove(&id) {
                Ok(true) => removed += 1,
                Ok(false) if self.config.strict_cleanup => {
                    created.push(id);
                    return Err(StoreError::NotFound(id).into());
                }
                Ok(false) => {
                    warn!(blueprint = %self.name, %id, "tracked document was already gone");
                }
                Err(err) => {
                    created.push(id);
                    return Err(err.into());
                }
            }
        }
        debug!(blueprint = %self.name, removed, "cleaned up documents");
        Ok(removed)
    }

    fn require_store(&self, operation: &'static str) -> FactoryResult<&Arc<dyn DocumentStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| FactoryError::configuration(&self.name, operation))
    }

    fn global_traits(&self) -> Option<Arc<Namespace>> {
        self.globals
            .as_ref()
            .map(|globals| Arc::clone(&globals.read().expect("lock poisoned")))
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("name", &self.name)
            .field("collection", &self.collection())
            .field("definitions", &self.namespace.len())
            .field("tracked", &self.created.lock().expect("lock poisoned").len())
            .finish()
    }
}

/// Collects definitions for a [`Blueprint`].
///
/// Each declaration returns a handle for the optional parent and trait list.
pub struct BlueprintBuilder {
    name: String,
    store: Option<Arc<dyn DocumentStore>>,
    namespace: Namespace,
    config: RegistryConfig,
    globals: Option<GlobalTraits>,
}

impl BlueprintBuilder {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Persist created documents through `store`.
    pub fn store(&mut self, store: Arc<dyn DocumentStore>) -> &mut Self {
        self.store = Some(store);
        self
    }

    pub fn config(&mut self, config: RegistryConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub(crate) fn globals(&mut self, globals: GlobalTraits) -> &mut Self {
        self.globals = Some(globals);
        self
    }

    /// Declare the unnamed document, built when no name is given.
    pub fn default_document(&mut self, attrs: AttributeSpec) -> DefinitionHandle<'_> {
        DefinitionHandle(self.declare(Kind::Document, DEFAULT_DOCUMENT.to_string(), attrs))
    }

    /// Declare a named document. `default` is reserved for
    /// [`default_document`](Self::default_document).
    pub fn document(
        &mut self,
        name: impl Into<String>,
        attrs: AttributeSpec,
    ) -> Result<DefinitionHandle<'_>, DeclarationError> {
        let name = name.into();
        if name == DEFAULT_DOCUMENT {
            return Err(DeclarationError::ReservedName {
                blueprint: self.name.clone(),
            });
        }
        Ok(DefinitionHandle(self.declare(Kind::Document, name, attrs)))
    }

    /// Declare a trait local to this blueprint.
    pub fn trait_(&mut self, name: impl Into<String>, attrs: AttributeSpec) -> TraitHandle<'_> {
        TraitHandle(self.declare(Kind::Trait, name.into(), attrs))
    }

    /// Declare a fragment for embedding.
    pub fn fragment(&mut self, name: impl Into<String>, attrs: AttributeSpec) -> DefinitionHandle<'_> {
        DefinitionHandle(self.declare(Kind::Fragment, name.into(), attrs))
    }

    pub fn finish(self) -> Blueprint {
        debug!(
            blueprint = %self.name,
            definitions = self.namespace.len(),
            persistent = self.store.is_some(),
            "declared blueprint"
        );
        Blueprint {
            name: self.name,
            namespace: self.namespace,
            store: self.store,
            config: self.config,
            globals: self.globals,
            created: Mutex::new(Vec::new()),
        }
    }

    fn declare(&mut self, kind: Kind, name: String, attrs: AttributeSpec) -> Handle<'_> {
        debug!(blueprint = %self.name, %kind, definition = %name, "declared definition");
        if self.namespace.insert(kind, name.clone(), Definition::new(attrs)).is_some() {
            debug!(blueprint = %self.name, %kind, definition = %name, "replaced previous definition");
        }
        Handle {
            namespace: &mut self.namespace,
            kind,
            name,
        }
    }
}

impl fmt::Debug for BlueprintBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueprintBuilder")
            .field("name", &self.name)
            .field("definitions", &self.namespace.len())
            .finish()
    }
}

struct Handle<'b> {
    namespace: &'b mut Namespace,
    kind: Kind,
    name: String,
}

impl Handle<'_> {
    fn update(&mut self, f: impl FnOnce(&mut Definition)) {
        if let Some(definition) = self.namespace.get_mut(self.kind, &self.name) {
            f(definition);
        }
    }
}

/// Handle on a freshly declared document or fragment.
pub struct DefinitionHandle<'b>(Handle<'b>);

impl DefinitionHandle<'_> {
    /// Inherit from another definition of the same kind.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        self.0.update(|def| def.parent = Some(parent));
        self
    }

    /// Apply traits, in order, between the parent and the local attributes.
    pub fn traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let traits: Vec<String> = traits.into_iter().map(Into::into).collect();
        self.0.update(|def| def.traits = traits);
        self
    }
}

/// Handle on a freshly declared trait.
pub struct TraitHandle<'b>(Handle<'b>);

impl TraitHandle<'_> {
    /// Inherit from another trait.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        self.0.update(|def| def.parent = Some(parent));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{dependent, sequence};
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use stencil_lazy::{Attr, Embed, LazyError};
    use stencil_store::InMemoryDocumentStore;
    use stencil_types::ID_FIELD;

    fn spec(value: Value) -> AttributeSpec {
        AttributeSpec::from_json(value).unwrap()
    }

    fn no_overrides() -> AttributeSpec {
        AttributeSpec::new()
    }

    /// Wraps an in-memory store, recording removals and optionally refusing
    /// inserts.
    #[derive(Default)]
    struct RecordingStore {
        inner: InMemoryDocumentStore,
        removed: Mutex<Vec<DocumentId>>,
        refuse_inserts: AtomicBool,
        refuse_removes: AtomicBool,
    }

    impl DocumentStore for RecordingStore {
        fn collection(&self) -> &str {
            self.inner.collection()
        }

        fn insert(&self, document: &Document) -> stencil_store::StoreResult<DocumentId> {
            if self.refuse_inserts.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("insert refused".into()));
            }
            self.inner.insert(document)
        }

        fn find_one(&self, id: &DocumentId) -> stencil_store::StoreResult<Option<Document>> {
            self.inner.find_one(id)
        }

        fn remove(&self, id: &DocumentId) -> stencil_store::StoreResult<bool> {
            if self.refuse_removes.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("remove refused".into()));
            }
            self.removed.lock().unwrap().push(*id);
            self.inner.remove(id)
        }
    }

    fn user_blueprint(store: Option<Arc<dyn DocumentStore>>) -> Blueprint {
        let mut bp = Blueprint::builder("user");
        if let Some(store) = store {
            bp.store(store);
        }
        bp.default_document(
            AttributeSpec::new()
                .with("first", "John")
                .with("last", "Smith")
                .with(
                    "email",
                    dependent(|doc| {
                        let first = doc.get_str("first")?;
                        let last = doc.get_str("last")?;
                        Ok(format!("{first}.{last}@test.com"))
                    }),
                )
                .with("age", sequence(|n| n + 20)),
        );
        bp.finish()
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    #[test]
    fn build_user_then_override() {
        let bp = user_blueprint(None);
        let first = bp.build(None, &no_overrides()).unwrap();
        assert_eq!(
            Value::Object(first),
            json!({"first": "John", "last": "Smith", "email": "John.Smith@test.com", "age": 21})
        );

        let second = bp.build(None, &spec(json!({"first": "Mike"}))).unwrap();
        assert_eq!(
            Value::Object(second),
            json!({"first": "Mike", "last": "Smith", "email": "Mike.Smith@test.com", "age": 22})
        );
    }

    #[test]
    fn build_many_advances_sequences_only() {
        let bp = user_blueprint(None);
        let docs = bp.build_many(3, None, &no_overrides()).unwrap();
        let ages: Vec<&Value> = docs.iter().map(|d| &d["age"]).collect();
        assert_eq!(ages, vec![&json!(21), &json!(22), &json!(23)]);
        for doc in &docs {
            assert_eq!(doc["first"], json!("John"));
            assert_eq!(doc["email"], json!("John.Smith@test.com"));
        }
    }

    #[test]
    fn static_build_is_idempotent() {
        let mut bp = Blueprint::builder("car");
        bp.default_document(spec(json!({"make": "Saab", "doors": 3, "tags": ["old"]})));
        let bp = bp.finish();
        let a = bp.build(None, &no_overrides()).unwrap();
        let b = bp.build(None, &no_overrides()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_document_is_not_found() {
        let bp = user_blueprint(None);
        let err = bp.build(Some("ghost"), &no_overrides()).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "document declaration not found: \"ghost\"");
    }

    #[test]
    fn generator_runs_once_per_build() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut bp = Blueprint::builder("probe");
        bp.default_document(
            AttributeSpec::new()
                .with(
                    "probe",
                    Attr::generator(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(json!("x"))
                    }),
                )
                .with("a", Attr::generator(|s| s.get("probe")))
                .with("b", Attr::generator(|s| s.get("probe"))),
        );
        let bp = bp.finish();
        bp.build_many(4, None, &no_overrides()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    #[test]
    fn default_name_is_reserved_for_documents() {
        let mut bp = Blueprint::builder("user");
        let err = bp.document("default", AttributeSpec::new()).err();
        assert_eq!(err, Some(DeclarationError::ReservedName { blueprint: "user".into() }));
    }

    #[test]
    fn named_document_layers_parent_traits_local() {
        let mut bp = Blueprint::builder("user");
        bp.default_document(spec(json!({"first": "John", "last": "Smith", "k": "base"})));
        bp.trait_("t1", spec(json!({"k": "t1", "from_t1": true})));
        bp.trait_("t2", spec(json!({"k": "t2"}))).parent("t1");
        bp.document("admin", spec(json!({"first": "Bill", "k": "local"})))
            .unwrap()
            .parent("default")
            .traits(["t1", "t2"]);
        bp.document("nameless", AttributeSpec::new())
            .unwrap()
            .parent("default")
            .traits(["t2"]);
        let bp = bp.finish();

        let admin = bp.build(Some("admin"), &no_overrides()).unwrap();
        assert_eq!(
            Value::Object(admin),
            json!({"first": "Bill", "last": "Smith", "k": "local", "from_t1": true})
        );
        let nameless = bp.build(Some("nameless"), &no_overrides()).unwrap();
        assert_eq!(nameless["k"], json!("t2"));
        assert_eq!(bp.document_names(), vec!["admin", "default", "nameless"]);
    }

    #[test]
    fn fragments_embed_with_inline_traits() {
        let mut bp = Blueprint::builder("user");
        bp.trait_("versioned", spec(json!({"v": 4})));
        bp.trait_("quiet", spec(json!({"receives_sms": false})));
        bp.fragment("prefs", spec(json!({"receives_sms": true, "receives_email": false})))
            .traits(["versioned"]);
        bp.default_document(
            AttributeSpec::new()
                .with("name", "x")
                .with("prefs", Attr::embed("prefs"))
                .with("alerts", Embed::new("prefs").with_traits(["quiet"])),
        );
        let bp = bp.finish();

        let doc = bp.build(None, &no_overrides()).unwrap();
        assert_eq!(doc["prefs"], json!({"receives_sms": true, "receives_email": false, "v": 4}));
        assert_eq!(doc["alerts"], json!({"receives_sms": false, "receives_email": false, "v": 4}));
    }

    #[test]
    fn missing_fragment_surfaces_as_not_found() {
        let mut bp = Blueprint::builder("user");
        bp.default_document(AttributeSpec::new().with("prefs", Attr::embed("nope")));
        let err = bp.finish().build(None, &no_overrides()).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, FactoryError::Compose(_)));
    }

    #[test]
    fn self_reading_generator_is_an_error() {
        let mut bp = Blueprint::builder("loop");
        bp.default_document(AttributeSpec::new().with("me", Attr::generator(|s| s.get("me"))));
        let err = bp.finish().build(None, &no_overrides()).unwrap_err();
        assert!(matches!(err, FactoryError::Lazy(LazyError::SelfReference { .. })));
    }

    // -----------------------------------------------------------------------
    // Create and cleanup
    // -----------------------------------------------------------------------

    #[test]
    fn create_round_trips_through_store() {
        let store = Arc::new(RecordingStore::default());
        let bp = user_blueprint(Some(store.clone()));
        let created = bp.create(None, &spec(json!({"first": "Mike"}))).unwrap();

        assert_eq!(created["first"], json!("Mike"));
        assert_eq!(created["age"], json!(21));
        let ids = bp.tracked_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(created[ID_FIELD], ids[0].to_value());
        assert_eq!(created.keys().next().map(String::as_str), Some(ID_FIELD));
    }

    #[test]
    fn create_without_store_is_configuration_error() {
        let bp = user_blueprint(None);
        let err = bp.create(None, &no_overrides()).unwrap_err();
        assert!(matches!(err, FactoryError::Configuration { operation: "create", .. }));
        assert!(matches!(bp.cleanup().unwrap_err(), FactoryError::Configuration { .. }));
        assert!(bp.build(None, &no_overrides()).is_ok());
    }

    #[test]
    fn cleanup_removes_newest_first() {
        let store = Arc::new(RecordingStore::default());
        let bp = user_blueprint(Some(store.clone()));
        bp.create_many(3, None, &no_overrides()).unwrap();
        let mut expected = bp.tracked_ids();
        expected.reverse();

        assert_eq!(bp.cleanup().unwrap(), 3);
        assert_eq!(*store.removed.lock().unwrap(), expected);
        assert!(bp.tracked_ids().is_empty());
        assert!(store.inner.is_empty());

        assert_eq!(bp.cleanup().unwrap(), 0);
        assert_eq!(store.removed.lock().unwrap().len(), 3);
    }

    #[test]
    fn failed_insert_is_not_tracked() {
        let store = Arc::new(RecordingStore::default());
        store.refuse_inserts.store(true, Ordering::SeqCst);
        let bp = user_blueprint(Some(store.clone()));
        let err = bp.create(None, &no_overrides()).unwrap_err();
        assert!(matches!(err, FactoryError::Store(StoreError::Backend(_))));
        assert!(bp.tracked_ids().is_empty());
        assert_eq!(bp.cleanup().unwrap(), 0);
        assert!(store.removed.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_remove_keeps_id_tracked() {
        let store = Arc::new(RecordingStore::default());
        let bp = user_blueprint(Some(store.clone()));
        bp.create_many(2, None, &no_overrides()).unwrap();
        store.refuse_removes.store(true, Ordering::SeqCst);
        assert!(bp.cleanup().is_err());
        assert_eq!(bp.tracked_ids().len(), 2);

        store.refuse_removes.store(false, Ordering::SeqCst);
        assert_eq!(bp.cleanup().unwrap(), 2);
    }

    #[test]
    fn vanished_documents_are_skipped_unless_strict() {
        let store = Arc::new(InMemoryDocumentStore::new("users"));
        let lenient = user_blueprint(Some(store.clone()));
        lenient.create(None, &no_overrides()).unwrap();
        store.clear();
        assert_eq!(lenient.cleanup().unwrap(), 0);
        assert!(lenient.tracked_ids().is_empty());

        let mut bp = Blueprint::builder("strict");
        bp.store(store.clone()).config(RegistryConfig {
            strict_cleanup: true,
            ..Default::default()
        });
        bp.default_document(spec(json!({"n": 1})));
        let strict = bp.finish();
        let created = strict.create(None, &no_overrides()).unwrap();
        store.clear();
        let err = strict.cleanup().unwrap_err();
        assert!(matches!(err, FactoryError::Store(StoreError::NotFound(_))));
        assert_eq!(strict.tracked_ids()[0].to_value(), created[ID_FIELD]);
    }

    // -----------------------------------------------------------------------
    // Override precedence
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn overrides_always_win(
            picks in proptest::collection::vec((0usize..4, any::<i64>()), 0..6),
            as_generator in any::<bool>(),
        ) {
            let keys = ["a", "b", "c", "d"];
            let mut bp = Blueprint::builder("layers");
            bp.trait_("t", spec(json!({"a": "trait", "b": "trait"})));
            bp.document("base", spec(json!({"a": "base", "c": "base"}))).unwrap();
            bp.document("child", spec(json!({"a": "local", "d": "local"})))
                .unwrap()
                .parent("base")
                .traits(["t"]);
            let bp = bp.finish();

            let mut overrides = AttributeSpec::new();
            for (index, value) in &picks {
                let value = *value;
                if as_generator {
                    overrides.insert(keys[*index], Attr::generator(move |_| Ok(json!(value))));
                } else {
                    overrides.insert(keys[*index], value);
                }
            }

            let doc = bp.build(Some("child"), &overrides).unwrap();
            let mut expected = json!({"a": "local", "c": "base", "b": "trait", "d": "local"});
            for (index, value) in &picks {
                expected[keys[*index]] = json!(value);
            }
            prop_assert_eq!(Value::Object(doc), expected);
        }
    }
}
