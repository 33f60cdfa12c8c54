//! The blueprint registry: name lookup, global traits, and process-wide
//! cleanup/reset.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};

use stencil_compose::{Definition, Kind, Namespace};
use stencil_lazy::AttributeSpec;
use stencil_store::DocumentStore;
use stencil_types::Document;
use tracing::{debug, info};

use crate::blueprint::{Blueprint, BlueprintBuilder, GlobalTraits};
use crate::config::RegistryConfig;
use crate::error::{DeclarationError, FactoryError, FactoryResult};

/// Owns every declared [`Blueprint`] and the global trait namespace.
///
/// A registry replaces ambient global state: construct one per test suite
/// (or per process) and pass it where blueprints are declared and used.
pub struct Registry {
    config: RegistryConfig,
    blueprints: RwLock<HashMap<String, Arc<Blueprint>>>,
    globals: GlobalTraits,
    /// Declarations in progress, one per declaring thread.
    declaring: Mutex<HashMap<ThreadId, String>>,
}

/// Clears this thread's open-declaration marker however `declare` exits.
struct DeclarationGuard<'a> {
    open: &'a Mutex<HashMap<ThreadId, String>>,
    thread: ThreadId,
}

impl Drop for DeclarationGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut open) = self.open.lock() {
            open.remove(&self.thread);
        }
    }
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            blueprints: RwLock::new(HashMap::new()),
            globals: Arc::new(RwLock::new(Arc::new(Namespace::new()))),
            declaring: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Declare (or redeclare) the blueprint `name`.
    ///
    /// `declare_fn` receives the builder; the blueprint is registered only if
    /// it returns `Ok`. Declaring another blueprint from inside `declare_fn`
    /// is a [`FactoryError::Context`] error. Declarations on different
    /// threads are independent.
    pub fn declare<F>(
        &self,
        name: impl Into<String>,
        store: Option<Arc<dyn DocumentStore>>,
        declare_fn: F,
    ) -> FactoryResult<Arc<Blueprint>>
    where
        F: FnOnce(&mut BlueprintBuilder) -> FactoryResult<()>,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(DeclarationError::EmptyName { what: "blueprint" }.into());
        }

        let thread = thread::current().id();
        let _guard = {
            let mut open = self.declaring.lock().expect("lock poisoned");
            if let Some(open) = open.get(&thread) {
                return Err(FactoryError::Context {
                    open: open.clone(),
                    requested: name,
                });
            }
            open.insert(thread, name.clone());
            DeclarationGuard {
                open: &self.declaring,
                thread,
            }
        };

        let mut builder = Blueprint::builder(name.clone());
        builder.config(self.config.clone()).globals(Arc::clone(&self.globals));
        if let Some(store) = store {
            builder.store(store);
        }
        declare_fn(&mut builder)?;

        let blueprint = Arc::new(builder.finish());
        let previous = self
            .blueprints
            .write()
            .expect("lock poisoned")
            .insert(name.clone(), Arc::clone(&blueprint));
        if previous.is_some() {
            debug!(blueprint = %name, "replaced blueprint");
        }
        Ok(blueprint)
    }

    /// Declare a trait visible to every blueprint of this registry.
    /// Blueprint-local traits of the same name take precedence.
    pub fn global_trait(&self, name: impl Into<String>, attrs: AttributeSpec) {
        self.insert_global(name.into(), Definition::new(attrs));
    }

    /// [`global_trait`](Self::global_trait) inheriting from `parent`.
    pub fn global_trait_with_parent(
        &self,
        name: impl Into<String>,
        attrs: AttributeSpec,
        parent: impl Into<String>,
    ) {
        self.insert_global(name.into(), Definition::new(attrs).with_parent(parent));
    }

    fn insert_global(&self, name: String, definition: Definition) {
        let mut globals = self.globals.write().expect("lock poisoned");
        debug!(definition = %name, "declared global trait");
        Arc::make_mut(&mut *globals).insert(Kind::Trait, name, definition);
    }

    /// Sorted names of the global traits.
    pub fn global_trait_names(&self) -> Vec<String> {
        let globals = self.globals.read().expect("lock poisoned");
        globals.names(Kind::Trait).into_iter().map(str::to_string).collect()
    }

    pub fn get(&self, name: &str) -> FactoryResult<Arc<Blueprint>> {
        self.blueprints
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| FactoryError::BlueprintNotFound(name.to_string()))
    }

    /// Sorted names of every registered blueprint.
    pub fn blueprint_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .blueprints
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    pub fn build(
        &self,
        blueprint: &str,
        document: Option<&str>,
        overrides: &AttributeSpec,
    ) -> FactoryResult<Document> {
        self.get(blueprint)?.build(document, overrides)
    }

    pub fn create(
        &self,
        blueprint: &str,
        document: Option<&str>,
        overrides: &AttributeSpec,
    ) -> FactoryResult<Document> {
        self.get(blueprint)?.create(document, overrides)
    }

    pub fn build_many(
        &self,
        count: usize,
        blueprint: &str,
        document: Option<&str>,
        overrides: &AttributeSpec,
    ) -> FactoryResult<Vec<Document>> {
        self.get(blueprint)?.build_many(count, document, overrides)
    }

    pub fn create_many(
        &self,
        count: usize,
        blueprint: &str,
        document: Option<&str>,
        overrides: &AttributeSpec,
    ) -> FactoryResult<Vec<Document>> {
        self.get(blueprint)?.create_many(count, document, overrides)
    }

    /// Clean up every blueprint that has a store, in name order. Returns the
    /// total number of documents removed.
    pub fn cleanup(&self) -> FactoryResult<usize> {
        let mut removed = 0;
        for blueprint in self.snapshot() {
            if blueprint.store().is_some() {
                removed += blueprint.cleanup()?;
            }
        }
        info!(removed, "registry cleanup");
        Ok(removed)
    }

    /// Forget every blueprint and global trait, cleaning up first when
    /// `cleanup_on_reset` is set.
    pub fn reset(&self) -> FactoryResult<()> {
        if self.config.cleanup_on_reset {
            self.cleanup()?;
        }
        self.blueprints.write().expect("lock poisoned").clear();
        *self.globals.write().expect("lock poisoned") = Arc::new(Namespace::new());
        debug!("registry reset");
        Ok(())
    }

    fn snapshot(&self) -> Vec<Arc<Blueprint>> {
        let map = self.blueprints.read().expect("lock poisoned");
        let mut blueprints: Vec<Arc<Blueprint>> = map.values().cloned().collect();
        blueprints.sort_by(|a, b| a.name().cmp(b.name()));
        blueprints
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("blueprints", &self.blueprint_names())
            .field("global_traits", &self.global_trait_names())
            .finish()
    }
}
