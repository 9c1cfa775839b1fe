//! In-memory loader.
//!
//! Definitions are registered up front through `LoaderBuilder`; linking
//! happens lazily on first lookup and the linked descriptor is cached so that
//! every later lookup returns the same type.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::descriptor::{TypeDefinition, TypeDescriptor, TypeId};
use crate::loader::traits::{Loader, LoaderHandle, LoaderId, LookupError};

type Initializer = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct LinkState {
    linked: HashMap<String, TypeDescriptor>,
    initialized: HashSet<TypeId>,
}

/// A loader backed by definitions held in memory.
///
/// Delegates are consulted first, in registration order; a delegate answering
/// `NotFound` moves the search on, any other failure ends it.
pub struct InMemoryLoader {
    id: LoaderId,
    name: String,
    this: Weak<dyn Loader>,
    delegates: Vec<LoaderHandle>,
    definitions: HashMap<String, TypeDefinition>,
    initializers: HashMap<String, Initializer>,
    state: RwLock<LinkState>,
}

impl InMemoryLoader {
    /// Starts building a loader called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> LoaderBuilder {
        LoaderBuilder::new(name)
    }

    /// Returns true if `name` is defined directly by this loader.
    #[must_use]
    pub fn defines(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Returns true if the type called `name` has been initialized here.
    #[must_use]
    pub fn is_initialized(&self, name: &str) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .linked
            .get(name)
            .is_some_and(|ty| state.initialized.contains(&ty.id()))
    }

    /// Number of types linked so far by this loader.
    #[must_use]
    pub fn linked_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .linked
            .len()
    }

    fn lookup_delegates(&self, name: &str) -> Result<Option<TypeDescriptor>, LookupError> {
        for delegate in &self.delegates {
            match delegate.lookup(name) {
                Ok(ty) => {
                    tracing::trace!(name, loader = %self.id, delegate = %delegate.id(), "resolved through delegate");
                    return Ok(Some(ty));
                }
                Err(LookupError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    fn link_local(&self, name: &str) -> Result<TypeDescriptor, LookupError> {
        if let Some(ty) = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .linked
            .get(name)
        {
            return Ok(ty.clone());
        }

        let def = self.definitions.get(name).ok_or_else(|| LookupError::NotFound {
            name: name.to_string(),
        })?;
        def.validate().map_err(|reason| LookupError::InvalidDefinition {
            name: name.to_string(),
            reason,
        })?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let ty = state
            .linked
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::trace!(name, loader = %self.id, "linking type");
                TypeDescriptor::link(def, self.id, self.this.clone())
            })
            .clone();
        Ok(ty)
    }
}

impl Loader for InMemoryLoader {
    fn id(&self) -> LoaderId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, name: &str) -> Result<TypeDescriptor, LookupError> {
        if let Some(ty) = self.lookup_delegates(name)? {
            return Ok(ty);
        }
        self.link_local(name)
    }

    fn initialize(&self, ty: &TypeDescriptor) -> Result<(), LookupError> {
        if ty.loader_id() != self.id {
            return Err(LookupError::InvalidDefinition {
                name: ty.name().to_string(),
                reason: format!("defined by loader {}, not {}", ty.loader_id(), self.id),
            });
        }

        // Mark first, run outside the lock: initializers may look types up.
        let first = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .initialized
            .insert(ty.id());
        if first {
            if let Some(init) = self.initializers.get(ty.name()) {
                tracing::debug!(name = ty.name(), loader = %self.id, "running initializer");
                init();
            }
        }
        Ok(())
    }
}

impl fmt::Debug for InMemoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryLoader")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("delegates", &self.delegates.len())
            .field("definitions", &self.definitions.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`InMemoryLoader`].
pub struct LoaderBuilder {
    id: LoaderId,
    name: String,
    delegates: Vec<LoaderHandle>,
    definitions: HashMap<String, TypeDefinition>,
    initializers: HashMap<String, Initializer>,
}

impl LoaderBuilder {
    /// Creates a builder for a loader called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LoaderId::new(),
            name: name.into(),
            delegates: Vec::new(),
            definitions: HashMap::new(),
            initializers: HashMap::new(),
        }
    }

    /// Uses a fixed identity instead of a random one.
    #[must_use]
    pub fn id(mut self, id: LoaderId) -> Self {
        self.id = id;
        self
    }

    /// Appends a delegate consulted before local definitions.
    #[must_use]
    pub fn delegate(mut self, loader: LoaderHandle) -> Self {
        self.delegates.push(loader);
        self
    }

    /// Registers a definition. A later definition of the same name replaces it.
    #[must_use]
    pub fn define(mut self, def: TypeDefinition) -> Self {
        self.definitions.insert(def.name.clone(), def);
        self
    }

    /// Registers a definition together with its static initializer.
    #[must_use]
    pub fn define_with_initializer<F>(mut self, def: TypeDefinition, init: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.initializers.insert(def.name.clone(), Box::new(init));
        self.define(def)
    }

    /// Registers every definition of a JSON manifest (an array of definitions).
    ///
    /// # Errors
    /// Returns the parse error if the manifest is not valid JSON of that shape.
    pub fn manifest_json(mut self, json: &str) -> Result<Self, serde_json::Error> {
        let defs: Vec<TypeDefinition> = serde_json::from_str(json)?;
        for def in defs {
            self = self.define(def);
        }
        Ok(self)
    }

    /// Builds the loader.
    #[must_use]
    pub fn build(self) -> Arc<InMemoryLoader> {
        Arc::new_cyclic(|weak: &Weak<InMemoryLoader>| {
            let this: Weak<dyn Loader> = weak.clone();
            InMemoryLoader {
                id: self.id,
                name: self.name,
                this,
                delegates: self.delegates,
                definitions: self.definitions,
                initializers: self.initializers,
                state: RwLock::new(LinkState::default()),
            }
        })
    }
}
