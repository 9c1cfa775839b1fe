//! The loader contract.
//!
//! A loader is an isolated namespace mapping binary type names to linked
//! `TypeDescriptor`s. Resolution only ever consults a loader through this
//! trait, so any module registry or plugin sandbox can act as one.

use std::fmt;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::descriptor::TypeDescriptor;

/// Stable identity of a resolution context.
///
/// Two descriptors share a context exactly when their `LoaderId`s are equal.
///
/// # Examples
///
/// ```
/// use loaderstream::LoaderId;
///
/// let id = LoaderId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoaderId(Uuid);

impl LoaderId {
    /// Creates a new random loader ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a loader ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for LoaderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during a loader lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The loader does not know this name.
    #[error("No such type in loader: {name}")]
    NotFound {
        /// The requested name.
        name: String,
    },

    /// The backing definition exists but cannot be linked.
    #[error("Invalid definition for '{name}': {reason}")]
    InvalidDefinition {
        /// The requested name.
        name: String,
        /// Why linking failed.
        reason: String,
    },

    /// Reading the backing definition failed.
    #[error("I/O error loading '{name}': {source}")]
    Io {
        /// The requested name.
        name: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl LookupError {
    /// Returns true if the name is simply unknown to the loader.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A resolution context.
///
/// # Contract
/// - `lookup` is inert: it links the type but never runs its initializer.
/// - Repeated lookups of the same name return the same type (`TypeId`).
/// - Implementations must be safe for concurrent lookups; independent
///   sessions share loaders freely.
pub trait Loader: Send + Sync {
    /// Identity of this context.
    fn id(&self) -> LoaderId;

    /// Human-readable name, used in diagnostics only.
    fn name(&self) -> &str;

    /// Map a binary name to a linked, uninitialized descriptor.
    fn lookup(&self, name: &str) -> Result<TypeDescriptor, LookupError>;

    /// Run the static initializer of a type defined by this loader.
    ///
    /// Initializers run at most once. The default loader has none.
    fn initialize(&self, _ty: &TypeDescriptor) -> Result<(), LookupError> {
        Ok(())
    }

    /// Look up `name` and optionally initialize it.
    fn load(&self, name: &str, initialize: bool) -> Result<TypeDescriptor, LookupError> {
        let ty = self.lookup(name)?;
        if initialize {
            match ty.defining_loader() {
                Some(owner) => owner.initialize(&ty)?,
                None => self.initialize(&ty)?,
            }
        }
        Ok(ty)
    }
}

/// Shared handle to a loader.
pub type LoaderHandle = Arc<dyn Loader>;

impl fmt::Debug for dyn Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
