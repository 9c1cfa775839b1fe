//! Filesystem-backed loader.
//!
//! `a.b.C` is read from `<root>/a/b/C.json`, which holds one serialized
//! `TypeDefinition`. Lookups therefore perform I/O; everything but a missing
//! file is reported as `LookupError::Io` so resolution can pass it through.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::descriptor::{is_valid_binary_name, TypeDefinition, TypeDescriptor};
use crate::loader::traits::{Loader, LoaderHandle, LoaderId, LookupError};

/// A loader reading definitions from a directory tree.
pub struct DirectoryLoader {
    id: LoaderId,
    name: String,
    root: PathBuf,
    this: Weak<dyn Loader>,
    parent: Option<LoaderHandle>,
    linked: RwLock<HashMap<String, TypeDescriptor>>,
}

impl DirectoryLoader {
    /// Creates a loader rooted at `root`.
    #[must_use]
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Arc<Self> {
        Self::build(name.into(), root.into(), None)
    }

    /// Creates a loader rooted at `root` that asks `parent` first.
    #[must_use]
    pub fn with_parent(name: impl Into<String>, root: impl Into<PathBuf>, parent: LoaderHandle) -> Arc<Self> {
        Self::build(name.into(), root.into(), Some(parent))
    }

    fn build(name: String, root: PathBuf, parent: Option<LoaderHandle>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let this: Weak<dyn Loader> = weak.clone();
            Self {
                id: LoaderId::new(),
                name,
                root,
                this,
                parent,
                linked: RwLock::new(HashMap::new()),
            }
        })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path where the definition of `name` is expected.
    #[must_use]
    pub fn definition_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in name.split('.') {
            path.push(segment);
        }
        path.set_extension("json");
        path
    }

    fn read_definition(&self, name: &str) -> Result<TypeDefinition, LookupError> {
        // Guards against path traversal as well as malformed names.
        if !is_valid_binary_name(name) {
            return Err(LookupError::NotFound {
                name: name.to_string(),
            });
        }

        let path = self.definition_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(LookupError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(source) => {
                return Err(LookupError::Io {
                    name: name.to_string(),
                    source,
                });
            }
        };

        let def: TypeDefinition = serde_json::from_slice(&bytes).map_err(|e| LookupError::InvalidDefinition {
            name: name.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        if def.name != name {
            return Err(LookupError::InvalidDefinition {
                name: name.to_string(),
                reason: format!("{} declares '{}'", path.display(), def.name),
            });
        }
        def.validate().map_err(|reason| LookupError::InvalidDefinition {
            name: name.to_string(),
            reason,
        })?;
        Ok(def)
    }
}

impl Loader for DirectoryLoader {
    fn id(&self) -> LoaderId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, name: &str) -> Result<TypeDescriptor, LookupError> {
        if let Some(parent) = &self.parent {
            match parent.lookup(name) {
                Ok(ty) => return Ok(ty),
                Err(LookupError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        if let Some(ty) = self
            .linked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(ty.clone());
        }

        let def = self.read_definition(name)?;
        tracing::trace!(name, loader = %self.id, root = %self.root.display(), "linking type from disk");

        let mut linked = self.linked.write().unwrap_or_else(PoisonError::into_inner);
        Ok(linked
            .entry(name.to_string())
            .or_insert_with(|| TypeDescriptor::link(&def, self.id, self.this.clone()))
            .clone())
    }
}

impl fmt::Debug for DirectoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryLoader")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("root", &self.root)
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::descriptor::{MethodSig, Visibility};
    use crate::loader::InMemoryLoader;

    fn write_def(root: &Path, def: &TypeDefinition) {
        let segments: Vec<&str> = def.name.split('.').collect();
        let mut dir = root.to_path_buf();
        for segment in &segments[..segments.len() - 1] {
            dir.push(segment);
        }
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join(format!("{}.json", segments[segments.len() - 1]));
        fs::write(file, serde_json::to_vec(def).unwrap()).unwrap();
    }

    #[test]
    fn loads_definitions_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let def = TypeDefinition::interface("plugin.api.Hook")
            .non_public()
            .with_method(MethodSig::new("fire", ["int"], "void"));
        write_def(tmp.path(), &def);

        let loader = DirectoryLoader::new("plugins", tmp.path());
        let ty = loader.lookup("plugin.api.Hook").unwrap();
        assert_eq!(ty.name(), "plugin.api.Hook");
        assert_eq!(ty.visibility(), Visibility::NonPublic);
        assert_eq!(ty.loader_id(), loader.id());
        assert_eq!(loader.lookup("plugin.api.Hook").unwrap(), ty);
        assert_eq!(
            loader.definition_path("plugin.api.Hook"),
            tmp.path().join("plugin").join("api").join("Hook.json")
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = DirectoryLoader::new("plugins", tmp.path());
        assert!(loader.lookup("nope.Nothing").unwrap_err().is_not_found());
        assert!(loader.lookup("../etc.passwd").unwrap_err().is_not_found());
    }

    #[test]
    fn unreadable_definition_is_io() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory where the file should be: reading it fails with something other than NotFound.
        fs::create_dir_all(tmp.path().join("a").join("B.json")).unwrap();

        let loader = DirectoryLoader::new("plugins", tmp.path());
        let err = loader.lookup("a.B").unwrap_err();
        assert!(matches!(err, LookupError::Io { .. }), "got {err:?}");
    }

    #[test]
    fn mismatched_or_garbled_definitions_are_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        write_def(tmp.path(), &TypeDefinition::class("a.Other"));
        fs::rename(tmp.path().join("a").join("Other.json"), tmp.path().join("a").join("Named.json")).unwrap();
        fs::write(tmp.path().join("a").join("Garbled.json"), b"not json").unwrap();

        let loader = DirectoryLoader::new("plugins", tmp.path());
        assert!(matches!(
            loader.lookup("a.Named").unwrap_err(),
            LookupError::InvalidDefinition { .. }
        ));
        assert!(matches!(
            loader.lookup("a.Garbled").unwrap_err(),
            LookupError::InvalidDefinition { .. }
        ));
    }

    #[test]
    fn parent_is_asked_first() {
        let tmp = tempfile::tempdir().unwrap();
        write_def(tmp.path(), &TypeDefinition::class("core.Value"));

        let core = InMemoryLoader::builder("core")
            .define(TypeDefinition::class("core.Value"))
            .build();
        let loader = DirectoryLoader::with_parent("plugins", tmp.path(), core.clone());

        let ty = loader.lookup("core.Value").unwrap();
        assert_eq!(ty.loader_id(), core.id());
    }
}
