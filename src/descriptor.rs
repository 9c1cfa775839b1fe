//! Type definitions and linked type descriptors.
//!
//! A `TypeDefinition` is what a loader reads from its backing store. Linking
//! it produces a `TypeDescriptor`: the immutable runtime identity the host
//! engine receives from resolution.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::loader::{Loader, LoaderHandle, LoaderId};

fn binary_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\p{L}_$][\p{L}\p{N}_$]*(?:\.[\p{L}_$][\p{L}\p{N}_$]*)*$")
            .expect("binary name pattern is valid")
    })
}

/// Returns true if `name` is a well-formed binary type name (`a.b.C`, `a.b.C$Inner`).
#[must_use]
pub fn is_valid_binary_name(name: &str) -> bool {
    binary_name_regex().is_match(name)
}

/// Identity of a linked type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(Uuid);

impl TypeId {
    /// Creates a new random type ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TypeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accessibility of a type outside its defining context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Visible from any context.
    #[default]
    Public,
    /// Only accessible from within the defining loader.
    NonPublic,
}

impl Visibility {
    /// Returns true for `Public`.
    #[must_use]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// Kind of a backing definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// A concrete or abstract class.
    #[default]
    Class,
    /// An interface; only interfaces may back a proxy.
    Interface,
}

/// A method signature declared by an interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSig {
    /// Method name.
    pub name: String,
    /// Parameter type names, in order.
    #[serde(default)]
    pub params: Vec<String>,
    /// Return type name.
    #[serde(default = "void_type")]
    pub returns: String,
}

fn void_type() -> String {
    "void".to_string()
}

impl MethodSig {
    /// Creates a signature.
    #[must_use]
    pub fn new<P, S>(name: impl Into<String>, params: P, returns: impl Into<String>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            returns: returns.into(),
        }
    }

    /// Returns true if `other` has the same name and parameter list.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}({})", self.returns, self.name, self.params.join(", "))
    }
}

/// The backing definition of a type, as stored by a loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Binary name.
    pub name: String,
    /// Class or interface.
    #[serde(default)]
    pub kind: DefinitionKind,
    /// Accessibility outside the defining loader.
    #[serde(default)]
    pub visibility: Visibility,
    /// Declared methods (interfaces only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodSig>,
}

impl TypeDefinition {
    /// A public class definition.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DefinitionKind::Class,
            visibility: Visibility::Public,
            methods: Vec::new(),
        }
    }

    /// A public interface definition.
    #[must_use]
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            kind: DefinitionKind::Interface,
            ..Self::class(name)
        }
    }

    /// Marks the definition non-public.
    #[must_use]
    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    /// Adds a method signature.
    #[must_use]
    pub fn with_method(mut self, method: MethodSig) -> Self {
        self.methods.push(method);
        self
    }

    /// Checks that the definition can be linked.
    ///
    /// # Errors
    /// Returns a human-readable reason when the name is malformed, a method
    /// is unnamed, or a class declares methods.
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_binary_name(&self.name) {
            return Err(format!("malformed binary name '{}'", self.name));
        }
        if self.kind == DefinitionKind::Class && !self.methods.is_empty() {
            return Err("only interfaces declare proxyable methods".to_string());
        }
        if let Some(m) = self.methods.iter().find(|m| m.name.trim().is_empty()) {
            return Err(format!("method with empty name returning '{}'", m.returns));
        }
        Ok(())
    }
}

/// What a descriptor describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// A class.
    Class,
    /// An interface and its methods.
    Interface {
        /// Declared methods.
        methods: Vec<MethodSig>,
    },
    /// A synthetic proxy implementing `interfaces`, in request order.
    Proxy {
        /// Implemented interfaces.
        interfaces: Vec<TypeDescriptor>,
    },
}

struct DescriptorInner {
    id: TypeId,
    name: String,
    kind: TypeKind,
    visibility: Visibility,
    loader_id: LoaderId,
    loader: Weak<dyn Loader>,
}

/// An already-linked type.
///
/// Cloning is cheap and preserves identity: equality and hashing use the
/// `TypeId` only. The back-reference to the defining loader is weak so that
/// loaders may cache their own descriptors.
#[derive(Clone)]
pub struct TypeDescriptor {
    inner: Arc<DescriptorInner>,
}

impl TypeDescriptor {
    /// Links `def` as a type defined by `loader`.
    ///
    /// Callers are expected to have validated `def`.
    #[must_use]
    pub fn link(def: &TypeDefinition, loader_id: LoaderId, loader: Weak<dyn Loader>) -> Self {
        let kind = match def.kind {
            DefinitionKind::Class => TypeKind::Class,
            DefinitionKind::Interface => TypeKind::Interface {
                methods: def.methods.clone(),
            },
        };
        Self {
            inner: Arc::new(DescriptorInner {
                id: TypeId::new(),
                name: def.name.clone(),
                kind,
                visibility: def.visibility,
                loader_id,
                loader,
            }),
        }
    }

    /// Creates a synthetic proxy type defined by `loader`.
    #[must_use]
    pub fn proxy(
        name: impl Into<String>,
        interfaces: Vec<TypeDescriptor>,
        visibility: Visibility,
        loader: &LoaderHandle,
    ) -> Self {
        Self {
            inner: Arc::new(DescriptorInner {
                id: TypeId::new(),
                name: name.into(),
                kind: TypeKind::Proxy { interfaces },
                visibility,
                loader_id: loader.id(),
                loader: Arc::downgrade(loader),
            }),
        }
    }

    /// Identity of this type.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.inner.id
    }

    /// Binary name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// What this type is.
    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.inner.kind
    }

    /// Accessibility outside the defining loader.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.inner.visibility
    }

    /// Shorthand for `visibility().is_public()`.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.inner.visibility.is_public()
    }

    /// Returns true for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        matches!(self.inner.kind, TypeKind::Interface { .. })
    }

    /// Returns true for synthetic proxy types.
    #[must_use]
    pub fn is_proxy(&self) -> bool {
        matches!(self.inner.kind, TypeKind::Proxy { .. })
    }

    /// Declared methods; empty for anything but interfaces.
    #[must_use]
    pub fn methods(&self) -> &[MethodSig] {
        match &self.inner.kind {
            TypeKind::Interface { methods } => methods,
            _ => &[],
        }
    }

    /// Implemented interfaces; empty for anything but proxies.
    #[must_use]
    pub fn interfaces(&self) -> &[TypeDescriptor] {
        match &self.inner.kind {
            TypeKind::Proxy { interfaces } => interfaces,
            _ => &[],
        }
    }

    /// Identity of the defining loader.
    #[must_use]
    pub fn loader_id(&self) -> LoaderId {
        self.inner.loader_id
    }

    /// The defining loader, if it is still alive.
    #[must_use]
    pub fn defining_loader(&self) -> Option<LoaderHandle> {
        self.inner.loader.upgrade()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for TypeDescriptor {}

impl std::hash::Hash for TypeDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner.kind {
            TypeKind::Class => "class",
            TypeKind::Interface { .. } => "interface",
            TypeKind::Proxy { .. } => "proxy",
        };
        f.debug_struct("TypeDescriptor")
            .field("name", &self.inner.name)
            .field("kind", &kind)
            .field("visibility", &self.inner.visibility)
            .field("loader", &self.inner.loader_id)
            .field("id", &self.inner.id)
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_names() {
        assert!(is_valid_binary_name("java.lang.Runnable"));
        assert!(is_valid_binary_name("a.b.Outer$Inner"));
        assert!(is_valid_binary_name("_x.$y"));
        assert!(is_valid_binary_name("Top"));
        assert!(!is_valid_binary_name(""));
        assert!(!is_valid_binary_name("a..b"));
        assert!(!is_valid_binary_name(".a"));
        assert!(!is_valid_binary_name("a.b."));
        assert!(!is_valid_binary_name("1a.B"));
        assert!(!is_valid_binary_name("a b"));
    }

    #[test]
    fn definition_validation() {
        assert!(TypeDefinition::class("a.A").validate().is_ok());
        assert!(TypeDefinition::class("a..A").validate().is_err());

        let iface = TypeDefinition::interface("a.I").with_method(MethodSig::new("run", ["int"], "void"));
        assert!(iface.validate().is_ok());

        let bad_class = TypeDefinition::class("a.C").with_method(MethodSig::new("run", Vec::<String>::new(), "void"));
        assert!(bad_class.validate().is_err());

        let unnamed = TypeDefinition::interface("a.J").with_method(MethodSig::new(" ", Vec::<String>::new(), "void"));
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn definition_json_defaults() {
        let def: TypeDefinition = serde_json::from_str(r#"{"name":"a.A"}"#).unwrap();
        assert_eq!(def, TypeDefinition::class("a.A"));

        let def: TypeDefinition = serde_json::from_str(
            r#"{"name":"a.I","kind":"interface","visibility":"non_public","methods":[{"name":"call"}]}"#,
        )
        .unwrap();
        assert_eq!(def.kind, DefinitionKind::Interface);
        assert_eq!(def.visibility, Visibility::NonPublic);
        assert_eq!(def.methods[0].returns, "void");
        assert!(def.methods[0].params.is_empty());
    }

    #[test]
    fn method_shape() {
        let a = MethodSig::new("get", ["int"], "java.lang.String");
        let b = MethodSig::new("get", ["int"], "java.lang.Object");
        let c = MethodSig::new("get", ["long"], "java.lang.String");
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
        assert_eq!(a.to_string(), "java.lang.String get(int)");
    }
}
