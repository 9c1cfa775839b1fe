//! Type resolution bound to a fixed loader.
//!
//! A `TypeResolver` answers the two questions a deserialization engine asks
//! while walking a stream: which type does this name denote, and which proxy
//! type implements this list of interfaces. Both answers come from the loader
//! supplied at construction, never from any ambient context.

pub mod context;

use std::fmt;
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{ResolveError, ResolveResult};
use crate::loader::LoaderHandle;
use crate::proxy::{CachingProxyFactory, ProxyFactory};

pub use context::NonPublicContext;

/// The callbacks a host deserialization engine invokes during stream walking.
pub trait ResolveHooks {
    /// Resolve a plain type name.
    fn resolve_type(&self, name: &str) -> ResolveResult<TypeDescriptor>;

    /// Resolve the proxy type implementing `interfaces`, in order.
    fn resolve_proxy_type(&self, interfaces: &[String]) -> ResolveResult<TypeDescriptor>;
}

/// Resolves stream type names against one loader for its whole lifetime.
///
/// Holds no per-call state; independent resolvers may share a loader and a
/// proxy factory across threads.
#[derive(Clone)]
pub struct TypeResolver {
    loader: LoaderHandle,
    proxies: Arc<dyn ProxyFactory>,
}

impl TypeResolver {
    /// Binds a resolver to `loader`, building proxies through the
    /// process-wide [`CachingProxyFactory::shared`] cache.
    #[must_use]
    pub fn new(loader: LoaderHandle) -> Self {
        Self::with_proxy_factory(loader, CachingProxyFactory::shared())
    }

    /// Binds a resolver to `loader`, building proxies through `proxies`.
    #[must_use]
    pub fn with_proxy_factory(loader: LoaderHandle, proxies: Arc<dyn ProxyFactory>) -> Self {
        Self { loader, proxies }
    }

    /// The loader this resolver is bound to.
    #[must_use]
    pub fn loader(&self) -> &LoaderHandle {
        &self.loader
    }

    /// Resolves `name` through the bound loader without initializing it.
    ///
    /// # Errors
    /// - `TypeNotFound` if the loader cannot produce the type
    /// - `Io` if the loader's backing storage fails
    pub fn resolve_type(&self, name: &str) -> ResolveResult<TypeDescriptor> {
        let ty = self
            .loader
            .lookup(name)
            .map_err(|err| ResolveError::from_lookup(name, err))?;
        tracing::debug!(name, loader = %self.loader.id(), defined_by = %ty.loader_id(), "resolved type");
        Ok(ty)
    }

    /// Resolves the proxy type implementing `interfaces`, in order.
    ///
    /// Every interface is looked up through the bound loader. The proxy is
    /// defined by the loader of the first non-public interface if there is
    /// one, else by the bound loader.
    ///
    /// # Errors
    /// - `TypeNotFound` if an interface is unknown, the list is empty, or the
    ///   proxy facility rejects the combination (the rejection is the cause)
    /// - `ConflictingLoaders` if non-public interfaces come from two loaders
    /// - `Io` if the loader's backing storage fails
    pub fn resolve_proxy_type<S: AsRef<str>>(&self, interfaces: &[S]) -> ResolveResult<TypeDescriptor> {
        let names: Vec<String> = interfaces.iter().map(|n| n.as_ref().to_string()).collect();
        if names.is_empty() {
            return Err(ResolveError::TypeNotFound {
                names,
                source: Some("proxy interface list is empty".into()),
            });
        }

        let mut context = NonPublicContext::new();
        let mut resolved = Vec::with_capacity(names.len());
        for name in &names {
            let iface = self
                .loader
                .lookup(name)
                .map_err(|err| ResolveError::from_lookup(name, err))?;
            context.observe(&iface).inspect_err(|err| {
                tracing::warn!(interfaces = ?names, loader = %self.loader.id(), error = %err, "conflicting proxy interface loaders");
            })?;
            resolved.push(iface);
        }

        let target = match context.first() {
            Some(first) => first.defining_loader().ok_or_else(|| ResolveError::TypeNotFound {
                names: names.clone(),
                source: Some(format!("defining loader of '{}' is gone", first.name()).into()),
            })?,
            None => Arc::clone(&self.loader),
        };

        let proxy = match self.proxies.proxy_type(&target, &resolved) {
            Ok(proxy) => proxy,
            Err(err) => return Err(ResolveError::not_found_caused_by(names, err)),
        };
        tracing::debug!(
            proxy = proxy.name(),
            interfaces = ?names,
            loader = %target.id(),
            non_public = ?context.loader_id(),
            "resolved proxy type"
        );
        Ok(proxy)
    }
}

impl ResolveHooks for TypeResolver {
    fn resolve_type(&self, name: &str) -> ResolveResult<TypeDescriptor> {
        Self::resolve_type(self, name)
    }

    fn resolve_proxy_type(&self, interfaces: &[String]) -> ResolveResult<TypeDescriptor> {
        Self::resolve_proxy_type(self, interfaces)
    }
}

impl fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeResolver")
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}
