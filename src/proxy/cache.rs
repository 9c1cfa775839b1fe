//! Caching proxy factory.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::descriptor::{MethodSig, TypeDescriptor, TypeId, Visibility};
use crate::loader::{LoaderHandle, LoaderId, LookupError};
use crate::proxy::traits::{ProxyError, ProxyFactory};

/// Proxy factory configuration.
#[derive(Debug, Clone)]
pub struct ProxyFactoryConfig {
    /// Maximum number of interfaces a single proxy may implement.
    pub max_interfaces: usize,
}

impl Default for ProxyFactoryConfig {
    fn default() -> Self {
        Self {
            max_interfaces: 65_535,
        }
    }
}

type CacheKey = (LoaderId, Vec<TypeId>);

/// Validates interface sets and hands out one proxy type per
/// `(loader, ordered interfaces)` pair.
///
/// Interface order is significant: `[A, B]` and `[B, A]` are distinct proxies.
#[derive(Default)]
pub struct CachingProxyFactory {
    config: ProxyFactoryConfig,
    cache: RwLock<HashMap<CacheKey, TypeDescriptor>>,
}

impl CachingProxyFactory {
    /// Creates a factory with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory with explicit limits.
    #[must_use]
    pub fn with_config(config: ProxyFactoryConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide factory used by resolvers built without one.
    ///
    /// Every resolver bound to the same loader goes through this cache, so a
    /// given interface list names one proxy type per loader.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<CachingProxyFactory>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Number of proxy types built so far.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn validate(&self, loader: &LoaderHandle, interfaces: &[TypeDescriptor]) -> Result<Visibility, ProxyError> {
        if interfaces.len() > self.config.max_interfaces {
            return Err(ProxyError::TooManyInterfaces {
                count: interfaces.len(),
                max: self.config.max_interfaces,
            });
        }

        let mut seen: HashSet<TypeId> = HashSet::with_capacity(interfaces.len());
        let mut visibility = Visibility::Public;

        for iface in interfaces {
            if !iface.is_interface() {
                return Err(ProxyError::NotAnInterface {
                    name: iface.name().to_string(),
                });
            }
            if !seen.insert(iface.id()) {
                return Err(ProxyError::DuplicateInterface {
                    name: iface.name().to_string(),
                });
            }

            match loader.lookup(iface.name()) {
                Ok(found) if found == *iface => {}
                Ok(_) | Err(LookupError::NotFound { .. }) => {
                    return Err(ProxyError::NotVisible {
                        name: iface.name().to_string(),
                        loader: loader.id(),
                    });
                }
                Err(source) => {
                    return Err(ProxyError::Lookup {
                        name: iface.name().to_string(),
                        source,
                    });
                }
            }

            if !iface.is_public() {
                if iface.loader_id() != loader.id() {
                    return Err(ProxyError::NonPublicFromOtherLoader {
                        name: iface.name().to_string(),
                        expected: loader.id(),
                        actual: iface.loader_id(),
                    });
                }
                visibility = Visibility::NonPublic;
            }
        }

        check_method_returns(interfaces)?;
        Ok(visibility)
    }
}

fn check_method_returns(interfaces: &[TypeDescriptor]) -> Result<(), ProxyError> {
    let mut declared: HashMap<(&str, &[String]), (&MethodSig, &str)> = HashMap::new();
    for iface in interfaces {
        for method in iface.methods() {
            match declared.entry((method.name.as_str(), method.params.as_slice())) {
                Entry::Occupied(entry) => {
                    let (prev, owner) = *entry.get();
                    if prev.returns != method.returns {
                        return Err(ProxyError::ConflictingMethods {
                            method: format!("{}({})", method.name, method.params.join(", ")),
                            first: prev.returns.clone(),
                            first_owner: owner.to_string(),
                            second: method.returns.clone(),
                            second_owner: iface.name().to_string(),
                        });
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert((method, iface.name()));
                }
            }
        }
    }
    Ok(())
}

fn proxy_name(loader: LoaderId, interfaces: &[TypeDescriptor], visibility: Visibility) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(loader.as_uuid().as_bytes());
    for iface in interfaces {
        hasher.update(iface.id().as_uuid().as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    let fingerprint = &hex.as_str()[..16];

    // Non-public proxies live next to their non-public interface.
    let package = match visibility {
        Visibility::NonPublic => interfaces
            .iter()
            .find(|i| !i.is_public())
            .and_then(|i| i.name().rsplit_once('.'))
            .map(|(pkg, _)| pkg),
        Visibility::Public => None,
    };
    match package {
        Some(pkg) => format!("{pkg}.$Proxy{fingerprint}"),
        None => format!("$Proxy{fingerprint}"),
    }
}

impl ProxyFactory for CachingProxyFactory {
    fn proxy_type(
        &self,
        loader: &LoaderHandle,
        interfaces: &[TypeDescriptor],
    ) -> Result<TypeDescriptor, ProxyError> {
        let key: CacheKey = (loader.id(), interfaces.iter().map(TypeDescriptor::id).collect());
        if let Some(ty) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            tracing::trace!(proxy = ty.name(), loader = %loader.id(), "proxy cache hit");
            return Ok(ty.clone());
        }

        let visibility = self.validate(loader, interfaces).inspect_err(|err| {
            tracing::warn!(loader = %loader.id(), error = %err, "proxy interface set rejected");
        })?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Entries of dropped loaders can never be requested again.
        cache.retain(|_, ty| ty.defining_loader().is_some());
        let ty = cache
            .entry(key)
            .or_insert_with(|| {
                let name = proxy_name(loader.id(), interfaces, visibility);
                tracing::debug!(proxy = %name, loader = %loader.id(), interfaces = interfaces.len(), "defining proxy type");
                TypeDescriptor::proxy(name, interfaces.to_vec(), visibility, loader)
            })
            .clone();
        Ok(ty)
    }
}

impl fmt::Debug for CachingProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingProxyFactory")
            .field("config", &self.config)
            .field("cached", &self.cached_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::descriptor::TypeDefinition;
    use crate::loader::{InMemoryLoader, Loader};

    fn handle(loader: &Arc<InMemoryLoader>) -> LoaderHandle {
        loader.clone()
    }

    #[test]
    fn same_request_returns_cached_proxy() {
        let loader = InMemoryLoader::builder("app")
            .define(TypeDefinition::interface("api.A"))
            .define(TypeDefinition::interface("api.B"))
            .build();
        let factory = CachingProxyFactory::new();
        let l = handle(&loader);
        let a = loader.lookup("api.A").unwrap();
        let b = loader.lookup("api.B").unwrap();

        let p1 = factory.proxy_type(&l, &[a.clone(), b.clone()]).unwrap();
        let p2 = factory.proxy_type(&l, &[a.clone(), b.clone()]).unwrap();
        assert_eq!(p1, p2);
        assert!(p1.is_proxy());
        assert!(p1.is_public());
        assert!(p1.name().starts_with("$Proxy"));
        assert_eq!(p1.loader_id(), loader.id());
        assert_eq!(p1.interfaces(), &[a.clone(), b.clone()]);

        let reversed = factory.proxy_type(&l, &[b, a]).unwrap();
        assert_ne!(reversed, p1);
        assert_eq!(factory.cached_count(), 2);
    }

    #[test]
    fn rejects_classes_and_duplicates() {
        let loader = InMemoryLoader::builder("app")
            .define(TypeDefinition::interface("api.A"))
            .define(TypeDefinition::class("api.Impl"))
            .build();
        let factory = CachingProxyFactory::new();
        let l = handle(&loader);
        let a = loader.lookup("api.A").unwrap();
        let class = loader.lookup("api.Impl").unwrap();

        assert!(matches!(
            factory.proxy_type(&l, &[class]),
            Err(ProxyError::NotAnInterface { .. })
        ));
        assert!(matches!(
            factory.proxy_type(&l, &[a.clone(), a]),
            Err(ProxyError::DuplicateInterface { .. })
        ));
        assert_eq!(factory.cached_count(), 0);
    }

    #[test]
    fn rejects_interfaces_invisible_from_target() {
        let plugin = InMemoryLoader::builder("plugin")
            .define(TypeDefinition::interface("plugin.Hook"))
            .build();
        let other = InMemoryLoader::builder("other").build();
        let hook = plugin.lookup("plugin.Hook").unwrap();

        let err = CachingProxyFactory::new()
            .proxy_type(&handle(&other), &[hook])
            .unwrap_err();
        assert!(matches!(err, ProxyError::NotVisible { .. }));
    }

    #[test]
    fn rejects_non_public_interface_from_other_loader() {
        let plugin = InMemoryLoader::builder("plugin")
            .define(TypeDefinition::interface("plugin.Secret").non_public())
            .build();
        let app = InMemoryLoader::builder("app").delegate(plugin.clone()).build();
        let secret = app.lookup("plugin.Secret").unwrap();

        let err = CachingProxyFactory::new()
            .proxy_type(&handle(&app), &[secret.clone()])
            .unwrap_err();
        assert!(matches!(err, ProxyError::NonPublicFromOtherLoader { .. }));

        let proxy = CachingProxyFactory::new()
            .proxy_type(&handle(&plugin), &[secret])
            .unwrap();
        assert!(!proxy.is_public());
        assert!(proxy.name().starts_with("plugin.$Proxy"));
        assert_eq!(proxy.loader_id(), plugin.id());
    }

    #[test]
    fn rejects_conflicting_return_types() {
        let loader = InMemoryLoader::builder("app")
            .define(TypeDefinition::interface("api.Reader").with_method(MethodSig::new("read", ["int"], "byte[]")))
            .define(TypeDefinition::interface("api.Source").with_method(MethodSig::new("read", ["int"], "int")))
            .define(TypeDefinition::interface("api.Same").with_method(MethodSig::new("read", ["int"], "byte[]")))
            .build();
        let l = handle(&loader);
        let reader = loader.lookup("api.Reader").unwrap();
        let source = loader.lookup("api.Source").unwrap();
        let same = loader.lookup("api.Same").unwrap();
        let factory = CachingProxyFactory::new();

        let err = factory.proxy_type(&l, &[reader.clone(), source]).unwrap_err();
        let ProxyError::ConflictingMethods { method, first_owner, second_owner, .. } = err else {
            panic!("expected method conflict");
        };
        assert_eq!(method, "read(int)");
        assert_eq!(first_owner, "api.Reader");
        assert_eq!(second_owner, "api.Source");

        assert!(factory.proxy_type(&l, &[reader, same]).is_ok());
    }

    #[test]
    fn entries_of_dropped_loaders_are_evicted() {
        let factory = CachingProxyFactory::new();
        let gone = InMemoryLoader::builder("gone")
            .define(TypeDefinition::interface("api.A"))
            .build();
        let a = gone.lookup("api.A").unwrap();
        factory.proxy_type(&handle(&gone), &[a]).unwrap();
        assert_eq!(factory.cached_count(), 1);
        drop(gone);

        let kept = InMemoryLoader::builder("kept")
            .define(TypeDefinition::interface("api.B"))
            .build();
        let b = kept.lookup("api.B").unwrap();
        factory.proxy_type(&handle(&kept), &[b]).unwrap();
        assert_eq!(factory.cached_count(), 1);
    }

    #[test]
    fn shared_factory_is_one_instance() {
        assert!(Arc::ptr_eq(&CachingProxyFactory::shared(), &CachingProxyFactory::shared()));
    }

    #[test]
    fn enforces_interface_limit() {
        let loader = InMemoryLoader::builder("app")
            .define(TypeDefinition::interface("api.A"))
            .define(TypeDefinition::interface("api.B"))
            .build();
        let factory = CachingProxyFactory::with_config(ProxyFactoryConfig { max_interfaces: 1 });
        let a = loader.lookup("api.A").unwrap();
        let b = loader.lookup("api.B").unwrap();

        let err = factory.proxy_type(&handle(&loader), &[a, b]).unwrap_err();
        assert!(matches!(err, ProxyError::TooManyInterfaces { count: 2, max: 1 }));
    }
}
