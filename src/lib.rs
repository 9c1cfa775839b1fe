//! # loaderstream - Deserialization type resolution bound to a loader
//!
//! When a deserialization engine meets a type name in a stream it has to
//! decide which type that name denotes. In plugin or multi-tenant hosts the
//! code running deserialization and the code defining the types live in
//! different contexts, and asking the wrong one either fails or, worse,
//! yields a same-named type from somewhere else. loaderstream answers the
//! question from an explicitly supplied loader instead.
//!
//! ## Core Concepts
//!
//! - **Loader**: an isolated namespace mapping names to linked types (inert lookups only)
//! - **TypeDescriptor**: identity, visibility and defining loader of a linked type
//! - **TypeResolver**: resolves plain names and proxy interface sets against one loader
//! - **ObjectInput**: a session that verifies the stream header and feeds type records to the resolver
//!
//! ## Usage
//!
//! ```rust
//! use loaderstream::{InMemoryLoader, TypeDefinition, TypeResolver};
//!
//! let plugin = InMemoryLoader::builder("plugin")
//!     .define(TypeDefinition::interface("plugin.Hook").non_public())
//!     .build();
//! let app = InMemoryLoader::builder("app")
//!     .delegate(plugin.clone())
//!     .define(TypeDefinition::class("app.Order"))
//!     .build();
//!
//! let resolver = TypeResolver::new(app);
//! assert_eq!(resolver.resolve_type("app.Order")?.name(), "app.Order");
//!
//! // The only non-public interface decides where the proxy is defined.
//! let proxy = resolver.resolve_proxy_type(&["plugin.Hook"])?;
//! assert!(proxy.is_proxy());
//! # Ok::<(), loaderstream::ResolveError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod descriptor;
pub mod error;
pub mod loader;
pub mod proxy;
pub mod resolver;
pub mod stream;

// Re-export primary types at crate root for convenience
pub use descriptor::{
	is_valid_binary_name, DefinitionKind, MethodSig, TypeDefinition, TypeDescriptor, TypeId, TypeKind,
	Visibility,
};
pub use error::{ResolveError, ResolveResult};
pub use loader::{DirectoryLoader, InMemoryLoader, Loader, LoaderBuilder, LoaderHandle, LoaderId, LookupError};
pub use proxy::{CachingProxyFactory, ProxyError, ProxyFactory, ProxyFactoryConfig};
pub use resolver::{NonPublicContext, ResolveHooks, TypeResolver};
pub use stream::{ObjectInput, ObjectOutput, StreamConfig};
