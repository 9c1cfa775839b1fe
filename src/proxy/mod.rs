//! Synthetic proxy types.
//!
//! Generating code for a proxy is outside this crate; what is modelled here
//! is the facility's contract (a typed rejection surface) and a caching
//! implementation that enforces the structural rules on interface sets.

pub mod cache;
pub mod traits;

pub use cache::{CachingProxyFactory, ProxyFactoryConfig};
pub use traits::{ProxyError, ProxyFactory};
