//! The proxy construction contract.

use thiserror::Error;

use crate::descriptor::TypeDescriptor;
use crate::loader::{LoaderHandle, LoaderId, LookupError};

/// Reasons a proxy facility rejects an interface combination.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// More interfaces than a proxy may implement.
    #[error("Proxy would implement {count} interfaces, limit is {max}")]
    TooManyInterfaces {
        /// Requested count.
        count: usize,
        /// Configured limit.
        max: usize,
    },

    /// A class was passed where an interface is required.
    #[error("'{name}' is not an interface")]
    NotAnInterface {
        /// The offending type.
        name: String,
    },

    /// The same interface appears twice.
    #[error("Repeated interface: {name}")]
    DuplicateInterface {
        /// The repeated interface.
        name: String,
    },

    /// The interface does not resolve to the same type from the target loader.
    #[error("'{name}' is not visible from loader {loader}")]
    NotVisible {
        /// The interface.
        name: String,
        /// Target loader.
        loader: LoaderId,
    },

    /// Checking visibility from the target loader failed outright.
    #[error("Looking up '{name}' from the target loader failed: {source}")]
    Lookup {
        /// The interface.
        name: String,
        /// Underlying failure.
        #[source]
        source: LookupError,
    },

    /// A non-public interface belongs to a loader other than the target.
    #[error("Non-public interface '{name}' is defined by {actual}, not the target loader {expected}")]
    NonPublicFromOtherLoader {
        /// The interface.
        name: String,
        /// Target loader.
        expected: LoaderId,
        /// Defining loader of the interface.
        actual: LoaderId,
    },

    /// Two interfaces declare the same method with different return types.
    #[error("Method '{method}' returns '{first}' in {first_owner} but '{second}' in {second_owner}")]
    ConflictingMethods {
        /// Method name and parameters.
        method: String,
        /// Return type in the first declaring interface.
        first: String,
        /// First declaring interface.
        first_owner: String,
        /// Return type in the second declaring interface.
        second: String,
        /// Second declaring interface.
        second_owner: String,
    },
}

/// Builds (or retrieves) a synthetic type implementing an ordered set of interfaces.
///
/// The same `(loader, interfaces)` request must yield the same type.
pub trait ProxyFactory: Send + Sync {
    /// Returns the proxy type for `interfaces`, defined by `loader`.
    fn proxy_type(
        &self,
        loader: &LoaderHandle,
        interfaces: &[TypeDescriptor],
    ) -> Result<TypeDescriptor, ProxyError>;
}
