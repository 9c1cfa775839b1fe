//! Resolution contexts.
//!
//! The `Loader` trait is the only capability resolution needs. Two backends
//! are provided: an in-memory registry and a directory of JSON definitions.

pub mod directory;
pub mod memory;
pub mod traits;

pub use directory::DirectoryLoader;
pub use memory::{InMemoryLoader, LoaderBuilder};
pub use traits::{Loader, LoaderHandle, LoaderId, LookupError};
