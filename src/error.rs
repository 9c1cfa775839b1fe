//! Error types for loaderstream.
//!
//! Resolution presents a uniform error surface to the host engine: a type
//! either could not be produced (`TypeNotFound`), the proxy interfaces span
//! two non-public contexts (`ConflictingLoaders`), or the underlying stream
//! failed (`Io`, passed through unchanged).

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::loader::{LoaderId, LookupError};

/// Boxed underlying cause attached to a `TypeNotFound`.
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Errors returned by the resolution hooks.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The loader, or the proxy facility, could not produce a type.
    #[error("Type not found: {}", .names.join(", "))]
    TypeNotFound {
        /// The name(s) that were being resolved.
        names: Vec<String>,
        /// Underlying cause, where available.
        #[source]
        source: Option<BoxedCause>,
    },

    /// Two non-public proxy interfaces were defined by different loaders.
    #[error(
        "Conflicting non-public interface loaders: '{interface}' is defined by {conflicting}, expected {first}"
    )]
    ConflictingLoaders {
        /// The interface whose loader disagreed with the first one recorded.
        interface: String,
        /// Loader of the first non-public interface in the request.
        first: LoaderId,
        /// Loader of `interface`.
        conflicting: LoaderId,
    },

    /// Stream or loader I/O failure, not interpreted.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ResolveError {
    /// Creates a `TypeNotFound` for `names` wrapping `cause`.
    #[must_use]
    pub fn not_found_caused_by<E>(names: Vec<String>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::TypeNotFound {
            names,
            source: Some(Box::new(cause)),
        }
    }

    /// Converts a loader failure for `name` into a resolution failure.
    ///
    /// I/O failures pass through untouched; everything else becomes
    /// `TypeNotFound` with the lookup error as its cause.
    #[must_use]
    pub fn from_lookup(name: &str, err: LookupError) -> Self {
        match err {
            LookupError::Io { source, .. } => Self::Io(source),
            other => Self::not_found_caused_by(vec![name.to_string()], other),
        }
    }

    /// Returns true if this is a `TypeNotFound`.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::TypeNotFound { .. })
    }

    /// Returns true if this is a `ConflictingLoaders`.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConflictingLoaders { .. })
    }

    /// Returns true if this is a pass-through I/O error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true if this error is retryable.
    ///
    /// Resolution failures are structural; nothing here is ever retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }

    /// Names attached to a `TypeNotFound`, empty otherwise.
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::TypeNotFound { names, .. } => names,
            _ => &[],
        }
    }
}

/// Result type alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_lists_names() {
        let err = ResolveError::TypeNotFound {
            names: vec!["a.A".to_string(), "b.B".to_string()],
            source: None,
        };
        let msg = format!("{err}");
        assert!(msg.contains("Type not found"));
        assert!(msg.contains("a.A, b.B"));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_found_keeps_cause() {
        let cause = io::Error::new(io::ErrorKind::Other, "boom");
        let err = ResolveError::not_found_caused_by(vec!["x.X".to_string()], cause);
        let source = err.source().expect("cause should be attached");
        assert!(source.to_string().contains("boom"));
    }

    #[test]
    fn test_conflict_message() {
        let first = LoaderId::new();
        let conflicting = LoaderId::new();
        let err = ResolveError::ConflictingLoaders {
            interface: "p.D".to_string(),
            first,
            conflicting,
        };
        let msg = format!("{err}");
        assert!(msg.contains("p.D"));
        assert!(msg.contains(&first.to_string()));
        assert!(msg.contains(&conflicting.to_string()));
        assert!(err.is_conflict());
        assert!(err.names().is_empty());
    }

    #[test]
    fn test_lookup_io_passes_through() {
        let lookup = LookupError::Io {
            name: "a.A".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let err = ResolveError::from_lookup("a.A", lookup);
        let ResolveError::Io(inner) = err else {
            panic!("expected io error");
        };
        assert_eq!(inner.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_lookup_not_found_becomes_type_not_found() {
        let err = ResolveError::from_lookup(
            "a.Missing",
            LookupError::NotFound {
                name: "a.Missing".to_string(),
            },
        );
        assert!(err.is_not_found());
        assert_eq!(err.names(), ["a.Missing".to_string()]);
        assert!(err.source().is_some());
    }
}
