//! Non-public context tracking for proxy resolution.

use crate::descriptor::TypeDescriptor;
use crate::error::{ResolveError, ResolveResult};
use crate::loader::LoaderId;

/// Records the defining context of the first non-public interface of a proxy
/// request and rejects any later non-public interface from another context.
///
/// Public interfaces are ignored. The first non-public interface wins by
/// position; contexts are never merged or ranked.
#[derive(Debug, Default)]
pub struct NonPublicContext {
    first: Option<TypeDescriptor>,
}

impl NonPublicContext {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next interface, in request order.
    ///
    /// # Errors
    /// `ConflictingLoaders` when `iface` is non-public and defined by a
    /// different loader than the first non-public interface seen.
    pub fn observe(&mut self, iface: &TypeDescriptor) -> ResolveResult<()> {
        if iface.is_public() {
            return Ok(());
        }
        match &self.first {
            None => {
                self.first = Some(iface.clone());
                Ok(())
            }
            Some(first) if first.loader_id() == iface.loader_id() => Ok(()),
            Some(first) => Err(ResolveError::ConflictingLoaders {
                interface: iface.name().to_string(),
                first: first.loader_id(),
                conflicting: iface.loader_id(),
            }),
        }
    }

    /// The first non-public interface seen, if any.
    #[must_use]
    pub fn first(&self) -> Option<&TypeDescriptor> {
        self.first.as_ref()
    }

    /// The required context, if any non-public interface was seen.
    #[must_use]
    pub fn loader_id(&self) -> Option<LoaderId> {
        self.first.as_ref().map(TypeDescriptor::loader_id)
    }
}
