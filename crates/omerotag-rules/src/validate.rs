//! Static path checks against the capability registry, run before any graph access.

use omerotag_core::inflect::plural;
use omerotag_core::{CapabilityRegistry, Error, Result};

pub struct PathValidator<'a> {
    registry: &'a CapabilityRegistry,
}

impl<'a> PathValidator<'a> {
    pub fn new(registry: &'a CapabilityRegistry) -> Self {
        Self { registry }
    }

    /// Walk adjacent segment pairs and confirm each step is readable from the type before it.
    ///
    /// A segment with no registered type cannot be checked; that only earns a warning
    /// because extensions may add types the registry has never heard of.
    pub fn validate(&self, path: &[String]) -> Result<()> {
        for pair in path.windows(2) {
            let (segment, next) = (&pair[0], &pair[1]);
            let Some(kind) = self.registry.known_type(segment) else {
                tracing::warn!(
                    "Could not validate path {}: no known type for {:?}, continuing but errors may occur",
                    path.join("."),
                    segment
                );
                return Ok(());
            };
            let reachable = self.registry.resolve_type(&kind, next).is_some()
                || self.registry.resolve_type(&kind, &plural(next)).is_some();
            if !reachable {
                return Err(Error::path_validation(
                    path,
                    format!("no accessor for {:?} on {}", next, kind),
                ));
            }
        }
        Ok(())
    }
}
