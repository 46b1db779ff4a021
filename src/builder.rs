//! A fluent assembly shell for a ready-to-run root sandbox.
//!
//! This is intentionally plain: no configuration file format, no `serde` —
//! the core has no wire/file format by design. It exists to collect the
//! handful of construction-time choices (id, seed, logger, warm-up horizon)
//! at one call site instead of scattering `sandbox.set_logger(...)` calls
//! after the fact.

use std::sync::Arc;

use crate::error::SimError;
use crate::event::Timestamp;
use crate::logging::{LogFacadeLogger, Logger};
use crate::sandbox::Sandbox;

pub struct SandboxBuilder {
    id: String,
    seed: u64,
    logger: Option<Arc<dyn Logger>>,
    warm_up: Option<Timestamp>,
}

impl SandboxBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            seed: 0,
            logger: None,
            warm_up: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Installs [`LogFacadeLogger`], bridging to the `log` crate's global
    /// macros.
    pub fn with_log_bridge(self) -> Self {
        self.with_logger(Arc::new(LogFacadeLogger))
    }

    pub fn with_warm_up(mut self, duration: Timestamp) -> Self {
        self.warm_up = Some(duration);
        self
    }

    /// Builds the root sandbox, running its warm-up horizon if one was
    /// configured.
    pub fn build(self) -> Result<Sandbox, SimError> {
        let root = Sandbox::new_root(self.id, self.seed);
        root.set_logger(self.logger);
        if let Some(duration) = self.warm_up {
            root.warm_up(duration)?;
        }
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_applies_seed_and_warm_up() {
        let root = SandboxBuilder::new("root")
            .with_seed(42)
            .with_warm_up(3.0)
            .build()
            .unwrap();
        assert_eq!(root.seed(), 42);
        assert_eq!(root.clock_time(), 3.0);
    }

    #[test]
    fn default_builder_has_no_logger() {
        let root = SandboxBuilder::new("root").build().unwrap();
        assert!(root.logger().is_none());
    }
}
