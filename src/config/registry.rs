// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::backends::local::LocalStageFactory;
use crate::config::StageConfig;
use crate::traits::Stage;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a fresh, uninitialized stage instance for a stage configuration.
///
/// Called once per stage, or once per source for source context dependent stages,
/// so it must be repeatable.
pub type StageFactory = Arc<dyn Fn(&StageConfig) -> Result<Box<dyn Stage>, String> + Send + Sync>;

/// Lookup table from stage `kind` to factory, resolved once when the engine is built.
///
/// # Example
/// ```rust
/// use frameflow::config::StageRegistry;
///
/// let registry = StageRegistry::with_builtins();
/// assert!(registry.contains("passthrough"));
/// assert!(registry.contains("box_filter"));
/// ```
#[derive(Clone, Default)]
pub struct StageRegistry {
    factories: HashMap<String, StageFactory>,
}

impl StageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in local stage.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in LocalStageFactory::list_available_implementations() {
            registry.register(kind, move |cfg: &StageConfig| {
                LocalStageFactory::create_stage(kind, cfg)
            });
        }
        registry
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&StageConfig) -> Result<Box<dyn Stage>, String> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Create an instance for `config`, `None` when its kind is not registered.
    pub fn create(&self, config: &StageConfig) -> Option<Result<Box<dyn Stage>, String>> {
        self.factories.get(&config.kind).map(|factory| factory(config))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
