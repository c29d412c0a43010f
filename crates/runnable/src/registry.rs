//! Runnable registry.

use std::collections::BTreeMap;

use crate::r#trait::{JobError, Result, Runnable};
use crate::system_cmd::SystemCmd;

/// Builds a fresh runnable instance.
pub type RunnableFactory = fn() -> Box<dyn Runnable>;

/// Maps job-type names to runnable constructors.
pub struct RunnableRegistry {
    factories: BTreeMap<&'static str, RunnableFactory>,
}

impl RunnableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Create a registry holding the built-in runnables.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(SystemCmd::NAME, || Box::new(SystemCmd));
        registry
    }

    /// Register a runnable. Returns the factory it replaced, if any.
    pub fn register(&mut self, name: &'static str, factory: RunnableFactory) -> Option<RunnableFactory> {
        self.factories.insert(name, factory)
    }

    /// Instantiate the runnable registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Runnable>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| JobError::UnknownRunnable(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for RunnableRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
