//! [`AdapterRegistry`] – robot type id → adapter factory.
//!
//! The manager never names a concrete adapter.  It asks the registry for the
//! factory registered under the requested id and calls it with the endpoint
//! and that adapter's config table.  Listing order is registration order.

use std::sync::Arc;

use armbridge_types::{AdapterDescriptor, BridgeError};

use crate::adapter::RobotAdapter;
use crate::adapters::{abb, arduino, custom, dobot, kuka, universal};
use crate::config::AdapterConfig;

/// Builds a fresh, unconnected adapter for one endpoint.
pub type AdapterFactory =
    Arc<dyn Fn(&str, &AdapterConfig) -> Result<Box<dyn RobotAdapter>, BridgeError> + Send + Sync>;

struct Entry {
    descriptor: AdapterDescriptor,
    factory: AdapterFactory,
}

#[derive(Default)]
pub struct AdapterRegistry {
    entries: Vec<Entry>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in family.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(dobot::descriptor(), dobot::create);
        registry.register(universal::descriptor(), universal::create);
        registry.register(abb::descriptor(), abb::create);
        registry.register(kuka::descriptor(), kuka::create);
        registry.register(arduino::descriptor(), arduino::create);
        registry.register(custom::descriptor(), custom::create);
        registry
    }

    /// Register `factory` under `descriptor.id`.  A factory already
    /// registered under that id is replaced in place.
    pub fn register<F>(&mut self, descriptor: AdapterDescriptor, factory: F)
    where
        F: Fn(&str, &AdapterConfig) -> Result<Box<dyn RobotAdapter>, BridgeError>
            + Send
            + Sync
            + 'static,
    {
        let entry = Entry {
            descriptor,
            factory: Arc::new(factory),
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.id == entry.descriptor.id)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// # Errors
    ///
    /// [`BridgeError::UnknownRobotType`] listing every registered id.
    pub fn resolve(&self, id: &str) -> Result<AdapterFactory, BridgeError> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| Arc::clone(&e.factory))
            .ok_or_else(|| BridgeError::UnknownRobotType {
                requested: id.to_string(),
                available: self.ids().join(", "),
            })
    }

    pub fn list(&self) -> Vec<AdapterDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.descriptor.id.as_str())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.descriptor.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
