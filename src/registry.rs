//! Lookup of filter kinds by protocol name.

use crate::filter::Filter;
use crate::filters::{ScaleFilter, TouchstoneImportFilter};
use anyhow::Context;
use std::collections::BTreeMap;
use toml::Table;

type FilterFactory = Box<dyn Fn() -> Box<dyn Filter> + Send + Sync>;

/// Creates filters by protocol name and applies their initial parameters.
pub struct FilterRegistry {
    factories: BTreeMap<String, FilterFactory>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterRegistry {
    /// Registry with every built-in filter kind.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register("Touchstone Import", || Box::new(TouchstoneImportFilter::new()));
        registry.register("Scale", || Box::new(ScaleFilter::new()));
        registry
    }

    /// Add or replace a filter kind.
    pub fn register<F>(&mut self, protocol: &str, factory: F)
    where
        F: Fn() -> Box<dyn Filter> + Send + Sync + 'static,
    {
        self.factories.insert(protocol.to_string(), Box::new(factory));
    }

    /// Registered protocol names, sorted.
    pub fn protocols(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate `protocol`, load `parameters` into it and derive its
    /// default name.
    pub fn create(&self, protocol: &str, parameters: &Table) -> anyhow::Result<Box<dyn Filter>> {
        let factory = self
            .factories
            .get(protocol)
            .ok_or_else(|| anyhow::anyhow!("Filter '{}' not found", protocol))?;

        let mut filter = factory();
        filter
            .load_parameters(parameters)
            .with_context(|| format!("Invalid parameters for '{protocol}'"))?;
        filter.set_default_name();
        Ok(filter)
    }
}
