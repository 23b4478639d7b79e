//! Graph configuration using Figment
//!
//! A graph is described by a TOML file listing its filters in evaluation
//! order. Values are loaded from:
//! 1. the TOML file (base configuration)
//! 2. environment variables prefixed with `SIGNAL_GRAPH_`
//!
//! # Example
//! ```toml
//! [application]
//! name = "Cable characterisation"
//! log_level = "info"
//!
//! [[filters]]
//! id = "cable"
//! type = "Touchstone Import"
//! parameters = { "Touchstone File" = "cable.s2p", "Source Port" = 1, "Dest Port" = 2 }
//!
//! [[filters]]
//! id = "attenuated"
//! type = "Scale"
//! input = { filter = "cable", stream = 0 }
//! parameters = { "Scale" = 0.5 }
//! ```

use crate::error::FilterResult;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Top-level graph configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Filters in evaluation order
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// One filter of the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Unique identifier, referenced by downstream inputs
    pub id: String,
    /// Protocol name as registered in the filter registry
    pub r#type: String,
    /// Whether this filter is built
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Upstream stream bound to input 0
    #[serde(default)]
    pub input: Option<InputBinding>,
    /// Initial parameter values, keyed by parameter name
    #[serde(default)]
    pub parameters: toml::Table,
}

/// Reference to a stream of an earlier filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    /// Id of the producing filter
    pub filter: String,
    /// Stream index within the producer
    #[serde(default)]
    pub stream: usize,
}

fn default_name() -> String {
    "signal-graph".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enabled() -> bool {
    true
}

impl GraphConfig {
    /// Load configuration from `path` and environment variables
    ///
    /// Environment variables override file values, e.g.
    /// `SIGNAL_GRAPH_APPLICATION__LOG_LEVEL=debug`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> FilterResult<Self> {
        Ok(Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SIGNAL_GRAPH_").split("__"))
            .extract()?)
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(text: &str) -> FilterResult<Self> {
        Ok(Figment::new().merge(Toml::string(text)).extract()?)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        crate::logging::parse_log_level(&self.application.log_level)?;

        let mut ids: HashSet<&str> = HashSet::new();
        let mut enabled: HashSet<&str> = HashSet::new();
        for filter in &self.filters {
            // disabled filters are never built, so only their IDs matter
            if let Some(input) = filter.input.as_ref().filter(|_| filter.enabled) {
                let upstream = input.filter.as_str();
                if !enabled.contains(upstream) {
                    let reason = if ids.contains(upstream) {
                        "is disabled"
                    } else {
                        "is not defined before it"
                    };
                    return Err(format!(
                        "Filter '{}' reads from '{upstream}', which {reason}",
                        filter.id
                    ));
                }
            }
            if !ids.insert(filter.id.as_str()) {
                return Err(format!("Duplicate filter ID: {}", filter.id));
            }
            if filter.enabled {
                enabled.insert(filter.id.as_str());
            }
        }

        Ok(())
    }

    /// Get all enabled filters, in evaluation order
    pub fn enabled_filters(&self) -> Vec<&FilterDefinition> {
        self.filters.iter().filter(|f| f.enabled).collect()
    }
}
