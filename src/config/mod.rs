//! Configuration loading and management

pub mod options;
pub mod routes;

pub use options::{CreateOptions, EntityOptions, InitializeCallback, PrimaryCallbackPolicy, ResolvedOptions};
pub use routes::{RouteActionConfig, RouteEntry, RoutePatch, RouteSetting, RouteTable, RoutesConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File-backed subset of [`CreateOptions`]
///
/// ```yaml
/// environment: production
/// token_prefix: Bearer
/// api_prefix: /api
/// event_bus_capacity: 256
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub token_prefix: Option<String>,

    #[serde(default)]
    pub api_prefix: Option<String>,

    #[serde(default)]
    pub event_bus_capacity: Option<usize>,
}

impl AppSettings {
    /// Load settings from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        Ok(settings)
    }

    /// Overlay these settings onto `options`; unset fields keep the option's value
    pub fn apply_to(self, mut options: CreateOptions) -> CreateOptions {
        if self.environment.is_some() {
            options.environment = self.environment;
        }
        if self.token_prefix.is_some() {
            options.token_prefix = self.token_prefix;
        }
        if self.api_prefix.is_some() {
            options.api_prefix = self.api_prefix;
        }
        if self.event_bus_capacity.is_some() {
            options.event_bus_capacity = self.event_bus_capacity;
        }
        options
    }
}

impl From<AppSettings> for CreateOptions {
    fn from(settings: AppSettings) -> Self {
        settings.apply_to(CreateOptions::default())
    }
}
