//! Route configuration: defaults table, padding and validation
//!
//! A client either accepts the defaults for every action or supplies a
//! partial [`RoutesConfig`]. The partial configuration is first padded
//! against [`RouteTable::defaults`], then validated into a [`RouteTable`].
//!
//! ```rust,ignore
//! builder
//!     .configure_entity("comments", EntityOptions::default())?
//!     .configure_routes(
//!         RoutesConfig::new()
//!             .action(Action::FindMany, RoutePatch::new().auth(AuthRequirement::Protected))
//!             .omit(Action::Save),
//!     )?;
//! ```

use crate::core::action::Action;
use crate::core::auth::AuthRequirement;
use crate::core::error::{BuilderError, BuilderResult};
use crate::core::handler::Middleware;
use crate::core::validation::{normalize_path, path_is_valid, string_has_value};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

/// Resolved configuration of one route action
#[derive(Debug, Clone, PartialEq)]
pub struct RouteActionConfig {
    pub path: String,
    /// User middlewares, run after the auth middlewares
    pub middlewares: Vec<Middleware>,
    pub auth: AuthRequirement,
}

impl RouteActionConfig {
    pub fn new(path: impl Into<String>, auth: AuthRequirement) -> Self {
        Self {
            path: path.into(),
            middlewares: vec![],
            auth,
        }
    }
}

/// An action's resolved entry: either configured or intentionally not generated
#[derive(Debug, Clone, PartialEq)]
pub enum RouteEntry {
    Omitted,
    Configured(RouteActionConfig),
}

impl RouteEntry {
    pub fn config(&self) -> Option<&RouteActionConfig> {
        match self {
            RouteEntry::Omitted => None,
            RouteEntry::Configured(config) => Some(config),
        }
    }

    pub fn is_omitted(&self) -> bool {
        matches!(self, RouteEntry::Omitted)
    }
}

/// Fully resolved routes of an entity, one entry per catalog action
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTable {
    entries: IndexMap<Action, RouteEntry>,
}

impl RouteTable {
    /// The route defaults table
    pub fn defaults() -> Self {
        let entries = Action::ALL
            .into_iter()
            .map(|action| (action, RouteEntry::Configured(default_action_config(action))))
            .collect();
        Self { entries }
    }

    pub fn get(&self, action: Action) -> Option<&RouteEntry> {
        self.entries.get(&action)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Action, &RouteEntry)> {
        self.entries.iter()
    }

    /// Configured (non-omitted) actions in catalog order
    pub fn configured(&self) -> impl Iterator<Item = (Action, &RouteActionConfig)> {
        self.entries
            .iter()
            .filter_map(|(action, entry)| entry.config().map(|config| (*action, config)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Default entry for one action
pub fn default_action_config(action: Action) -> RouteActionConfig {
    let path = if action.targets_single() { "/{id}" } else { "/" };
    let auth = if action.is_mutation() {
        AuthRequirement::AdminOnly
    } else {
        AuthRequirement::None
    };
    RouteActionConfig::new(path, auth)
}

/// Partial configuration of one action; `None` fields are padded from the defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutePatch {
    pub path: Option<String>,
    /// `Some(vec![])` is kept as an explicit empty chain
    pub middlewares: Option<Vec<Middleware>>,
    pub auth: Option<AuthRequirement>,
}

impl RoutePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn middlewares(mut self, middlewares: Vec<Middleware>) -> Self {
        self.middlewares = Some(middlewares);
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.get_or_insert_with(Vec::new).push(middleware);
        self
    }

    pub fn auth(mut self, auth: AuthRequirement) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Fill every missing field from `defaults`; an empty path counts as missing
    fn padded(&self, defaults: &RouteActionConfig) -> RoutePatch {
        let path = match &self.path {
            Some(path) if string_has_value(path) => path.clone(),
            _ => defaults.path.clone(),
        };
        RoutePatch {
            path: Some(path),
            middlewares: Some(
                self.middlewares
                    .clone()
                    .unwrap_or_else(|| defaults.middlewares.clone()),
            ),
            auth: Some(self.auth.unwrap_or(defaults.auth)),
        }
    }
}

/// Client-supplied value for one configuration key
#[derive(Debug, Clone, PartialEq)]
pub enum RouteSetting {
    /// Do not generate this route (the literal `false`)
    Omitted,
    Patch(RoutePatch),
}

/// Client-supplied route configuration, keyed by action key
///
/// Keys are kept as strings so that unknown keys can be reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutesConfig {
    settings: IndexMap<String, RouteSetting>,
}

impl RoutesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure one action
    pub fn action(mut self, action: Action, patch: RoutePatch) -> Self {
        self.settings
            .insert(action.key().to_string(), RouteSetting::Patch(patch));
        self
    }

    /// Do not generate the route for `action`
    pub fn omit(mut self, action: Action) -> Self {
        self.settings
            .insert(action.key().to_string(), RouteSetting::Omitted);
        self
    }

    /// Insert a raw key, which may lie outside the catalog
    pub fn raw(mut self, key: impl Into<String>, setting: RouteSetting) -> Self {
        self.settings.insert(key.into(), setting);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn get(&self, key: &str) -> Option<&RouteSetting> {
        self.settings.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RouteSetting)> {
        self.settings.iter()
    }

    /// Parse a JSON route configuration without middleware references
    pub fn from_value(value: &Value) -> BuilderResult<Self> {
        Self::from_value_with(value, &HashMap::new())
    }

    /// Parse a JSON route configuration
    ///
    /// Each key maps to `false` (omitted) or an object with optional `path`,
    /// `middlewares` (names resolved in `middlewares`) and `auth` fields.
    pub fn from_value_with(
        value: &Value,
        middlewares: &HashMap<String, Middleware>,
    ) -> BuilderResult<Self> {
        let object = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(object) => object,
            _ => {
                return Err(BuilderError::Validation(
                    "Route configuration must be a mapping of action keys".to_string(),
                ));
            }
        };

        let mut config = Self::new();
        for (key, raw) in object {
            let setting = match raw {
                Value::Bool(false) => RouteSetting::Omitted,
                Value::Object(fields) => {
                    RouteSetting::Patch(parse_patch(key, fields, middlewares)?)
                }
                _ => {
                    return Err(BuilderError::Validation(format!(
                        "Route configuration for action [{}] must be false or a mapping",
                        key
                    )));
                }
            };
            config.settings.insert(key.clone(), setting);
        }
        Ok(config)
    }

    /// Parse a YAML route configuration
    pub fn from_yaml_str(
        yaml: &str,
        middlewares: &HashMap<String, Middleware>,
    ) -> BuilderResult<Self> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| {
            BuilderError::Validation(format!("Route configuration is not valid YAML: {}", e))
        })?;
        Self::from_value_with(&value, middlewares)
    }
}

fn invalid_field(action: &str, field: &str) -> BuilderError {
    BuilderError::Validation(format!(
        "Route configuration for action [{}] has missing or invalid value for key [{}]",
        action, field
    ))
}

fn parse_patch(
    action: &str,
    fields: &serde_json::Map<String, Value>,
    registry: &HashMap<String, Middleware>,
) -> BuilderResult<RoutePatch> {
    let mut patch = RoutePatch::new();

    match fields.get("path") {
        None | Some(Value::Null) => {}
        Some(Value::String(path)) => patch.path = Some(path.clone()),
        Some(_) => return Err(invalid_field(action, "path")),
    }

    match fields.get("middlewares") {
        None | Some(Value::Null) => {}
        Some(Value::Array(names)) => {
            let mut resolved = Vec::with_capacity(names.len());
            for name in names {
                let middleware = name
                    .as_str()
                    .and_then(|name| registry.get(name))
                    .ok_or_else(|| invalid_field(action, "middlewares"))?;
                resolved.push(middleware.clone());
            }
            patch.middlewares = Some(resolved);
        }
        Some(_) => return Err(invalid_field(action, "middlewares")),
    }

    match fields.get("auth") {
        None | Some(Value::Null) => {}
        Some(raw) => {
            let auth = AuthRequirement::from_value(raw).ok_or_else(|| invalid_field(action, "auth"))?;
            patch.auth = Some(auth);
        }
    }

    let unknown: Vec<&str> = fields
        .keys()
        .map(String::as_str)
        .filter(|k| !matches!(*k, "path" | "middlewares" | "auth"))
        .collect();
    if !unknown.is_empty() {
        return Err(BuilderError::Validation(format!(
            "Route configuration for action [{}] has unknown key(s) [{}]",
            action,
            unknown.join(",")
        )));
    }

    Ok(patch)
}

/// Pad a partial configuration against the defaults table
///
/// Missing catalog actions get their default entry, present patches get their
/// missing fields filled, omitted entries and keys outside the catalog are
/// passed through untouched.
pub fn pad(config: &RoutesConfig) -> RoutesConfig {
    let mut padded = RoutesConfig::new();

    for (key, setting) in &config.settings {
        let setting = match (Action::parse_key(key), setting) {
            (Some(action), RouteSetting::Patch(patch)) => {
                RouteSetting::Patch(patch.padded(&default_action_config(action)))
            }
            _ => setting.clone(),
        };
        padded.settings.insert(key.clone(), setting);
    }

    for action in Action::ALL {
        if !padded.settings.contains_key(action.key()) {
            let defaults = default_action_config(action);
            padded.settings.insert(
                action.key().to_string(),
                RouteSetting::Patch(RoutePatch {
                    path: Some(defaults.path),
                    middlewares: Some(defaults.middlewares),
                    auth: Some(defaults.auth),
                }),
            );
        }
    }

    padded
}

/// Validate a padded configuration into a route table
///
/// Invalid keys are reported together; field problems fail on the first one.
pub fn validate(entity: &str, config: &RoutesConfig) -> BuilderResult<RouteTable> {
    let invalid: Vec<&str> = config
        .settings
        .iter()
        .filter(|(key, setting)| {
            Action::parse_key(key).is_none() && **setting != RouteSetting::Omitted
        })
        .map(|(key, _)| key.as_str())
        .collect();
    if !invalid.is_empty() {
        return Err(BuilderError::Validation(format!(
            "Provided route configuration key(s) [{}] are invalid.",
            invalid.join(",")
        )));
    }

    let field_error = |action: Action, field: &str| {
        BuilderError::Validation(format!(
            "Route configuration for entity [{}] and action [{}] has missing or invalid value for key [{}]",
            entity, action, field
        ))
    };

    let mut entries = IndexMap::new();
    for action in Action::ALL {
        let entry = match config.settings.get(action.key()) {
            None => return Err(field_error(action, "path")),
            Some(RouteSetting::Omitted) => RouteEntry::Omitted,
            Some(RouteSetting::Patch(patch)) => {
                let path = match patch.path.as_deref() {
                    Some(path) if path_is_valid(path) => normalize_path(path),
                    _ => return Err(field_error(action, "path")),
                };
                let middlewares = patch
                    .middlewares
                    .clone()
                    .ok_or_else(|| field_error(action, "middlewares"))?;
                let auth = patch.auth.ok_or_else(|| field_error(action, "auth"))?;
                RouteEntry::Configured(RouteActionConfig {
                    path,
                    middlewares,
                    auth,
                })
            }
        };
        entries.insert(action, entry);
    }

    Ok(RouteTable { entries })
}

/// Resolve an optional configuration: empty means the defaults table verbatim
pub fn resolve(entity: &str, config: Option<&RoutesConfig>) -> BuilderResult<RouteTable> {
    match config {
        None => Ok(RouteTable::defaults()),
        Some(config) if config.is_empty() => Ok(RouteTable::defaults()),
        Some(config) => validate(entity, &pad(config)),
    }
}
