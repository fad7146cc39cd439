//! Entity registry: the configuration record of every entity, in insertion order

use crate::config::routes::RouteTable;
use crate::core::action::HttpMethod;
use crate::core::auth::{CreateTokenCallback, IsAdminCallback};
use crate::core::data_access::{DataAccessModule, Dependent};
use crate::core::handler::{Handler, Middleware};
use indexmap::IndexMap;
use std::fmt;

/// A free-form route outside the action catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedRoute {
    pub method: HttpMethod,
    pub path: String,
    pub middlewares: Vec<Middleware>,
    pub handler: Handler,
}

/// One dependent declaration, as accepted by `add_dependents`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependentSpec {
    /// Entity name; `force_delete` defaults to false
    Name(String),
    Full(Dependent),
}

impl From<&str> for DependentSpec {
    fn from(name: &str) -> Self {
        DependentSpec::Name(name.to_string())
    }
}

impl From<String> for DependentSpec {
    fn from(name: String) -> Self {
        DependentSpec::Name(name)
    }
}

impl From<Dependent> for DependentSpec {
    fn from(dependent: Dependent) -> Self {
        DependentSpec::Full(dependent)
    }
}

impl DependentSpec {
    pub fn entity(&self) -> &str {
        match self {
            DependentSpec::Name(name) => name,
            DependentSpec::Full(dependent) => &dependent.entity,
        }
    }

    pub fn resolve(self) -> Dependent {
        match self {
            DependentSpec::Name(entity) => Dependent::new(entity, false),
            DependentSpec::Full(dependent) => dependent,
        }
    }
}

/// Configuration record of one entity
#[derive(Clone)]
pub struct EntityConfig {
    pub name: String,
    pub identifier_field: String,
    pub is_primary_entity: bool,
    pub is_admin_callback: Option<IsAdminCallback>,
    pub create_token_callback: Option<CreateTokenCallback>,
    pub data_access_module: Option<DataAccessModule>,
    pub dependents: Option<Vec<Dependent>>,
    /// `None` until routes are configured; the defaults table applies then
    pub routes: Option<RouteTable>,
    pub extended_routes: Vec<ExtendedRoute>,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier_field: "id".to_string(),
            is_primary_entity: false,
            is_admin_callback: None,
            create_token_callback: None,
            data_access_module: None,
            dependents: None,
            routes: None,
            extended_routes: vec![],
        }
    }

    /// Configured routes, or the defaults table
    pub fn resolved_routes(&self) -> RouteTable {
        self.routes.clone().unwrap_or_default()
    }

    pub fn dependents(&self) -> &[Dependent] {
        self.dependents.as_deref().unwrap_or(&[])
    }
}

impl fmt::Debug for EntityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityConfig")
            .field("name", &self.name)
            .field("identifier_field", &self.identifier_field)
            .field("is_primary_entity", &self.is_primary_entity)
            .field("is_admin_callback", &self.is_admin_callback.is_some())
            .field("create_token_callback", &self.create_token_callback.is_some())
            .field("data_access_module", &self.data_access_module)
            .field("dependents", &self.dependents)
            .field("routes", &self.routes)
            .field("extended_routes", &self.extended_routes)
            .finish()
    }
}

/// Registry for all configured entities
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: IndexMap<String, EntityConfig>,
}

impl EntityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entities: IndexMap::new(),
        }
    }

    /// Insert an entity; an existing entry with the same name is replaced
    pub fn insert(&mut self, config: EntityConfig) {
        self.entities.insert(config.name.clone(), config);
    }

    pub fn get(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut EntityConfig> {
        self.entities.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Entity names in registration order
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|s| s.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityConfig> {
        self.entities.values()
    }

    /// Entities flagged as primary
    pub fn primary_entities(&self) -> Vec<&EntityConfig> {
        self.iter().filter(|e| e.is_primary_entity).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_empty() {
        let registry = EntityRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.entity_names().is_empty());
    }

    #[test]
    fn test_registry_keeps_insertion_order() {
        let mut registry = EntityRegistry::new();
        registry.insert(EntityConfig::new("users"));
        registry.insert(EntityConfig::new("comments"));
        registry.insert(EntityConfig::new("articles"));
        assert_eq!(registry.entity_names(), vec!["users", "comments", "articles"]);
    }

    #[test]
    fn test_primary_entities() {
        let mut registry = EntityRegistry::new();
        let mut users = EntityConfig::new("users");
        users.is_primary_entity = true;
        registry.insert(users);
        registry.insert(EntityConfig::new("comments"));

        let primaries = registry.primary_entities();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].name, "users");
    }

    #[test]
    fn test_entity_config_defaults() {
        let config = EntityConfig::new("comments");
        assert_eq!(config.identifier_field, "id");
        assert!(config.routes.is_none());
        assert!(config.dependents().is_empty());
        assert_eq!(config.resolved_routes(), RouteTable::defaults());
    }

    #[test]
    fn test_dependent_spec_resolve() {
        assert_eq!(
            DependentSpec::from("comments").resolve(),
            Dependent::new("comments", false)
        );
        let full = DependentSpec::from(Dependent::new("posts", true));
        assert_eq!(full.entity(), "posts");
        assert!(full.resolve().force_delete);
    }
}
