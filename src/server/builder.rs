//! EndpointsBuilder: chainable entity configuration and application assembly

use super::entity_registry::{DependentSpec, EntityConfig, EntityRegistry, ExtendedRoute};
use super::handlers::ActionContext;
use super::host::{AppHandle, Mount};
use super::plan::{EntityPlan, compile_entity};
use super::router::build_entity_router;
use crate::config::options::{CreateOptions, EntityOptions, PrimaryCallbackPolicy};
use crate::config::routes::{self, RoutesConfig};
use crate::core::action::{Action, HttpMethod};
use crate::core::auth::{AuthGuard, AuthProvider, BearerTokenAuth};
use crate::core::data_access::{
    DataAccessModule, DatabaseInterface, Dependent, MethodBinding, interface_from_value,
    resolve_interface,
};
use crate::core::error::{BuilderError, BuilderResult};
use crate::core::events::{AppEvent, EventBus};
use crate::core::handler::{Handler, Middleware};
use crate::core::validation::{
    bool_has_value, entity_name_is_valid, mapping_has_value, normalize_path,
    option_string_has_value, path_is_valid, string_has_value,
};
use crate::storage::InMemoryDataAccess;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Chainable builder for entity configurations
///
/// One builder per application. Every operation returns
/// `BuilderResult<&mut Self>`, so configuration reads as a chain:
///
/// ```ignore
/// let mut builder = EndpointsBuilder::new();
/// builder
///     .configure_entity("comments", EntityOptions::default())?
///     .configure_routes(RoutesConfig::new().omit(Action::Save))?
///     .done()?;
/// builder
///     .configure_entity("users", EntityOptions::primary().is_admin(|p| p.claims["admin"] == true))?
///     .add_dependents(["comments"])?
///     .done()?;
///
/// let mut app = AxumApp::new();
/// let events = builder.create(&mut app, Some("secret"), options).await?;
/// app.listen("127.0.0.1:3000").await?;
/// ```
///
/// A failed operation leaves the builder unchanged.
pub struct EndpointsBuilder {
    using_custom_database: bool,
    using_custom_auth: bool,
    auth_provider: Option<Arc<dyn AuthProvider>>,
    adapted_interface: DatabaseInterface,
    registry: EntityRegistry,
    currently_configuring: Option<String>,
    primary_policy: PrimaryCallbackPolicy,
}

impl EndpointsBuilder {
    /// Create a new EndpointsBuilder
    pub fn new() -> Self {
        Self {
            using_custom_database: false,
            using_custom_auth: false,
            auth_provider: None,
            adapted_interface: DatabaseInterface::new(),
            registry: EntityRegistry::new(),
            currently_configuring: None,
            primary_policy: PrimaryCallbackPolicy::default(),
        }
    }

    /// Choose which callbacks the primary entity must carry
    pub fn with_primary_callback_policy(&mut self, policy: PrimaryCallbackPolicy) -> &mut Self {
        self.primary_policy = policy;
        self
    }

    /// Declare that entities use a client database
    ///
    /// Must be called before any entity is configured.
    pub fn use_custom_database(&mut self) -> BuilderResult<&mut Self> {
        if !self.registry.is_empty() {
            return Err(BuilderError::Sequence(
                "Builder method [use_custom_database] must be called before any entity is configured."
                    .to_string(),
            ));
        }
        self.using_custom_database = true;
        tracing::debug!("custom database declared");
        Ok(self)
    }

    /// Replace the default bearer-token authentication
    pub fn use_custom_auth(&mut self, provider: Arc<dyn AuthProvider>) -> BuilderResult<&mut Self> {
        self.using_custom_auth = true;
        self.auth_provider = Some(provider);
        tracing::debug!("custom auth provider declared");
        Ok(self)
    }

    /// Map every action onto the client database's method names
    ///
    /// Every action must be bound to a method name or to
    /// [`MethodBinding::Unsupported`]; all offending actions are reported in
    /// one error. A successful call replaces the previously adapted map.
    pub fn adapt_interface(
        &mut self,
        map: IndexMap<Action, MethodBinding>,
    ) -> BuilderResult<&mut Self> {
        self.ensure_custom_database()?;
        if map.is_empty() {
            return Err(BuilderError::Validation(
                "A non-empty interface map is required by builder method [adapt_interface]."
                    .to_string(),
            ));
        }
        self.store_interface(&map)
    }

    /// JSON form of [`adapt_interface`](Self::adapt_interface): action keys to a method name or `false`
    pub fn adapt_interface_value(&mut self, value: &Value) -> BuilderResult<&mut Self> {
        self.ensure_custom_database()?;
        if !mapping_has_value(value) {
            return Err(BuilderError::Validation(
                "A non-empty interface map is required by builder method [adapt_interface]."
                    .to_string(),
            ));
        }
        self.store_interface(&interface_from_value(value))
    }

    fn ensure_custom_database(&self) -> BuilderResult<()> {
        if !self.using_custom_database {
            return Err(BuilderError::Sequence(
                "Builder method [adapt_interface] requires [use_custom_database] to be called first."
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn store_interface(
        &mut self,
        map: &IndexMap<Action, MethodBinding>,
    ) -> BuilderResult<&mut Self> {
        let resolved = resolve_interface(map).map_err(|missing| {
            let keys: Vec<&str> = missing.iter().map(|a| a.key()).collect();
            BuilderError::Validation(format!(
                "Database interface adaptation failed. Adaptation for action(s) [{}] are either missing or have an invalid value.",
                keys.join(",")
            ))
        })?;
        self.adapted_interface = resolved;
        tracing::debug!(actions = self.adapted_interface.len(), "database interface adapted");
        Ok(self)
    }

    /// Whether a complete interface map is stored
    pub fn is_interface_adapted(&self) -> bool {
        !self.adapted_interface.is_empty() && self.adapted_interface.len() == Action::ALL.len()
    }

    /// Start configuring a new entity
    ///
    /// The entity becomes the target of the chained calls that follow.
    pub fn configure_entity(
        &mut self,
        name: &str,
        options: EntityOptions,
    ) -> BuilderResult<&mut Self> {
        if !string_has_value(name) {
            return Err(BuilderError::Validation(
                "Argument parameter [entity] is required for builder method [configure_entity]."
                    .to_string(),
            ));
        }
        if !entity_name_is_valid(name) {
            return Err(BuilderError::Validation(format!(
                "Entity name [{}] must not contain '/', braces or whitespace.",
                name
            )));
        }
        if self.using_custom_database && !self.is_interface_adapted() {
            return Err(BuilderError::Sequence(
                "Using a custom database requires adapting its interface with [adapt_interface] before configuring entities."
                    .to_string(),
            ));
        }
        if self.currently_configuring.as_deref() == Some(name) || self.registry.contains(name) {
            return Err(BuilderError::Duplicate(format!(
                "Each entity can only be configured once. Entity [{}] is already configured.",
                name
            )));
        }
        if options.is_primary_entity {
            let missing = self.primary_policy.missing_callbacks(&options);
            if !missing.is_empty() {
                return Err(BuilderError::Validation(format!(
                    "Primary entity [{}] requires callback(s) [{}].",
                    name,
                    missing.join(",")
                )));
            }
        }

        let mut config = EntityConfig::new(name);
        if string_has_value(&options.identifier_field) {
            config.identifier_field = options.identifier_field;
        }
        config.is_primary_entity = options.is_primary_entity;
        config.is_admin_callback = options.is_admin_callback;
        config.create_token_callback = options.create_token_callback;

        tracing::debug!(
            entity = %name,
            identifier_field = %config.identifier_field,
            primary = config.is_primary_entity,
            "entity configured"
        );
        self.registry.insert(config);
        self.currently_configuring = Some(name.to_string());
        Ok(self)
    }

    /// Close the current entity's chain
    pub fn done(&mut self) -> BuilderResult<&mut Self> {
        if self.currently_configuring.take().is_none() {
            return Err(BuilderError::Sequence(
                "Builder method [done] must be called after [configure_entity].".to_string(),
            ));
        }
        Ok(self)
    }

    fn current_name(&self, method: &str) -> BuilderResult<&str> {
        self.currently_configuring.as_deref().ok_or_else(|| {
            BuilderError::Sequence(format!(
                "Chained builder method [{}] requires calling [configure_entity] first.",
                method
            ))
        })
    }

    fn current_entity_mut(&mut self, method: &str) -> BuilderResult<&mut EntityConfig> {
        let name = self.currently_configuring.as_deref().ok_or_else(|| {
            BuilderError::Sequence(format!(
                "Chained builder method [{}] requires calling [configure_entity] first.",
                method
            ))
        })?;
        self.registry
            .get_mut(name)
            .ok_or_else(|| BuilderError::State(format!("Entity [{}] is not registered.", name)))
    }

    /// Attach the current entity's data access
    ///
    /// `None` keeps the in-memory default, which a custom database forbids.
    pub fn add_data_access_module(
        &mut self,
        module: impl Into<Option<DataAccessModule>>,
    ) -> BuilderResult<&mut Self> {
        let module = module.into();
        let using_custom_database = self.using_custom_database;
        let entity = self.current_entity_mut("add_data_access_module")?;

        if using_custom_database && module.is_none() {
            return Err(BuilderError::Validation(format!(
                "Using a custom database requires a data access module for entity [{}].",
                entity.name
            )));
        }
        if entity.data_access_module.is_some() {
            return Err(BuilderError::Duplicate(format!(
                "Entity [{}] can only be configured with a data access module once.",
                entity.name
            )));
        }

        tracing::debug!(entity = %entity.name, module = ?module, "data access module added");
        entity.data_access_module = module;
        Ok(self)
    }

    /// Declare the current entity's dependents, replacing earlier ones
    ///
    /// Every dependent must name an entity that is already configured.
    pub fn add_dependents<I, D>(&mut self, dependents: I) -> BuilderResult<&mut Self>
    where
        I: IntoIterator<Item = D>,
        D: Into<DependentSpec>,
    {
        self.current_name("add_dependents")?;

        let mut resolved: Vec<Dependent> = vec![];
        for dependent in dependents {
            let dependent: DependentSpec = dependent.into();
            if !self.registry.contains(dependent.entity()) {
                return Err(BuilderError::Validation(format!(
                    "Invalid or unknown entity dependent [{}] provided to builder method [add_dependents].",
                    dependent.entity()
                )));
            }
            resolved.push(dependent.resolve());
        }

        let entity = self.current_entity_mut("add_dependents")?;
        tracing::debug!(entity = %entity.name, dependents = resolved.len(), "dependents added");
        entity.dependents = Some(resolved);
        Ok(self)
    }

    /// JSON form of [`add_dependents`](Self::add_dependents)
    ///
    /// Items are entity names or objects carrying both `entity` and `forceDelete`.
    pub fn add_dependents_value(&mut self, value: &Value) -> BuilderResult<&mut Self> {
        self.current_name("add_dependents")?;

        let Some(items) = value.as_array() else {
            return Err(BuilderError::Validation(
                "Invalid data type provided as dependents array for builder method [add_dependents]."
                    .to_string(),
            ));
        };

        let mut specs = Vec::with_capacity(items.len());
        for item in items {
            let dependent = match item {
                Value::String(name) => DependentSpec::Name(name.clone()),
                Value::Object(fields) => {
                    match (
                        fields.get("entity").and_then(Value::as_str),
                        fields.get("forceDelete"),
                    ) {
                        (Some(entity), Some(force_delete)) if bool_has_value(force_delete) => {
                            DependentSpec::Full(Dependent::new(
                                entity,
                                force_delete.as_bool().unwrap_or_default(),
                            ))
                        }
                        _ => {
                            return Err(BuilderError::Validation(
                                "Invalid dependent object structure(s) found in dependents array for builder method [add_dependents]."
                                    .to_string(),
                            ));
                        }
                    }
                }
                _ => {
                    return Err(BuilderError::Validation(
                        "Invalid data type provided as dependents array for builder method [add_dependents]."
                            .to_string(),
                    ));
                }
            };
            specs.push(dependent);
        }

        self.add_dependents(specs)
    }

    /// Configure the current entity's routes
    ///
    /// An empty configuration selects the defaults table; otherwise the
    /// configuration is padded against the defaults and validated.
    pub fn configure_routes(&mut self, config: RoutesConfig) -> BuilderResult<&mut Self> {
        let name = self.current_name("configure_routes")?;
        let table = routes::resolve(name, Some(&config))?;

        let entity = self.current_entity_mut("configure_routes")?;
        tracing::debug!(
            entity = %entity.name,
            configured = table.configured().count(),
            "routes configured"
        );
        entity.routes = Some(table);
        Ok(self)
    }

    /// Add a free-form route to the current entity
    ///
    /// `method` is one of get, post, put or delete (any case).
    pub fn extend_routes_with(
        &mut self,
        method: &str,
        path: &str,
        middlewares: Vec<Middleware>,
        handler: Handler,
    ) -> BuilderResult<&mut Self> {
        self.current_name("extend_routes_with")?;

        let method = HttpMethod::parse_method(method).ok_or_else(|| {
            BuilderError::Validation(
                "Invalid value provided for argument [method] of builder method [extend_routes_with]."
                    .to_string(),
            )
        })?;
        if !path_is_valid(path) {
            return Err(BuilderError::Validation(
                "Invalid value provided for argument [path] of builder method [extend_routes_with]."
                    .to_string(),
            ));
        }

        let entity = self.current_entity_mut("extend_routes_with")?;
        tracing::debug!(entity = %entity.name, method = %method, path = %path, "route extended");
        entity.extended_routes.push(ExtendedRoute {
            method,
            path: normalize_path(path),
            middlewares,
            handler,
        });
        Ok(self)
    }

    /// Entity currently being configured
    pub fn currently_configuring(&self) -> Option<&str> {
        self.currently_configuring.as_deref()
    }

    /// The adapted database interface; empty until adapted
    pub fn db_interface(&self) -> &DatabaseInterface {
        &self.adapted_interface
    }

    pub fn entity_configurations(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn entity_config(&self, name: &str) -> Option<&EntityConfig> {
        self.registry.get(name)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.registry.entity_names()
    }

    /// The entity flagged as primary, when exactly one is
    pub fn primary_entity(&self) -> Option<&EntityConfig> {
        match self.registry.primary_entities().as_slice() {
            [primary] => Some(*primary),
            _ => None,
        }
    }

    pub fn is_using_custom_database(&self) -> bool {
        self.using_custom_database
    }

    pub fn is_using_custom_auth(&self) -> bool {
        self.using_custom_auth
    }

    /// Issue a token through the primary entity's token callback
    pub fn issue_token(&self, claims: &Value) -> anyhow::Result<String> {
        let primary = self.primary_entity().ok_or_else(|| {
            BuilderError::State("No single primary entity is configured.".to_string())
        })?;
        let create_token = primary.create_token_callback.as_ref().ok_or_else(|| {
            BuilderError::State(format!(
                "Primary entity [{}] has no token callback.",
                primary.name
            ))
        })?;
        create_token(claims)
    }

    /// Restore the freshly constructed state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Drop every entity configuration, keeping database and auth declarations
    pub fn reset_entity_configurations(&mut self) {
        self.registry.clear();
        self.currently_configuring = None;
    }

    /// Validate the configuration and mount it on `app`
    ///
    /// Runs the initialize hook before any entity route is mounted and
    /// returns the event bus the generated handlers publish to.
    pub async fn create<A: AppHandle>(
        &mut self,
        app: &mut A,
        jwt_secret: Option<&str>,
        options: CreateOptions,
    ) -> BuilderResult<EventBus> {
        self.currently_configuring = None;

        if self.registry.is_empty() {
            return Err(BuilderError::State(
                "Entities must be configured with [configure_entity] before calling [create]."
                    .to_string(),
            ));
        }

        let options = options.resolve();

        let provider: Arc<dyn AuthProvider> = match (&self.auth_provider, self.using_custom_auth) {
            (Some(provider), true) => provider.clone(),
            _ => {
                if !option_string_has_value(jwt_secret) {
                    return Err(BuilderError::Config(
                        "A JWT secret is required by [create] unless custom auth is used."
                            .to_string(),
                    ));
                }
                let secret = jwt_secret.unwrap_or_default();
                let verifier = options.token_verifier.clone().ok_or_else(|| {
                    BuilderError::Config(
                        "A token verifier is required by [create] unless custom auth is used."
                            .to_string(),
                    )
                })?;
                Arc::new(BearerTokenAuth::new(
                    secret,
                    options.token_prefix.clone(),
                    verifier,
                ))
            }
        };

        let primary = self.validate_primary_entity()?;
        if self.using_custom_database {
            self.validate_data_access_modules()?;
        }

        let guard = AuthGuard::new(
            provider,
            primary.name.clone(),
            primary.is_admin_callback.clone(),
        );
        let interface = self
            .using_custom_database
            .then(|| self.adapted_interface.clone());

        let plans = self
            .registry
            .iter()
            .map(|entity| compile_entity(entity, &guard, &options.api_prefix, interface.as_ref()))
            .collect::<BuilderResult<Vec<EntityPlan>>>()?;

        let events = EventBus::new(options.event_bus_capacity);

        if options.is_dev() {
            app.use_mount(Mount::RequestLogging);
        }

        if let Some(initialize) = &options.initialize_callback {
            initialize(options.environment.clone(), events.clone())
                .await
                .map_err(BuilderError::Initialize)?;
        }
        events.publish(AppEvent::Initialized {
            environment: options.environment.clone(),
        });

        for plan in plans {
            if plan.is_empty() {
                tracing::warn!(entity = %plan.name, "entity has no routes, nothing mounted");
                continue;
            }
            let Some(entity) = self.registry.get(&plan.name) else {
                continue;
            };

            let module = entity
                .data_access_module
                .clone()
                .unwrap_or_else(|| DataAccessModule::object(InMemoryDataAccess::new()));
            let ctx = ActionContext::new(
                entity.name.clone(),
                entity.identifier_field.clone(),
                module,
                interface.clone(),
                entity.dependents().to_vec(),
                events.clone(),
            );

            let router = build_entity_router(&plan, &ctx);
            let routes = plan.route_infos();
            tracing::debug!(entity = %plan.name, prefix = %plan.prefix, routes = routes.len(), "entity mounted");
            events.publish(AppEvent::EntityMounted {
                entity: plan.name.clone(),
                routes: routes.len(),
            });
            app.use_mount(Mount::Entity {
                name: plan.name,
                prefix: plan.prefix,
                router,
                routes,
            });
        }

        app.use_mount(Mount::NotFound(options.not_found_handler.clone()));
        app.use_mount(Mount::ErrorHandler(options.error_handler.clone()));

        tracing::info!(
            entities = self.registry.len(),
            environment = %options.environment,
            "application assembled"
        );
        Ok(events)
    }

    fn validate_primary_entity(&self) -> BuilderResult<&EntityConfig> {
        let primaries = self.registry.primary_entities();
        match primaries.as_slice() {
            [primary] => Ok(*primary),
            [] => Err(BuilderError::Validation(
                "No primary entity was found. Exactly one primary entity is required.".to_string(),
            )),
            many => {
                let names: Vec<&str> = many.iter().map(|e| e.name.as_str()).collect();
                Err(BuilderError::Validation(format!(
                    "{} primary entities were found [{}]. Exactly one primary entity is required.",
                    many.len(),
                    names.join(",")
                )))
            }
        }
    }

    fn validate_data_access_modules(&self) -> BuilderResult<()> {
        let missing: Vec<&str> = self
            .registry
            .iter()
            .filter(|e| e.data_access_module.is_none())
            .map(|e| e.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(BuilderError::Validation(format!(
                "Using a custom database requires a data access module for every entity. Missing for entities [{}]",
                missing.join(",")
            )));
        }

        for entity in self.registry.iter() {
            let Some(DataAccessModule::Object(object)) = &entity.data_access_module else {
                continue;
            };
            let absent: Vec<&str> = self
                .adapted_interface
                .values()
                .filter_map(MethodBinding::method_name)
                .filter(|method| !object.has_method(method))
                .collect();
            if !absent.is_empty() {
                return Err(BuilderError::Contract(format!(
                    "Data access module of entity [{}] does not expose method(s) [{}] named in the adapted interface.",
                    entity.name,
                    absent.join(",")
                )));
            }
        }
        Ok(())
    }
}

impl Default for EndpointsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::routes::RoutePatch;
    use crate::core::auth::AuthRequirement;
    use crate::core::data_access::DataRequest;
    use serde_json::json;

    fn full_interface() -> IndexMap<Action, MethodBinding> {
        IndexMap::from([
            (Action::FindMany, "find".into()),
            (Action::FindById, "findById".into()),
            (Action::CreateOne, "createNewFor".into()),
            (Action::UpdateOne, "updateFor".into()),
            (Action::DeleteOne, "deleteFor".into()),
            (Action::Save, MethodBinding::Unsupported),
        ])
    }

    fn callable() -> DataAccessModule {
        DataAccessModule::callable(|_req: DataRequest| async move { Ok(json!(null)) })
    }

    #[test]
    fn test_configure_entity_defaults() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap();

        let config = builder.entity_config("comments").unwrap();
        assert_eq!(config.identifier_field, "id");
        assert!(!config.is_primary_entity);
        assert!(config.is_admin_callback.is_none());
        assert!(config.create_token_callback.is_none());
        assert!(config.routes.is_none());
        assert!(config.dependents.is_none());
        assert_eq!(builder.currently_configuring(), Some("comments"));
    }

    #[test]
    fn test_configure_entity_rejects_empty_and_invalid_names() {
        let mut builder = EndpointsBuilder::new();
        let err = builder
            .configure_entity("", EntityOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "ValidationError");

        let err = builder
            .configure_entity("a/b", EntityOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "ValidationError");
        assert!(builder.entity_names().is_empty());
    }

    #[test]
    fn test_configure_entity_twice_is_duplicate() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap();
        let err = builder
            .configure_entity("comments", EntityOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "DuplicateError");

        builder.done().unwrap();
        let err = builder
            .configure_entity("comments", EntityOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "DuplicateError");
    }

    #[test]
    fn test_empty_identifier_field_is_defaulted() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default().identifier_field(""))
            .unwrap();
        assert_eq!(
            builder.entity_config("comments").unwrap().identifier_field,
            "id"
        );
    }

    #[test]
    fn test_primary_entity_requires_callbacks_per_policy() {
        let mut builder = EndpointsBuilder::new();
        let err = builder
            .configure_entity("users", EntityOptions::primary())
            .err()
            .unwrap();
        assert!(err.to_string().contains("isAdminCallback"));

        builder
            .configure_entity("users", EntityOptions::primary().is_admin(|_| true))
            .unwrap();

        let mut strict = EndpointsBuilder::new();
        strict.with_primary_callback_policy(PrimaryCallbackPolicy::AdminCheckAndTokenIssuer);
        let err = strict
            .configure_entity("users", EntityOptions::primary().is_admin(|_| true))
            .err()
            .unwrap();
        assert!(err.to_string().contains("createTokenCallback"));
    }

    #[test]
    fn test_done_requires_configuring_entity() {
        let mut builder = EndpointsBuilder::new();
        assert_eq!(builder.done().err().unwrap().kind(), "SequenceError");

        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap()
            .done()
            .unwrap();
        assert_eq!(builder.currently_configuring(), None);
        assert_eq!(builder.done().err().unwrap().kind(), "SequenceError");
    }

    #[test]
    fn test_chained_methods_require_configuring_entity() {
        let mut builder = EndpointsBuilder::new();
        assert_eq!(
            builder.add_dependents(["x"]).err().unwrap().kind(),
            "SequenceError"
        );
        assert_eq!(
            builder
                .configure_routes(RoutesConfig::new())
                .err()
                .unwrap()
                .kind(),
            "SequenceError"
        );
        assert_eq!(
            builder
                .add_data_access_module(callable())
                .err()
                .unwrap()
                .kind(),
            "SequenceError"
        );
        let handler = Handler::new(|_req: axum::extract::Request| async { "ok" });
        assert_eq!(
            builder
                .extend_routes_with("get", "/x", vec![], handler)
                .err()
                .unwrap()
                .kind(),
            "SequenceError"
        );
    }

    #[test]
    fn test_use_custom_database_after_entities_is_sequence_error() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap();
        assert_eq!(
            builder.use_custom_database().err().unwrap().kind(),
            "SequenceError"
        );
    }

    #[test]
    fn test_adapt_interface_requires_custom_database() {
        let mut builder = EndpointsBuilder::new();
        let err = builder.adapt_interface(full_interface()).err().unwrap();
        assert_eq!(err.kind(), "SequenceError");
    }

    #[test]
    fn test_adapt_interface_roundtrip() {
        let mut builder = EndpointsBuilder::new();
        builder
            .use_custom_database()
            .unwrap()
            .adapt_interface(full_interface())
            .unwrap();
        assert!(builder.is_interface_adapted());
        assert_eq!(builder.db_interface(), &full_interface());
    }

    #[test]
    fn test_adapt_interface_partial_keeps_previous_map() {
        let mut builder = EndpointsBuilder::new();
        builder
            .use_custom_database()
            .unwrap()
            .adapt_interface(full_interface())
            .unwrap();

        let mut partial = full_interface();
        partial.shift_remove(&Action::Save);
        partial.shift_remove(&Action::FindMany);
        let err = builder.adapt_interface(partial).err().unwrap();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("[findMany,save]"));
        assert_eq!(builder.db_interface(), &full_interface());
    }

    #[test]
    fn test_adapt_interface_value() {
        let mut builder = EndpointsBuilder::new();
        builder.use_custom_database().unwrap();

        let err = builder.adapt_interface_value(&json!({})).err().unwrap();
        assert_eq!(err.kind(), "ValidationError");

        builder
            .adapt_interface_value(&json!({
                "findMany": "find",
                "findById": "findById",
                "createOne": "createNewFor",
                "updateOne": "updateFor",
                "deleteOne": "deleteFor",
                "save": false
            }))
            .unwrap();
        assert_eq!(builder.db_interface(), &full_interface());
    }

    #[test]
    fn test_custom_database_requires_adapted_interface_before_entities() {
        let mut builder = EndpointsBuilder::new();
        builder.use_custom_database().unwrap();
        let err = builder
            .configure_entity("comments", EntityOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "SequenceError");
    }

    #[test]
    fn test_add_data_access_module_set_once() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap()
            .add_data_access_module(callable())
            .unwrap();
        let err = builder.add_data_access_module(callable()).err().unwrap();
        assert_eq!(err.kind(), "DuplicateError");
    }

    #[test]
    fn test_add_data_access_module_none_under_custom_database() {
        let mut builder = EndpointsBuilder::new();
        builder
            .use_custom_database()
            .unwrap()
            .adapt_interface(full_interface())
            .unwrap()
            .configure_entity("comments", EntityOptions::default())
            .unwrap();
        let err = builder.add_data_access_module(None).err().unwrap();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn test_add_dependents_scenario() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap()
            .done()
            .unwrap();
        builder
            .configure_entity(
                "users",
                EntityOptions::primary()
                    .identifier_field("key")
                    .is_admin(|_| true),
            )
            .unwrap()
            .add_dependents(["comments"])
            .unwrap();

        let users = builder.entity_config("users").unwrap();
        assert_eq!(users.identifier_field, "key");
        assert_eq!(
            users.dependents,
            Some(vec![Dependent::new("comments", false)])
        );
    }

    #[test]
    fn test_add_dependents_unknown_entity_leaves_state() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("users", EntityOptions::default())
            .unwrap();
        let err = builder.add_dependents(["unknown"]).err().unwrap();
        assert_eq!(err.kind(), "ValidationError");
        assert!(builder.entity_config("users").unwrap().dependents.is_none());
    }

    #[test]
    fn test_add_dependents_replaces_list() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap()
            .done()
            .unwrap();
        builder
            .configure_entity("posts", EntityOptions::default())
            .unwrap()
            .done()
            .unwrap();
        builder
            .configure_entity("users", EntityOptions::default())
            .unwrap()
            .add_dependents(["comments"])
            .unwrap()
            .add_dependents([DependentSpec::Full(Dependent::new("posts", true))])
            .unwrap();
        assert_eq!(
            builder.entity_config("users").unwrap().dependents(),
            &[Dependent::new("posts", true)]
        );
    }

    #[test]
    fn test_add_dependents_value_shapes() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap()
            .done()
            .unwrap();
        builder
            .configure_entity("users", EntityOptions::default())
            .unwrap();

        builder
            .add_dependents_value(&json!(["comments", {"entity": "comments", "forceDelete": true}]))
            .unwrap();
        assert_eq!(
            builder.entity_config("users").unwrap().dependents(),
            &[
                Dependent::new("comments", false),
                Dependent::new("comments", true)
            ]
        );

        let err = builder
            .add_dependents_value(&json!([{"entity": "comments"}]))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "ValidationError");

        let err = builder
            .add_dependents_value(&json!([{"entity": "comments", "forceDelete": "yes"}]))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "ValidationError");

        let err = builder.add_dependents_value(&json!([42])).err().unwrap();
        assert_eq!(err.kind(), "ValidationError");

        let err = builder.add_dependents_value(&json!("comments")).err().unwrap();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn test_configure_routes_empty_is_defaults() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap()
            .configure_routes(RoutesConfig::new())
            .unwrap();
        assert_eq!(
            builder.entity_config("comments").unwrap().routes,
            Some(crate::config::routes::RouteTable::defaults())
        );
    }

    #[test]
    fn test_configure_routes_failure_leaves_routes_unset() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap();
        let err = builder
            .configure_routes(
                RoutesConfig::new().action(Action::FindMany, RoutePatch::new().path("nope")),
            )
            .err()
            .unwrap();
        assert_eq!(err.kind(), "ValidationError");
        assert!(builder.entity_config("comments").unwrap().routes.is_none());
    }

    #[test]
    fn test_configure_routes_patch() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap()
            .configure_routes(
                RoutesConfig::new().action(
                    Action::CreateOne,
                    RoutePatch::new().auth(AuthRequirement::Protected),
                ),
            )
            .unwrap();
        let routes = builder.entity_config("comments").unwrap().resolved_routes();
        assert_eq!(
            routes.get(Action::CreateOne).unwrap().config().unwrap().auth,
            AuthRequirement::Protected
        );
    }

    #[test]
    fn test_extend_routes_with_validation() {
        let mut builder = EndpointsBuilder::new();
        builder
            .configure_entity("comments", EntityOptions::default())
            .unwrap();
        let handler = Handler::new(|_req: axum::extract::Request| async { "ok" });

        let err = builder
            .extend_routes_with("patch", "/x", vec![], handler.clone())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "ValidationError");

        let err = builder
            .extend_routes_with("get", "", vec![], handler.clone())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "ValidationError");

        for malformed in ["/x{y", "/{", "/{id}/{id}"] {
            let err = builder
                .extend_routes_with("get", malformed, vec![], handler.clone())
                .err()
                .unwrap();
            assert_eq!(err.kind(), "ValidationError");
        }
        assert!(builder.entity_config("comments").unwrap().extended_routes.is_empty());

        builder
            .extend_routes_with("GET", "/export/:format", vec![], handler.clone())
            .unwrap()
            .extend_routes_with("post", "/import", vec![], handler)
            .unwrap();
        let extended = &builder.entity_config("comments").unwrap().extended_routes;
        assert_eq!(extended.len(), 2);
        assert_eq!(extended[0].method, HttpMethod::Get);
        assert_eq!(extended[0].path, "/export/{format}");
    }

    #[test]
    fn test_reset() {
        let mut builder = EndpointsBuilder::new();
        builder
            .use_custom_database()
            .unwrap()
            .adapt_interface(full_interface())
            .unwrap()
            .configure_entity("comments", EntityOptions::default())
            .unwrap();

        builder.reset_entity_configurations();
        assert!(builder.entity_names().is_empty());
        assert!(builder.is_using_custom_database());
        assert_eq!(builder.currently_configuring(), None);

        builder.reset();
        assert!(!builder.is_using_custom_database());
        assert!(builder.db_interface().is_empty());
    }

    #[test]
    fn test_issue_token() {
        let mut builder = EndpointsBuilder::new();
        assert!(builder.issue_token(&json!({})).is_err());

        builder
            .configure_entity(
                "users",
                EntityOptions::primary()
                    .is_admin(|_| true)
                    .create_token(|claims| Ok(format!("t:{}", claims["sub"]))),
            )
            .unwrap();
        assert_eq!(builder.issue_token(&json!({"sub": 9})).unwrap(), "t:9");
    }
}
