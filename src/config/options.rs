//! Entity options and assembly overrides

use crate::core::auth::{CreateTokenCallback, IsAdminCallback, Principal, TokenVerifier};
use crate::core::events::EventBus;
use crate::core::handler::{ErrorHandler, Handler};
use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Options accepted by `configure_entity`
#[derive(Clone)]
pub struct EntityOptions {
    /// Field that identifies a record, `"id"` by default
    pub identifier_field: String,
    pub is_primary_entity: bool,
    pub is_admin_callback: Option<IsAdminCallback>,
    pub create_token_callback: Option<CreateTokenCallback>,
}

impl EntityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for the primary entity
    pub fn primary() -> Self {
        Self::default().primary_entity(true)
    }

    pub fn identifier_field(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = field.into();
        self
    }

    pub fn primary_entity(mut self, is_primary: bool) -> Self {
        self.is_primary_entity = is_primary;
        self
    }

    pub fn is_admin<F>(mut self, f: F) -> Self
    where
        F: Fn(&Principal) -> bool + Send + Sync + 'static,
    {
        self.is_admin_callback = Some(Arc::new(f));
        self
    }

    pub fn create_token<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<String> + Send + Sync + 'static,
    {
        self.create_token_callback = Some(Arc::new(f));
        self
    }
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            identifier_field: "id".to_string(),
            is_primary_entity: false,
            is_admin_callback: None,
            create_token_callback: None,
        }
    }
}

impl fmt::Debug for EntityOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityOptions")
            .field("identifier_field", &self.identifier_field)
            .field("is_primary_entity", &self.is_primary_entity)
            .field("is_admin_callback", &self.is_admin_callback.is_some())
            .field("create_token_callback", &self.create_token_callback.is_some())
            .finish()
    }
}

/// Callbacks the primary entity must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimaryCallbackPolicy {
    /// Only the admin check is required
    #[default]
    AdminCheckOnly,
    /// Both the admin check and token issuance are required
    AdminCheckAndTokenIssuer,
}

impl PrimaryCallbackPolicy {
    /// Names of the callbacks missing from `options` under this policy
    pub fn missing_callbacks(&self, options: &EntityOptions) -> Vec<&'static str> {
        let mut missing = vec![];
        if options.is_admin_callback.is_none() {
            missing.push("isAdminCallback");
        }
        if *self == PrimaryCallbackPolicy::AdminCheckAndTokenIssuer
            && options.create_token_callback.is_none()
        {
            missing.push("createTokenCallback");
        }
        missing
    }
}

/// Hook awaited during assembly, before routes are mounted
pub type InitializeCallback =
    Arc<dyn Fn(String, EventBus) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Overrides accepted by `create`
#[derive(Clone, Default)]
pub struct CreateOptions {
    pub error_handler: Option<ErrorHandler>,
    pub not_found_handler: Option<Handler>,
    /// `"dev"` enables request logging
    pub environment: Option<String>,
    pub initialize_callback: Option<InitializeCallback>,
    /// Authorization scheme expected before the token, `"Bearer"` by default
    pub token_prefix: Option<String>,
    pub token_verifier: Option<Arc<dyn TokenVerifier>>,
    pub api_prefix: Option<String>,
    pub event_bus_capacity: Option<usize>,
}

pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_TOKEN_PREFIX: &str = "Bearer";
pub const DEFAULT_API_PREFIX: &str = "/api";
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1024;

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn with_not_found_handler(mut self, handler: Handler) -> Self {
        self.not_found_handler = Some(handler);
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_initialize_callback<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, EventBus) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let callback: InitializeCallback =
            Arc::new(move |env: String, bus: EventBus| -> BoxFuture<'static, Result<()>> {
                Box::pin(f(env, bus))
            });
        self.initialize_callback = Some(callback);
        self
    }

    pub fn with_token_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.token_prefix = Some(prefix.into());
        self
    }

    pub fn with_token_verifier(mut self, verifier: impl TokenVerifier + 'static) -> Self {
        self.token_verifier = Some(Arc::new(verifier));
        self
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = Some(prefix.into());
        self
    }

    pub fn with_event_bus_capacity(mut self, capacity: usize) -> Self {
        self.event_bus_capacity = Some(capacity);
        self
    }

    /// Resolve every override against its default
    pub fn resolve(self) -> ResolvedOptions {
        let environment = self
            .environment
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let token_prefix = self
            .token_prefix
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_PREFIX.to_string());
        let api_prefix = self
            .api_prefix
            .map(|p| match p.trim_end_matches('/') {
                "" => String::new(),
                rooted if rooted.starts_with('/') => rooted.to_string(),
                relative => format!("/{}", relative),
            })
            .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string());

        ResolvedOptions {
            error_handler: self.error_handler.unwrap_or_default(),
            not_found_handler: self
                .not_found_handler
                .unwrap_or_else(crate::core::handler::default_not_found_handler),
            environment,
            initialize_callback: self.initialize_callback,
            token_prefix,
            token_verifier: self.token_verifier,
            api_prefix,
            event_bus_capacity: self
                .event_bus_capacity
                .unwrap_or(DEFAULT_EVENT_BUS_CAPACITY),
        }
    }
}

impl fmt::Debug for CreateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateOptions")
            .field("environment", &self.environment)
            .field("token_prefix", &self.token_prefix)
            .field("api_prefix", &self.api_prefix)
            .field("event_bus_capacity", &self.event_bus_capacity)
            .finish_non_exhaustive()
    }
}

/// [`CreateOptions`] with every default applied
#[derive(Clone)]
pub struct ResolvedOptions {
    pub error_handler: ErrorHandler,
    pub not_found_handler: Handler,
    pub environment: String,
    pub initialize_callback: Option<InitializeCallback>,
    pub token_prefix: String,
    pub token_verifier: Option<Arc<dyn TokenVerifier>>,
    pub api_prefix: String,
    pub event_bus_capacity: usize,
}

impl ResolvedOptions {
    pub fn is_dev(&self) -> bool {
        self.environment == DEFAULT_ENVIRONMENT
    }
}
