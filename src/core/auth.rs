//! Authentication for generated routes
//!
//! Each route action carries an [`AuthRequirement`]. At assembly time an
//! [`AuthGuard`] turns that requirement into the middlewares prepended to the
//! route chain:
//!
//! - `None` / `CustomMiddlewares`: nothing is prepended
//! - `Protected`: `authenticate`
//! - `AdminOnly`: `authenticate`, then `require_admin`
//!
//! Token verification itself is injected through [`TokenVerifier`]; the
//! whole authentication step can be replaced with a custom [`AuthProvider`].

use crate::core::error::ApiError;
use crate::core::handler::Middleware;
use anyhow::Result;
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::IntoResponse;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Authentication requirement attached to a route action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthRequirement {
    /// Public route
    #[default]
    None,

    /// Any authenticated caller
    Protected,

    /// Authenticated caller accepted by the primary entity's admin check
    AdminOnly,

    /// The route's own middlewares handle authentication
    CustomMiddlewares,
}

impl AuthRequirement {
    pub const ALL: [AuthRequirement; 4] = [
        AuthRequirement::None,
        AuthRequirement::Protected,
        AuthRequirement::AdminOnly,
        AuthRequirement::CustomMiddlewares,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AuthRequirement::None => "none",
            AuthRequirement::Protected => "protected",
            AuthRequirement::AdminOnly => "adminOnly",
            AuthRequirement::CustomMiddlewares => "customMiddlewares",
        }
    }

    /// Parse a requirement key; `"false"` is accepted as an alias of `"none"`
    pub fn parse_requirement(s: &str) -> Option<Self> {
        if s == "false" {
            return Some(AuthRequirement::None);
        }
        Self::ALL.into_iter().find(|r| r.key() == s)
    }

    /// Read a requirement from JSON: the literal `false` or a requirement key
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(false) => Some(AuthRequirement::None),
            Value::String(s) => Self::parse_requirement(s),
            _ => None,
        }
    }

    /// Whether a bearer token must be verified for this requirement
    pub fn requires_token(&self) -> bool {
        matches!(self, AuthRequirement::Protected | AuthRequirement::AdminOnly)
    }
}

impl fmt::Display for AuthRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for AuthRequirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AuthRequirement::None => serializer.serialize_bool(false),
            other => serializer.serialize_str(other.key()),
        }
    }
}

impl<'de> Deserialize<'de> for AuthRequirement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        AuthRequirement::from_value(&value).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid auth requirement: {}", value))
        })
    }
}

/// The authenticated caller, stored in request extensions
///
/// `entity` is the name of the primary entity, so handlers know what the
/// claims identify.
#[derive(Debug, Clone)]
pub struct Principal {
    pub entity: String,
    pub claims: Value,
}

impl Principal {
    /// The `sub` claim, if present
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("no authenticated principal".to_string()))
    }
}

/// Verifies a bearer token against the configured secret
///
/// Implemented for plain closures so tests and small apps can inject one
/// directly.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Return the token's claims, or an error if the token is not valid
    async fn verify(&self, token: &str, secret: &str) -> Result<Value>;
}

#[async_trait]
impl<F> TokenVerifier for F
where
    F: Fn(&str, &str) -> Result<Value> + Send + Sync,
{
    async fn verify(&self, token: &str, secret: &str) -> Result<Value> {
        self(token, secret)
    }
}

/// Turns request headers into the caller's claims
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Value, ApiError>;
}

/// Default provider: `Authorization: <prefix> <token>` checked by a [`TokenVerifier`]
pub struct BearerTokenAuth {
    secret: String,
    prefix: String,
    verifier: Arc<dyn TokenVerifier>,
}

impl BearerTokenAuth {
    pub fn new(
        secret: impl Into<String>,
        prefix: impl Into<String>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            secret: secret.into(),
            prefix: prefix.into(),
            verifier,
        }
    }

    fn extract_token<'a>(&self, headers: &'a HeaderMap) -> Result<&'a str, ApiError> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("malformed authorization header".to_string()))?;

        let token = header
            .strip_prefix(self.prefix.as_str())
            .filter(|rest| self.prefix.is_empty() || rest.starts_with(char::is_whitespace))
            .ok_or_else(|| {
                ApiError::Unauthorized(format!("expected a [{}] token", self.prefix))
            })?
            .trim_start();

        if token.is_empty() {
            return Err(ApiError::Unauthorized("empty token".to_string()));
        }
        Ok(token)
    }
}

#[async_trait]
impl AuthProvider for BearerTokenAuth {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Value, ApiError> {
        let token = self.extract_token(headers)?;
        self.verifier
            .verify(token, &self.secret)
            .await
            .map_err(|e| ApiError::Unauthorized(e.to_string()))
    }
}

/// Admin check supplied with the primary entity
pub type IsAdminCallback = Arc<dyn Fn(&Principal) -> bool + Send + Sync>;

/// Token issuance supplied with the primary entity
pub type CreateTokenCallback = Arc<dyn Fn(&Value) -> Result<String> + Send + Sync>;

/// Builds the auth middlewares for route chains
///
/// The middlewares are created once, so every route shares the same handles.
#[derive(Clone)]
pub struct AuthGuard {
    authenticate: Middleware,
    require_admin: Middleware,
}

impl AuthGuard {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        primary_entity: impl Into<String>,
        is_admin: Option<IsAdminCallback>,
    ) -> Self {
        let entity: String = primary_entity.into();

        let authenticate = Middleware::named("authenticate", move |mut req: Request, next: Next| {
            let provider = provider.clone();
            let entity = entity.clone();
            async move {
                match provider.authenticate(req.headers()).await {
                    Ok(claims) => {
                        req.extensions_mut().insert(Principal { entity, claims });
                        next.run(req).await
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "request rejected by authentication");
                        err.into_response()
                    }
                }
            }
        });

        let require_admin = Middleware::named("require_admin", move |req: Request, next: Next| {
            let is_admin = is_admin.clone();
            async move {
                let allowed = match req.extensions().get::<Principal>() {
                    Some(principal) => is_admin.as_ref().is_some_and(|check| check(principal)),
                    None => {
                        return ApiError::Unauthorized("no authenticated principal".to_string())
                            .into_response();
                    }
                };
                if !allowed {
                    tracing::debug!("request rejected by admin check");
                    return ApiError::Forbidden("admin privileges required".to_string())
                        .into_response();
                }
                next.run(req).await
            }
        });

        Self {
            authenticate,
            require_admin,
        }
    }

    /// Middlewares to prepend for a requirement, in execution order
    pub fn middlewares_for(&self, requirement: AuthRequirement) -> Vec<Middleware> {
        if !requirement.requires_token() {
            return vec![];
        }
        let mut chain = vec![self.authenticate.clone()];
        if requirement == AuthRequirement::AdminOnly {
            chain.push(self.require_admin.clone());
        }
        chain
    }
}
