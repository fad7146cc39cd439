//! Generated handlers for catalog actions
//!
//! Every handler extracts the path identifier, query and JSON body, hands a
//! [`DataRequest`] to the entity's data access and renders the result.

use crate::core::action::Action;
use crate::core::data_access::{DataAccessModule, DataRequest, DatabaseInterface, Dependent};
use crate::core::error::ApiError;
use crate::core::events::{AppEvent, EventBus};
use crate::core::validation::path_params;
use axum::Json;
use axum::body::to_bytes;
use axum::extract::{FromRequestParts, OriginalUri, Path, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, on};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Largest JSON body accepted by generated handlers
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared state of an entity's generated handlers
#[derive(Clone)]
pub struct ActionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    entity: String,
    identifier_field: String,
    module: DataAccessModule,
    interface: Option<DatabaseInterface>,
    dependents: Vec<Dependent>,
    events: EventBus,
}

impl ActionContext {
    pub fn new(
        entity: impl Into<String>,
        identifier_field: impl Into<String>,
        module: DataAccessModule,
        interface: Option<DatabaseInterface>,
        dependents: Vec<Dependent>,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                entity: entity.into(),
                identifier_field: identifier_field.into(),
                module,
                interface,
                dependents,
                events,
            }),
        }
    }

    pub fn entity(&self) -> &str {
        &self.inner.entity
    }
}

/// Method router answering `action` on `path`
pub fn action_method_router(action: Action, path: &str, ctx: ActionContext) -> MethodRouter {
    let params = path_params(path);
    // The identifier field names the path parameter when present, else the first one wins
    let id_param = params
        .iter()
        .find(|p| **p == ctx.inner.identifier_field)
        .or_else(|| params.first())
        .cloned();

    on(action.method().filter(), move |req: Request| {
        let ctx = ctx.clone();
        let id_param = id_param.clone();
        async move {
            match run_action(&ctx, action, id_param.as_deref(), req).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::debug!(entity = %ctx.inner.entity, action = %action, error = %err, "action failed");
                    err.into_response()
                }
            }
        }
    })
}

async fn run_action(
    ctx: &ActionContext,
    action: Action,
    id_param: Option<&str>,
    req: Request,
) -> Result<Response, ApiError> {
    let (mut parts, body) = req.into_parts();
    let original_path = request_path(&parts);

    let Query(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let id = match id_param {
        Some(name) => {
            let Path(params) = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &())
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            params.get(name).cloned()
        }
        None => None,
    };
    if action.targets_single() && id.is_none() {
        return Err(ApiError::BadRequest(format!(
            "action [{}] requires an identifier in the path",
            action
        )));
    }

    let body = match action {
        Action::CreateOne | Action::UpdateOne | Action::Save => {
            let bytes = to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            if bytes.is_empty() {
                None
            } else {
                let value: Value = serde_json::from_slice(&bytes)
                    .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))?;
                Some(value)
            }
        }
        _ => None,
    };

    let request = DataRequest {
        entity: ctx.inner.entity.clone(),
        action,
        identifier_field: ctx.inner.identifier_field.clone(),
        id,
        body,
        query,
        dependents: ctx.inner.dependents.clone(),
    };

    let result = ctx
        .inner
        .module
        .dispatch(ctx.inner.interface.as_ref(), request)
        .await?;

    if action.targets_single() && result.is_null() {
        return Err(ApiError::NotFound {
            path: original_path,
        });
    }

    if action.is_mutation() {
        ctx.inner.events.publish(AppEvent::Mutation {
            entity: ctx.inner.entity.clone(),
            action,
            data: result.clone(),
        });
    }

    let status = if action == Action::CreateOne {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)).into_response())
}

/// Path as the client sent it, before nesting stripped the prefix
fn request_path(parts: &Parts) -> String {
    parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string())
}
