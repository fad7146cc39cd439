//! # endpoints
//!
//! Declarative REST endpoints for entities, served with axum.
//!
//! ## Features
//!
//! - **Chainable configuration**: one `configure_entity(..)...done()` chain per entity
//! - **Action catalog**: findMany, findById, createOne, updateOne, deleteOne and save
//! - **Route defaults**: every action has a default path and auth requirement, patched per entity
//! - **Custom databases**: adapt a client interface once, attach a data access module per entity
//! - **Bearer-token auth**: protected and admin-only routes guarded by the primary entity
//! - **Events**: mutations published on a broadcast event bus
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use endpoints::prelude::*;
//!
//! let mut builder = EndpointsBuilder::new();
//! builder
//!     .configure_entity("comments", EntityOptions::default())?
//!     .done()?;
//! builder
//!     .configure_entity("users", EntityOptions::primary().is_admin(|p| p.claims["admin"] == true))?
//!     .add_dependents(["comments"])?
//!     .done()?;
//!
//! let mut app = AxumApp::new();
//! let options = CreateOptions::new().with_token_verifier(verify_jwt);
//! builder.create(&mut app, Some("secret"), options).await?;
//! app.listen("127.0.0.1:3000").await?;
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        action::{Action, HttpMethod},
        auth::{AuthGuard, AuthProvider, AuthRequirement, BearerTokenAuth, Principal, TokenVerifier},
        data_access::{
            DataAccessModule, DataAccessObject, DataRequest, DatabaseInterface, Dependent,
            MethodBinding,
        },
        error::{ApiError, BuilderError, BuilderResult},
        events::{AppEvent, EventBus, EventEnvelope},
        handler::{ErrorHandler, Handler, Middleware},
    };

    // === Configuration ===
    pub use crate::config::{
        AppSettings,
        options::{CreateOptions, EntityOptions, PrimaryCallbackPolicy},
        routes::{RouteActionConfig, RoutePatch, RouteSetting, RouteTable, RoutesConfig},
    };

    // === Server ===
    pub use crate::server::{
        AppHandle, AxumApp, DependentSpec, EndpointsBuilder, EntityConfig, Mount, RouteInfo,
    };

    // === Storage ===
    pub use crate::storage::InMemoryDataAccess;

    // === External re-exports ===
    pub use async_trait::async_trait;
    pub use axum::{Json, Router};
    pub use serde_json::{Value, json};
}
