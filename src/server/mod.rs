//! Server module: entity configuration and application assembly
//!
//! [`EndpointsBuilder`] collects entity configurations through chained calls.
//! `create` compiles each entity into a route plan, builds its axum router
//! and mounts everything on an [`AppHandle`].

pub mod builder;
pub mod entity_registry;
pub mod handlers;
pub mod host;
pub mod plan;
pub mod router;

pub use builder::EndpointsBuilder;
pub use entity_registry::{DependentSpec, EntityConfig, EntityRegistry, ExtendedRoute};
pub use handlers::ActionContext;
pub use host::{AppHandle, AxumApp, Mount};
pub use plan::{EntityPlan, PlannedRoute, RouteInfo};
