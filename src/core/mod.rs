//! Core module containing the action catalog, auth, errors and data access

pub mod action;
pub mod auth;
pub mod data_access;
pub mod error;
pub mod events;
pub mod handler;
pub mod validation;

pub use action::{Action, HttpMethod};
pub use auth::{AuthGuard, AuthProvider, AuthRequirement, BearerTokenAuth, Principal, TokenVerifier};
pub use data_access::{
    DataAccessModule, DataAccessObject, DataRequest, DatabaseInterface, Dependent, MethodBinding,
};
pub use error::{ApiError, BuilderError, BuilderResult};
pub use events::{AppEvent, EventBus, EventEnvelope};
pub use handler::{ErrorHandler, Handler, Middleware};
