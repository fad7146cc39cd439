//! Application host
//!
//! Assembly does not talk to axum directly: it hands a sequence of
//! [`Mount`]s to an [`AppHandle`]. [`AxumApp`] is the axum implementation;
//! tests can record the mounts instead.
//!
//! Mounts arrive in this order: request logging (dev only), one entity
//! router per entity in registration order, the not-found handler, the error
//! handler.

use super::plan::RouteInfo;
use crate::core::handler::{ErrorHandler, Handler};
use anyhow::Result;
use axum::Router;
use axum::extract::Request;
use axum::response::Response;
use std::fmt;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Something assembly mounts on the application
pub enum Mount {
    /// HTTP request logging
    RequestLogging,

    /// Router of one entity, nested under `prefix`
    Entity {
        name: String,
        prefix: String,
        router: Router,
        routes: Vec<RouteInfo>,
    },

    /// Handler for requests no route matched
    NotFound(Handler),

    /// Renders every `ApiError` response
    ErrorHandler(ErrorHandler),
}

impl Mount {
    pub fn kind(&self) -> &'static str {
        match self {
            Mount::RequestLogging => "request_logging",
            Mount::Entity { .. } => "entity",
            Mount::NotFound(_) => "not_found",
            Mount::ErrorHandler(_) => "error_handler",
        }
    }
}

impl fmt::Debug for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mount::Entity { name, prefix, routes, .. } => f
                .debug_struct("Entity")
                .field("name", name)
                .field("prefix", prefix)
                .field("routes", routes)
                .finish_non_exhaustive(),
            other => f.write_str(other.kind()),
        }
    }
}

/// The application capability assembly needs
pub trait AppHandle {
    /// Mount a handler, router or middleware
    fn use_mount(&mut self, mount: Mount);

    /// Serve the application until shutdown
    fn listen(self, addr: &str) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// axum-backed application
#[derive(Default)]
pub struct AxumApp {
    router: Router,
    request_logging: bool,
    not_found: Option<Handler>,
    error_handler: Option<ErrorHandler>,
    routes: Vec<RouteInfo>,
}

impl AxumApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every route mounted so far
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// Finish the application into a router
    ///
    /// The error handler wraps everything, including the not-found fallback,
    /// and request logging wraps the error handler.
    pub fn into_router(self) -> Router {
        let mut router = self.router;

        if let Some(not_found) = self.not_found {
            router = router.fallback(move |req: Request| not_found.call(req));
        }

        if let Some(error_handler) = self.error_handler {
            router = router.layer(axum::middleware::map_response(move |response: Response| {
                let error_handler = error_handler.clone();
                async move { error_handler.rewrite(response) }
            }));
        }

        if self.request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }
}

impl AppHandle for AxumApp {
    fn use_mount(&mut self, mount: Mount) {
        match mount {
            Mount::RequestLogging => self.request_logging = true,
            Mount::Entity {
                prefix,
                router,
                mut routes,
                ..
            } => {
                self.router = std::mem::take(&mut self.router).nest(&prefix, router);
                self.routes.append(&mut routes);
            }
            Mount::NotFound(handler) => self.not_found = Some(handler),
            Mount::ErrorHandler(handler) => self.error_handler = Some(handler),
        }
    }

    async fn listen(self, addr: &str) -> Result<()> {
        let app = self.into_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
