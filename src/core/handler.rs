//! Type-erased request handles
//!
//! Middlewares, route handlers and the error handler are supplied by the client
//! as closures. They are stored behind `Arc` so route tables can be cloned and
//! compared cheaply, and converted into axum layers/handlers when routes are
//! mounted.

use super::error::ApiError;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, on};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::action::HttpMethod;

type MiddlewareFn = dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync;
type HandlerFn = dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync;
type ErrorHandlerFn = dyn Fn(ApiError) -> Response + Send + Sync;

/// A middleware in a route chain
///
/// Receives the request and the rest of the chain; it either short-circuits
/// with its own response or calls `next.run(request)`.
///
/// Two handles compare equal when they share the same underlying closure.
#[derive(Clone)]
pub struct Middleware {
    name: Arc<str>,
    inner: Arc<MiddlewareFn>,
}

impl Middleware {
    /// Wrap an async middleware closure
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self::named("middleware", f)
    }

    /// Wrap an async middleware closure under a diagnostic name
    pub fn named<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let name: String = name.into();
        let inner: Arc<MiddlewareFn> =
            Arc::new(move |req: Request, next: Next| -> BoxFuture<'static, Response> {
                Box::pin(f(req, next))
            });
        Self {
            name: Arc::from(name),
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the middleware
    pub fn call(&self, req: Request, next: Next) -> BoxFuture<'static, Response> {
        (self.inner)(req, next)
    }

    /// Layer this middleware onto a method router
    pub(crate) fn apply(&self, router: MethodRouter) -> MethodRouter {
        let mw = self.clone();
        router.layer(axum::middleware::from_fn(
            move |req: Request, next: Next| mw.call(req, next),
        ))
    }
}

impl PartialEq for Middleware {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// A terminal request handler (extended routes, not-found handler)
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        let inner: Arc<HandlerFn> = Arc::new(move |req: Request| -> BoxFuture<'static, Response> {
            let fut = f(req);
            Box::pin(async move { fut.await.into_response() })
        });
        Self { inner }
    }

    pub fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        (self.inner)(req)
    }

    /// Build a method router answering `method` with this handler
    pub(crate) fn method_router(&self, method: HttpMethod) -> MethodRouter {
        let handler = self.clone();
        on(method.filter(), move |req: Request| handler.call(req))
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// Renders an [`ApiError`] into the final response
#[derive(Clone)]
pub struct ErrorHandler {
    inner: Arc<ErrorHandlerFn>,
}

impl ErrorHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ApiError) -> Response + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn handle(&self, err: ApiError) -> Response {
        (self.inner)(err)
    }

    /// Replace a response that carries an `ApiError` with the handler's rendering
    pub fn rewrite(&self, response: Response) -> Response {
        match response.extensions().get::<ApiError>().cloned() {
            Some(err) => self.handle(err),
            None => response,
        }
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(default_error_handler)
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler")
    }
}

/// Default error rendering: status from the error, JSON `{code, message, details}`
pub fn default_error_handler(err: ApiError) -> Response {
    err.into_response()
}

/// Default not-found handler
pub fn default_not_found_handler() -> Handler {
    Handler::new(|req: Request| async move {
        ApiError::NotFound {
            path: req.uri().path().to_string(),
        }
    })
}
