//! Router builder for entity plans

use super::handlers::{ActionContext, action_method_router};
use super::plan::{EntityPlan, PlannedRoute};
use axum::Router;
use axum::routing::MethodRouter;

/// Build the router of one entity, relative to its prefix
///
/// Each route gets its chain layered so that execution order matches the
/// chain order: the first middleware runs first, the handler last.
pub fn build_entity_router(plan: &EntityPlan, ctx: &ActionContext) -> Router {
    let mut router = Router::new();

    for route in &plan.routes {
        let Some(method_router) = endpoint(route, ctx) else {
            continue;
        };
        let method_router = route
            .chain
            .iter()
            .rev()
            .fold(method_router, |mr, middleware| middleware.apply(mr));

        tracing::debug!(
            entity = %plan.name,
            method = %route.method,
            path = %route.path,
            middlewares = route.chain.len(),
            "mounting route"
        );
        router = router.route(&route.path, method_router);
    }

    router
}

fn endpoint(route: &PlannedRoute, ctx: &ActionContext) -> Option<MethodRouter> {
    match (route.action, &route.handler) {
        (_, Some(handler)) => Some(handler.method_router(route.method)),
        (Some(action), None) => Some(action_method_router(action, &route.path, ctx.clone())),
        (None, None) => None,
    }
}
