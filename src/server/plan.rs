//! Route plan: the per-entity list of routes and their middleware chains
//!
//! An [`EntityPlan`] is compiled from an [`EntityConfig`] before anything is
//! mounted, so every conflict is reported while the application is still
//! untouched.

use super::entity_registry::EntityConfig;
use crate::core::action::{Action, HttpMethod};
use crate::core::auth::{AuthGuard, AuthRequirement};
use crate::core::data_access::{DatabaseInterface, MethodBinding};
use crate::core::error::{BuilderError, BuilderResult};
use crate::core::handler::{Handler, Middleware};
use crate::core::validation::PathSegment;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One route ready to be mounted
#[derive(Debug, Clone)]
pub struct PlannedRoute {
    pub method: HttpMethod,
    /// Path relative to the entity prefix
    pub path: String,
    /// Catalog action, `None` for extended routes
    pub action: Option<Action>,
    pub auth: AuthRequirement,
    /// Middlewares in execution order: auth first, then the user's
    pub chain: Vec<Middleware>,
    /// Terminal handler of an extended route
    pub handler: Option<Handler>,
}

/// Every route of one entity
#[derive(Debug, Clone)]
pub struct EntityPlan {
    pub name: String,
    /// Mount prefix, e.g. `/api/users`
    pub prefix: String,
    pub routes: Vec<PlannedRoute>,
}

/// Description of a mounted route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub method: HttpMethod,
    /// Full path including the entity prefix
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub auth: AuthRequirement,
    /// Middleware names in execution order
    pub middlewares: Vec<String>,
}

impl PlannedRoute {
    pub fn info(&self, prefix: &str) -> RouteInfo {
        let path = if self.path == "/" {
            prefix.to_string()
        } else {
            format!("{}{}", prefix, self.path)
        };
        RouteInfo {
            method: self.method,
            path,
            action: self.action,
            auth: self.auth,
            middlewares: self.chain.iter().map(|m| m.name().to_string()).collect(),
        }
    }
}

impl EntityPlan {
    pub fn route_infos(&self) -> Vec<RouteInfo> {
        self.routes.iter().map(|r| r.info(&self.prefix)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Compile an entity's resolved routes and extended routes into a plan
///
/// Actions the adapted database marks unsupported are left out.
pub fn compile_entity(
    entity: &EntityConfig,
    guard: &AuthGuard,
    api_prefix: &str,
    interface: Option<&DatabaseInterface>,
) -> BuilderResult<EntityPlan> {
    let mut routes = vec![];

    for (action, config) in entity.resolved_routes().configured() {
        if let Some(MethodBinding::Unsupported) = interface.and_then(|i| i.get(&action)) {
            tracing::debug!(entity = %entity.name, action = %action, "action unsupported by database, route skipped");
            continue;
        }

        let mut chain = guard.middlewares_for(config.auth);
        chain.extend(config.middlewares.iter().cloned());

        routes.push(PlannedRoute {
            method: action.method(),
            path: config.path.clone(),
            action: Some(action),
            auth: config.auth,
            chain,
            handler: None,
        });
    }

    for extended in &entity.extended_routes {
        routes.push(PlannedRoute {
            method: extended.method,
            path: extended.path.clone(),
            action: None,
            auth: AuthRequirement::CustomMiddlewares,
            chain: extended.middlewares.clone(),
            handler: Some(extended.handler.clone()),
        });
    }

    let mut seen = HashSet::new();
    for route in &routes {
        if !seen.insert((route.method, route.path.as_str())) {
            return Err(BuilderError::Validation(format!(
                "Entity [{}] declares route [{} {}] more than once",
                entity.name, route.method, route.path
            )));
        }
    }

    let mut tree = PathTree::default();
    for route in &routes {
        tree.insert(&route.path).map_err(|other| {
            BuilderError::Validation(format!(
                "Entity [{}] route [{}] conflicts with route [{}]",
                entity.name, route.path, other
            ))
        })?;
    }

    Ok(EntityPlan {
        name: entity.name.clone(),
        prefix: format!("{}/{}", api_prefix, entity.name),
        routes,
    })
}

/// Segment tree of an entity's paths
///
/// Two captures at the same position must share a name, and a catch-all
/// cannot sit beside a named capture, otherwise the router refuses the pair.
#[derive(Default)]
struct PathTree {
    statics: HashMap<String, PathTree>,
    param: Option<(String, String, Box<PathTree>)>,
    catch_all: Option<(String, String)>,
}

impl PathTree {
    /// Insert a path, returning the earlier path it conflicts with
    fn insert(&mut self, path: &str) -> Result<(), String> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        self.insert_segments(&segments, path)
    }

    fn insert_segments(&mut self, segments: &[&str], path: &str) -> Result<(), String> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(());
        };
        match PathSegment::parse(first) {
            Some(PathSegment::Param(name)) => {
                if let Some((_, owner)) = &self.catch_all {
                    return Err(owner.clone());
                }
                let (existing, owner, child) = self.param.get_or_insert_with(|| {
                    (name.to_string(), path.to_string(), Box::default())
                });
                if existing.as_str() != name {
                    return Err(owner.clone());
                }
                child.insert_segments(rest, path)
            }
            Some(PathSegment::CatchAll(name)) => {
                if let Some((_, owner, _)) = &self.param {
                    return Err(owner.clone());
                }
                if let Some((existing, owner)) = &self.catch_all {
                    if existing.as_str() != name {
                        return Err(owner.clone());
                    }
                    return Ok(());
                }
                self.catch_all = Some((name.to_string(), path.to_string()));
                Ok(())
            }
            Some(PathSegment::Static(text)) => self
                .statics
                .entry(text.to_string())
                .or_default()
                .insert_segments(rest, path),
            None => Err(path.to_string()),
        }
    }
}
