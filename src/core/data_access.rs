//! Data access capability and database interface adaptation
//!
//! An entity's data access is either a single async callable that serves
//! every action (the action travels in the [`DataRequest`]), or an object
//! exposing named methods. When a custom database is declared, the method
//! name for each action comes from the adapted interface map; otherwise the
//! action key itself is the method name.

use crate::core::action::Action;
use crate::core::error::ApiError;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A declared cascade relationship to another entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependent {
    pub entity: String,
    pub force_delete: bool,
}

impl Dependent {
    pub fn new(entity: impl Into<String>, force_delete: bool) -> Self {
        Self {
            entity: entity.into(),
            force_delete,
        }
    }
}

/// Everything a data-access call needs to know about the request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    pub entity: String,
    pub action: Action,
    pub identifier_field: String,
    /// Path identifier for single-record actions
    pub id: Option<String>,
    /// JSON body for writes
    pub body: Option<Value>,
    pub query: HashMap<String, String>,
    /// Declared dependents, so deletes can cascade
    pub dependents: Vec<Dependent>,
}

impl DataRequest {
    pub fn new(entity: impl Into<String>, action: Action) -> Self {
        Self {
            entity: entity.into(),
            action,
            identifier_field: "id".to_string(),
            id: None,
            body: None,
            query: HashMap::new(),
            dependents: vec![],
        }
    }
}

/// Object exposing named data-access methods
#[async_trait]
pub trait DataAccessObject: Send + Sync {
    /// Whether `method` can be invoked
    fn has_method(&self, method: &str) -> bool;

    /// Invoke a named method
    async fn invoke(&self, method: &str, request: DataRequest) -> Result<Value>;
}

/// Single callable serving every action
pub type DataAccessFn = Arc<dyn Fn(DataRequest) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Data access attached to an entity
#[derive(Clone)]
pub enum DataAccessModule {
    Callable(DataAccessFn),
    Object(Arc<dyn DataAccessObject>),
}

impl DataAccessModule {
    /// Wrap an async closure
    pub fn callable<F, Fut>(f: F) -> Self
    where
        F: Fn(DataRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let f: DataAccessFn =
            Arc::new(move |req: DataRequest| -> BoxFuture<'static, Result<Value>> {
                Box::pin(f(req))
            });
        DataAccessModule::Callable(f)
    }

    pub fn object(object: impl DataAccessObject + 'static) -> Self {
        DataAccessModule::Object(Arc::new(object))
    }

    /// Run `request` against this module
    ///
    /// Object modules resolve the method through `interface` when one is
    /// given, falling back to the action key.
    pub async fn dispatch(
        &self,
        interface: Option<&DatabaseInterface>,
        request: DataRequest,
    ) -> Result<Value, ApiError> {
        let result = match self {
            DataAccessModule::Callable(f) => f(request).await,
            DataAccessModule::Object(object) => {
                let method = match interface {
                    Some(interface) => match interface.get(&request.action) {
                        Some(MethodBinding::Method(name)) => name.clone(),
                        Some(MethodBinding::Unsupported) | None => {
                            return Err(ApiError::NotImplemented(format!(
                                "action [{}] is not supported by the database",
                                request.action
                            )));
                        }
                    },
                    None => request.action.key().to_string(),
                };
                object.invoke(&method, request).await
            }
        };
        result.map_err(ApiError::from_anyhow)
    }
}

impl fmt::Debug for DataAccessModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataAccessModule::Callable(_) => f.write_str("DataAccessModule::Callable"),
            DataAccessModule::Object(_) => f.write_str("DataAccessModule::Object"),
        }
    }
}

/// How one action maps onto the client's database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodBinding {
    /// Name of the method on the data-access object
    Method(String),
    /// Action not supported (the literal `false`)
    Unsupported,
}

impl MethodBinding {
    /// Read a binding from JSON: `false` or a non-empty string
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(false) => Some(MethodBinding::Unsupported),
            Value::String(s) if !s.is_empty() => Some(MethodBinding::Method(s.clone())),
            _ => None,
        }
    }

    /// Accepted bindings: `Unsupported` or a non-empty method name
    pub fn is_valid(&self) -> bool {
        match self {
            MethodBinding::Method(name) => !name.is_empty(),
            MethodBinding::Unsupported => true,
        }
    }

    pub fn method_name(&self) -> Option<&str> {
        match self {
            MethodBinding::Method(name) => Some(name),
            MethodBinding::Unsupported => None,
        }
    }
}

impl From<&str> for MethodBinding {
    fn from(name: &str) -> Self {
        MethodBinding::Method(name.to_string())
    }
}

impl From<String> for MethodBinding {
    fn from(name: String) -> Self {
        MethodBinding::Method(name)
    }
}

impl Serialize for MethodBinding {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MethodBinding::Method(name) => serializer.serialize_str(name),
            MethodBinding::Unsupported => serializer.serialize_bool(false),
        }
    }
}

/// Mapping from every action to its database binding
pub type DatabaseInterface = IndexMap<Action, MethodBinding>;

/// Validate a raw interface map against the catalog
///
/// Every action must be bound; the result is ordered like the catalog.
/// Offending actions are reported together.
pub fn resolve_interface(map: &IndexMap<Action, MethodBinding>) -> Result<DatabaseInterface, Vec<Action>> {
    let mut resolved = DatabaseInterface::new();
    let mut missing_or_invalid = vec![];

    for action in Action::ALL {
        match map.get(&action) {
            Some(binding) if binding.is_valid() => {
                resolved.insert(action, binding.clone());
            }
            _ => missing_or_invalid.push(action),
        }
    }

    if missing_or_invalid.is_empty() {
        Ok(resolved)
    } else {
        Err(missing_or_invalid)
    }
}

/// Read a JSON interface map; unknown keys are ignored, bad values dropped
///
/// Dropped entries surface as missing in [`resolve_interface`].
pub fn interface_from_value(value: &Value) -> IndexMap<Action, MethodBinding> {
    let mut map = IndexMap::new();
    if let Some(object) = value.as_object() {
        for (key, raw) in object {
            if let (Some(action), Some(binding)) = (Action::parse_key(key), MethodBinding::from_value(raw)) {
                map.insert(action, binding);
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingObject {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DataAccessObject for RecordingObject {
        fn has_method(&self, method: &str) -> bool {
            method != "missing"
        }

        async fn invoke(&self, method: &str, request: DataRequest) -> Result<Value> {
            self.calls.lock().unwrap().push(method.to_string());
            Ok(json!({"method": method, "entity": request.entity}))
        }
    }

    fn full_map() -> IndexMap<Action, MethodBinding> {
        IndexMap::from([
            (Action::FindMany, "find".into()),
            (Action::FindById, "findById".into()),
            (Action::CreateOne, "createNewFor".into()),
            (Action::UpdateOne, "updateFor".into()),
            (Action::DeleteOne, "deleteFor".into()),
            (Action::Save, MethodBinding::Unsupported),
        ])
    }

    #[test]
    fn test_method_binding_from_value() {
        assert_eq!(
            MethodBinding::from_value(&json!(false)),
            Some(MethodBinding::Unsupported)
        );
        assert_eq!(
            MethodBinding::from_value(&json!("find")),
            Some(MethodBinding::Method("find".to_string()))
        );
        assert_eq!(MethodBinding::from_value(&json!("")), None);
        assert_eq!(MethodBinding::from_value(&json!(true)), None);
        assert_eq!(MethodBinding::from_value(&json!(1)), None);
    }

    #[test]
    fn test_resolve_interface_complete() {
        let resolved = resolve_interface(&full_map()).unwrap();
        assert_eq!(resolved.len(), Action::ALL.len());
        assert_eq!(resolved, full_map());
    }

    #[test]
    fn test_resolve_interface_reports_every_missing_action() {
        let partial = IndexMap::from([
            (Action::FindMany, MethodBinding::from("find")),
            (Action::DeleteOne, MethodBinding::from("")),
        ]);
        let missing = resolve_interface(&partial).unwrap_err();
        assert_eq!(
            missing,
            vec![
                Action::FindById,
                Action::CreateOne,
                Action::UpdateOne,
                Action::DeleteOne,
                Action::Save
            ]
        );
    }

    #[test]
    fn test_interface_from_value_ignores_unknown_keys() {
        let map = interface_from_value(&json!({
            "findMany": "find",
            "save": false,
            "upsert": "upsert",
            "findById": 7
        }));
        assert_eq!(map.len(), 2);
        assert_eq!(map[&Action::Save], MethodBinding::Unsupported);
    }

    #[tokio::test]
    async fn test_dispatch_object_uses_interface_names() {
        let object = Arc::new(RecordingObject {
            calls: Mutex::new(vec![]),
        });
        let module = DataAccessModule::Object(object.clone());
        let interface = full_map();

        let result = module
            .dispatch(Some(&interface), DataRequest::new("users", Action::CreateOne))
            .await
            .unwrap();
        assert_eq!(result["method"], "createNewFor");

        let err = module
            .dispatch(Some(&interface), DataRequest::new("users", Action::Save))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotImplemented(_)));
        assert_eq!(object.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_object_without_interface_uses_action_key() {
        let module = DataAccessModule::object(RecordingObject {
            calls: Mutex::new(vec![]),
        });
        let result = module
            .dispatch(None, DataRequest::new("users", Action::FindMany))
            .await
            .unwrap();
        assert_eq!(result["method"], "findMany");
    }

    #[tokio::test]
    async fn test_dispatch_callable_receives_action() {
        let module = DataAccessModule::callable(|req: DataRequest| async move {
            Ok(json!({"action": req.action.key()}))
        });
        let result = module
            .dispatch(None, DataRequest::new("comments", Action::DeleteOne))
            .await
            .unwrap();
        assert_eq!(result["action"], "deleteOne");
    }

    #[tokio::test]
    async fn test_dispatch_maps_collaborator_errors() {
        let module = DataAccessModule::callable(|_req: DataRequest| async move {
            Err::<Value, _>(anyhow::Error::new(ApiError::BadRequest("bad body".into())))
        });
        let err = module
            .dispatch(None, DataRequest::new("comments", Action::CreateOne))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
