//! In-memory data access for entities without a custom database

use crate::core::action::Action;
use crate::core::data_access::{DataAccessObject, DataRequest};
use crate::core::error::ApiError;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// In-memory record store answering every catalog action
///
/// Records are JSON objects keyed by the string form of their identifier
/// field. Uses RwLock for thread-safe access.
#[derive(Clone)]
pub struct InMemoryDataAccess {
    records: Arc<RwLock<IndexMap<String, Value>>>,
}

impl InMemoryDataAccess {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find_many(&self, request: &DataRequest) -> Result<Value> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let matches = records
            .values()
            .filter(|record| {
                request
                    .query
                    .iter()
                    .all(|(field, expected)| {
                        field_as_string(record, field).as_deref() == Some(expected.as_str())
                    })
            })
            .cloned()
            .collect();
        Ok(Value::Array(matches))
    }

    fn find_by_id(&self, id: &str) -> Result<Value> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(records.get(id).cloned().unwrap_or(Value::Null))
    }

    fn create_one(&self, request: DataRequest) -> Result<Value> {
        let (id, record) = identified_record(&request)?;
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if records.contains_key(&id) {
            return Err(ApiError::BadRequest(format!(
                "{} [{}] already exists",
                request.entity, id
            ))
            .into());
        }
        records.insert(id, record.clone());
        Ok(record)
    }

    fn update_one(&self, id: &str, request: DataRequest) -> Result<Value> {
        let changes = body_object(&request)?;
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let Some(Value::Object(existing)) = records.get_mut(id) else {
            return Ok(Value::Null);
        };
        for (field, value) in changes {
            if field != request.identifier_field {
                existing.insert(field, value);
            }
        }
        Ok(Value::Object(existing.clone()))
    }

    fn delete_one(&self, id: &str) -> Result<Value> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(records.shift_remove(id).unwrap_or(Value::Null))
    }

    fn save(&self, request: DataRequest) -> Result<Value> {
        let (id, record) = identified_record(&request)?;
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        records.insert(id, record.clone());
        Ok(record)
    }
}

impl Default for InMemoryDataAccess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataAccessObject for InMemoryDataAccess {
    fn has_method(&self, method: &str) -> bool {
        Action::parse_key(method).is_some()
    }

    async fn invoke(&self, method: &str, request: DataRequest) -> Result<Value> {
        let action = Action::parse_key(method)
            .ok_or_else(|| anyhow!("Unknown data access method [{}]", method))?;

        match action {
            Action::FindMany => self.find_many(&request),
            Action::FindById => self.find_by_id(&required_id(&request)?),
            Action::CreateOne => self.create_one(request),
            Action::UpdateOne => {
                let id = required_id(&request)?;
                self.update_one(&id, request)
            }
            Action::DeleteOne => self.delete_one(&required_id(&request)?),
            Action::Save => self.save(request),
        }
    }
}

fn required_id(request: &DataRequest) -> Result<String> {
    request.id.clone().ok_or_else(|| {
        ApiError::BadRequest(format!("action [{}] requires an identifier", request.action)).into()
    })
}

fn body_object(request: &DataRequest) -> Result<Map<String, Value>> {
    match &request.body {
        Some(Value::Object(map)) => Ok(map.clone()),
        _ => Err(ApiError::BadRequest("request body must be a JSON object".to_string()).into()),
    }
}

/// Body with its identifier resolved, generating one when absent
fn identified_record(request: &DataRequest) -> Result<(String, Value)> {
    let mut record = body_object(request)?;
    let id = match record.get(&request.identifier_field).and_then(scalar_to_string) {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            record.insert(request.identifier_field.clone(), Value::String(id.clone()));
            id
        }
    };
    Ok((id, Value::Object(record)))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field_as_string(record: &Value, field: &str) -> Option<String> {
    record.get(field).and_then(scalar_to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(action: Action, id: Option<&str>, body: Option<Value>) -> DataRequest {
        let mut req = DataRequest::new("comments", action);
        req.id = id.map(str::to_string);
        req.body = body;
        req
    }

    #[tokio::test]
    async fn test_create_and_find_by_id() {
        let store = InMemoryDataAccess::new();
        let created = store
            .invoke("createOne", request(Action::CreateOne, None, Some(json!({"text": "hi"}))))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());

        let found = store
            .invoke("findById", request(Action::FindById, Some(&id), None))
            .await
            .unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_create_duplicate_is_bad_request() {
        let store = InMemoryDataAccess::new();
        let body = json!({"id": 1, "text": "hi"});
        store
            .invoke("createOne", request(Action::CreateOne, None, Some(body.clone())))
            .await
            .unwrap();
        let err = store
            .invoke("createOne", request(Action::CreateOne, None, Some(body)))
            .await
            .unwrap_err();
        assert!(matches!(
            ApiError::from_anyhow(err),
            ApiError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_find_many_filters_by_query() {
        let store = InMemoryDataAccess::new();
        for (id, author) in [("1", "ada"), ("2", "bob"), ("3", "ada")] {
            store
                .invoke(
                    "save",
                    request(Action::Save, None, Some(json!({"id": id, "author": author}))),
                )
                .await
                .unwrap();
        }

        let mut req = request(Action::FindMany, None, None);
        req.query.insert("author".to_string(), "ada".to_string());
        let found = store.invoke("findMany", req).await.unwrap();
        assert_eq!(found.as_array().unwrap().len(), 2);

        let all = store
            .invoke("findMany", request(Action::FindMany, None, None))
            .await
            .unwrap();
        assert_eq!(all.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_merges_fields_and_keeps_identifier() {
        let store = InMemoryDataAccess::new();
        store
            .invoke("save", request(Action::Save, None, Some(json!({"id": "a", "n": 1}))))
            .await
            .unwrap();

        let updated = store
            .invoke(
                "updateOne",
                request(Action::UpdateOne, Some("a"), Some(json!({"id": "b", "m": 2}))),
            )
            .await
            .unwrap();
        assert_eq!(updated, json!({"id": "a", "n": 1, "m": 2}));

        let missing = store
            .invoke("updateOne", request(Action::UpdateOne, Some("zz"), Some(json!({}))))
            .await
            .unwrap();
        assert!(missing.is_null());
    }

    #[tokio::test]
    async fn test_delete_returns_removed_record() {
        let store = InMemoryDataAccess::new();
        store
            .invoke("save", request(Action::Save, None, Some(json!({"id": "a"}))))
            .await
            .unwrap();

        let removed = store
            .invoke("deleteOne", request(Action::DeleteOne, Some("a"), None))
            .await
            .unwrap();
        assert_eq!(removed["id"], "a");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_custom_identifier_field() {
        let store = InMemoryDataAccess::new();
        let mut req = request(Action::CreateOne, None, Some(json!({"key": "u1"})));
        req.identifier_field = "key".to_string();
        store.invoke("createOne", req).await.unwrap();

        let found = store
            .invoke("findById", request(Action::FindById, Some("u1"), None))
            .await
            .unwrap();
        assert_eq!(found["key"], "u1");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let store = InMemoryDataAccess::new();
        assert!(!store.has_method("upsert"));
        assert!(
            store
                .invoke("upsert", request(Action::Save, None, None))
                .await
                .is_err()
        );
    }
}
