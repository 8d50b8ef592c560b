use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{type_} '{id}' not found")]
    NotFound { type_: String, id: String },

    #[error("{type_} '{id}' already exists")]
    AlreadyExists { type_: String, id: String },

    #[error("invalid object: {0}")]
    Invalid(String),

    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

/// Storage behind the typed resource API. Objects are JSON documents keyed by
/// type and id (`name` or `namespace/name`).
pub trait ResourceStore: Send + Sync {
    /// Lists objects of a type ordered by id, optionally within one namespace.
    fn list(&self, type_: &str, namespace: Option<&str>) -> Result<Vec<(String, Value)>, StoreError>;

    fn get(&self, type_: &str, id: &str) -> Result<Value, StoreError>;

    fn create(&self, type_: &str, id: &str, obj: Value) -> Result<Value, StoreError>;

    fn update(&self, type_: &str, id: &str, obj: Value) -> Result<Value, StoreError>;

    /// Applies a JSON merge patch (RFC 7386) to an existing object.
    fn patch(&self, type_: &str, id: &str, patch: Value) -> Result<Value, StoreError>;

    fn delete(&self, type_: &str, id: &str) -> Result<Value, StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(type_: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            type_: type_.to_string(),
            id: id.to_string(),
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
        StoreError::Unavailable(e.to_string())
    }
}

impl ResourceStore for MemoryStore {
    fn list(&self, type_: &str, namespace: Option<&str>) -> Result<Vec<(String, Value)>, StoreError> {
        let objects = self.objects.read().map_err(Self::poisoned)?;
        let objects = match objects.get(type_) {
            Some(objects) => objects,
            None => return Ok(vec![]),
        };
        let prefix = namespace.map(|ns| format!("{ns}/"));
        Ok(objects
            .iter()
            .filter(|(id, _)| match prefix.as_ref() {
                Some(prefix) => id.starts_with(prefix.as_str()),
                None => true,
            })
            .map(|(id, obj)| (id.clone(), obj.clone()))
            .collect())
    }

    fn get(&self, type_: &str, id: &str) -> Result<Value, StoreError> {
        let objects = self.objects.read().map_err(Self::poisoned)?;
        objects
            .get(type_)
            .and_then(|objects| objects.get(id))
            .cloned()
            .ok_or_else(|| Self::not_found(type_, id))
    }

    fn create(&self, type_: &str, id: &str, obj: Value) -> Result<Value, StoreError> {
        let mut objects = self.objects.write().map_err(Self::poisoned)?;
        let objects = objects.entry(type_.to_string()).or_default();
        if objects.contains_key(id) {
            return Err(StoreError::AlreadyExists {
                type_: type_.to_string(),
                id: id.to_string(),
            });
        }
        objects.insert(id.to_string(), obj.clone());
        Ok(obj)
    }

    fn update(&self, type_: &str, id: &str, obj: Value) -> Result<Value, StoreError> {
        let mut objects = self.objects.write().map_err(Self::poisoned)?;
        let current = objects
            .get_mut(type_)
            .and_then(|objects| objects.get_mut(id))
            .ok_or_else(|| Self::not_found(type_, id))?;
        *current = obj.clone();
        Ok(obj)
    }

    fn patch(&self, type_: &str, id: &str, patch: Value) -> Result<Value, StoreError> {
        if !patch.is_object() {
            return Err(StoreError::Invalid(String::from("patch must be a json object")));
        }
        let mut objects = self.objects.write().map_err(Self::poisoned)?;
        let current = objects
            .get_mut(type_)
            .and_then(|objects| objects.get_mut(id))
            .ok_or_else(|| Self::not_found(type_, id))?;
        merge_patch(current, patch);
        Ok(current.clone())
    }

    fn delete(&self, type_: &str, id: &str) -> Result<Value, StoreError> {
        let mut objects = self.objects.write().map_err(Self::poisoned)?;
        objects
            .get_mut(type_)
            .and_then(|objects| objects.remove(id))
            .ok_or_else(|| Self::not_found(type_, id))
    }
}

/// RFC 7386: `null` removes a member, objects merge recursively, anything
/// else replaces.
pub fn merge_patch(target: &mut Value, patch: Value) {
    let patch = match patch {
        Value::Object(patch) => patch,
        patch => {
            *target = patch;
            return;
        }
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(&key);
                continue;
            }
            merge_patch(target.entry(key).or_insert(Value::Null), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();

        store
            .create("pods", "default/nginx", json!({"metadata": {"name": "nginx"}}))
            .unwrap();
        store
            .create("pods", "kube-system/dns", json!({"metadata": {"name": "dns"}}))
            .unwrap();
        assert!(matches!(
            store.create("pods", "default/nginx", json!({})),
            Err(StoreError::AlreadyExists { .. })
        ));

        let all = store.list("pods", None).unwrap();
        let ids: Vec<_> = all.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["default/nginx", "kube-system/dns"]);

        let default = store.list("pods", Some("default")).unwrap();
        assert_eq!(default.len(), 1);
        assert!(store.list("nodes", None).unwrap().is_empty());

        let updated = store
            .update("pods", "default/nginx", json!({"metadata": {"name": "nginx"}, "spec": 1}))
            .unwrap();
        assert_eq!(updated["spec"], 1);
        assert!(matches!(
            store.update("pods", "default/missing", json!({})),
            Err(StoreError::NotFound { .. })
        ));

        let patched = store
            .patch("pods", "default/nginx", json!({"spec": null, "status": {"phase": "Running"}}))
            .unwrap();
        assert_eq!(
            patched,
            json!({"metadata": {"name": "nginx"}, "status": {"phase": "Running"}})
        );
        assert!(matches!(
            store.patch("pods", "default/nginx", json!([1])),
            Err(StoreError::Invalid(_))
        ));

        let deleted = store.delete("pods", "default/nginx").unwrap();
        assert_eq!(deleted["metadata"]["name"], "nginx");
        assert!(store.get("pods", "default/nginx").is_err());
        assert!(store.delete("pods", "default/nginx").is_err());
    }

    #[test]
    fn test_merge_patch() {
        let mut target = json!({"a": "b", "c": {"d": "e", "f": "g"}});
        merge_patch(&mut target, json!({"a": "z", "c": {"f": null}}));
        assert_eq!(target, json!({"a": "z", "c": {"d": "e"}}));

        let mut target = json!({"a": ["b"]});
        merge_patch(&mut target, json!({"a": "c"}));
        assert_eq!(target, json!({"a": "c"}));

        let mut target = json!("text");
        merge_patch(&mut target, json!({"a": {"b": "c"}}));
        assert_eq!(target, json!({"a": {"b": "c"}}));
    }
}
