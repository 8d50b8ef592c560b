pub mod config;
pub mod registry;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::authn::UserInfo;

pub const VERB_LIST: &str = "list";
pub const VERB_GET: &str = "get";
pub const VERB_CREATE: &str = "create";
pub const VERB_UPDATE: &str = "update";
pub const VERB_PATCH: &str = "patch";
pub const VERB_DELETE: &str = "delete";

pub const ALL_VERBS: [&str; 6] = [
    VERB_LIST,
    VERB_GET,
    VERB_CREATE,
    VERB_UPDATE,
    VERB_PATCH,
    VERB_DELETE,
];

/// Type id of the synthetic schema describing the API root.
pub const API_ROOT_TYPE: &str = "apiRoot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub nullable: bool,
}

/// Definition of one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub id: String,

    #[serde(rename = "pluralName")]
    pub plural_name: String,

    #[serde(default)]
    pub namespaced: bool,

    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,

    /// Verbs the caller may use on this type. In the registry these are the
    /// verbs the type supports at all.
    pub verbs: BTreeSet<String>,
}

impl Schema {
    pub fn allows(&self, verb: &str) -> bool {
        self.verbs.contains(verb)
    }

    /// HTTP methods usable on a single resource, derived from the verbs.
    pub fn resource_methods(&self) -> Vec<&'static str> {
        let mut methods = vec![];
        if self.allows(VERB_GET) {
            methods.push("GET");
        }
        if self.allows(VERB_UPDATE) {
            methods.push("PUT");
        }
        if self.allows(VERB_PATCH) {
            methods.push("PATCH");
        }
        if self.allows(VERB_DELETE) {
            methods.push("DELETE");
        }
        methods
    }

    /// HTTP methods usable on the collection, derived from the verbs.
    pub fn collection_methods(&self) -> Vec<&'static str> {
        let mut methods = vec![];
        if self.allows(VERB_LIST) {
            methods.push("GET");
        }
        if self.allows(VERB_CREATE) {
            methods.push("POST");
        }
        methods
    }
}

/// The schemas one identity may act on, keyed by schema id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaView {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaView {
    pub fn new(schemas: impl IntoIterator<Item = Schema>) -> Self {
        Self {
            schemas: schemas.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    /// Looks a schema up by id or plural name.
    pub fn lookup(&self, name: &str) -> Option<&Schema> {
        if let Some(schema) = self.schemas.get(name) {
            return Some(schema);
        }
        self.schemas.values().find(|s| s.plural_name == name)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Resolves the schemas visible to an identity.
///
/// Called once per request from any number of server workers at the same
/// time.
#[async_trait]
pub trait SchemaFactory: Send + Sync {
    async fn schemas(&self, user: &UserInfo) -> Result<Arc<SchemaView>>;
}
