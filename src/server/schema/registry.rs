use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::server::authn::UserInfo;

use super::{Schema, SchemaFactory, SchemaView};

/// Every schema known to the process. Built once at startup and shared
/// read-only afterwards.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: Vec<Schema>,
}

impl SchemaRegistry {
    pub fn new(schemas: Vec<Schema>) -> Result<Self> {
        let mut ids = HashSet::with_capacity(schemas.len());
        for schema in schemas.iter() {
            if schema.id.is_empty() {
                bail!("schema id is required");
            }
            if schema.plural_name.is_empty() {
                bail!("schema '{}' plural name is required", schema.id);
            }
            if !ids.insert(schema.id.as_str()) {
                bail!("duplicate schema '{}'", schema.id);
            }
        }
        Ok(Self { schemas })
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }
}

/// Grants verbs on resources to users and groups. "*" matches anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRule {
    #[serde(default)]
    pub users: HashSet<String>,

    #[serde(default)]
    pub groups: HashSet<String>,

    pub resources: HashSet<String>,

    pub verbs: HashSet<String>,
}

impl AccessRule {
    pub fn applies_to(&self, user: &UserInfo) -> bool {
        if self.users.contains("*") || self.users.contains(&user.name) {
            return true;
        }
        if self.groups.contains("*") {
            return true;
        }
        user.groups.iter().any(|g| self.groups.contains(g))
    }
}

/// Returns the verbs of `schema` granted by the rules that apply to the
/// user.
pub fn allowed_verbs(rules: &[AccessRule], user: &UserInfo, schema: &Schema) -> BTreeSet<String> {
    let mut verbs = BTreeSet::new();
    for rule in rules.iter() {
        if !rule.applies_to(user) {
            continue;
        }
        if !rule.resources.contains("*") && !rule.resources.contains(&schema.id) {
            continue;
        }
        for verb in schema.verbs.iter() {
            if rule.verbs.contains("*") || rule.verbs.contains(verb) {
                verbs.insert(verb.clone());
            }
        }
    }
    verbs
}

/// Schema factory filtering the registry with access rules.
pub struct RuleSchemaFactory {
    registry: Arc<SchemaRegistry>,
    rules: Vec<AccessRule>,
}

impl RuleSchemaFactory {
    pub fn new(registry: Arc<SchemaRegistry>, rules: Vec<AccessRule>) -> Self {
        Self { registry, rules }
    }
}

#[async_trait]
impl SchemaFactory for RuleSchemaFactory {
    async fn schemas(&self, user: &UserInfo) -> Result<Arc<SchemaView>> {
        let mut visible = Vec::new();
        for schema in self.registry.schemas() {
            let verbs = allowed_verbs(&self.rules, user, schema);
            if verbs.is_empty() {
                continue;
            }
            let mut schema = schema.clone();
            schema.verbs = verbs;
            visible.push(schema);
        }
        debug!("User '{}' can access {} schema(s)", user.name, visible.len());
        Ok(Arc::new(SchemaView::new(visible)))
    }
}
