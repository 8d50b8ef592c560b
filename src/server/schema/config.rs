use std::collections::HashSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};
use crate::server::authn::GROUP_MASTERS;

use super::registry::AccessRule;
use super::{Schema, ALL_VERBS};

/// Schemas served by the resource API and the rules deciding who sees them.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchemasConfig {
    #[serde(default)]
    pub schemas: Vec<Schema>,

    /// Default: full access for the "system:masters" group.
    #[serde(default = "SchemasConfig::default_rules")]
    pub rules: Vec<AccessRule>,
}

impl CommonConfig for SchemasConfig {
    fn default() -> Self {
        Self {
            schemas: vec![],
            rules: Self::default_rules(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        for schema in self.schemas.iter() {
            for verb in schema.verbs.iter() {
                if !ALL_VERBS.contains(&verb.as_str()) {
                    bail!("schema '{}' has unknown verb '{verb}'", schema.id);
                }
            }
        }
        for rule in self.rules.iter() {
            if rule.users.is_empty() && rule.groups.is_empty() {
                bail!("access rule requires users or groups");
            }
            if rule.resources.is_empty() {
                bail!("access rule resources are required");
            }
            if rule.verbs.is_empty() {
                bail!("access rule verbs are required");
            }
        }
        Ok(())
    }
}

impl SchemasConfig {
    pub fn default_rules() -> Vec<AccessRule> {
        let all: HashSet<String> = [String::from("*")].into_iter().collect();
        vec![AccessRule {
            users: HashSet::new(),
            groups: [String::from(GROUP_MASTERS)].into_iter().collect(),
            resources: all.clone(),
            verbs: all,
        }]
    }
}
