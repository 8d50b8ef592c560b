use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::super::UserInfo;
use super::TokenValidator;

/// One entry of the static token table.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StaticToken {
    pub token: String,

    pub user: String,

    #[serde(default)]
    pub uid: Option<String>,

    #[serde(default)]
    pub groups: Vec<String>,
}

/// Validates bearer tokens against a fixed table loaded from the config.
pub struct StaticTokenValidator {
    tokens: HashMap<String, UserInfo>,
}

impl StaticTokenValidator {
    pub fn new(entries: Vec<StaticToken>) -> Result<Self> {
        let mut tokens = HashMap::with_capacity(entries.len());
        for entry in entries {
            if entry.token.is_empty() {
                bail!("static token for user '{}' is empty", entry.user);
            }
            if entry.user.is_empty() {
                bail!("static token without user name");
            }
            let user = UserInfo {
                name: entry.user,
                uid: entry.uid,
                groups: entry.groups,
                extra: Default::default(),
            };
            if tokens.insert(entry.token, user).is_some() {
                bail!("duplicate static token");
            }
        }
        Ok(Self { tokens })
    }
}

impl TokenValidator for StaticTokenValidator {
    fn validate_token(&self, token: &str) -> Result<UserInfo> {
        match self.tokens.get(token) {
            Some(user) => Ok(user.clone()),
            None => bail!("unknown static token"),
        }
    }
}
