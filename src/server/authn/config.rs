use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};

use super::token::config::TokenConfig;

/// Authentication configuration that controls various authentication mechanisms.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthnConfig {
    /// Whether callers must authenticate.
    /// Default: true
    ///
    /// WARNING: When disabled, every request is served as the superuser and
    /// proxied with the gateway's own upstream credential.
    #[serde(default = "AuthnConfig::default_enabled")]
    pub enabled: bool,

    /// Whether to allow anonymous access when no credentials are provided.
    /// Default: false
    #[serde(default = "AuthnConfig::default_allow_anonymous")]
    pub allow_anonymous: bool,

    /// Token-based authentication configuration.
    /// See TokenConfig for details.
    #[serde(default = "TokenConfig::default")]
    pub token: TokenConfig,
}

impl CommonConfig for AuthnConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allow_anonymous: Self::default_allow_anonymous(),
            token: TokenConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.token.complete(ps)?;
        Ok(())
    }
}

impl AuthnConfig {
    pub fn default_enabled() -> bool {
        true
    }

    pub fn default_allow_anonymous() -> bool {
        false
    }
}
