use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

use super::static_token::StaticToken;

/// Token configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenConfig {
    /// Path to the RSA public key (PEM format) that verifies identity tokens.
    /// Default: {config_path}/pki/token_public.pem
    /// When the file does not exist, JWT validation is disabled.
    #[serde(default = "TokenConfig::default_public_key_path")]
    pub public_key_path: String,

    /// Required `iss` claim of identity tokens.
    #[serde(default = "TokenConfig::default_issuer")]
    pub issuer: String,

    /// Required `aud` claim of identity tokens. Not checked when unset.
    #[serde(default)]
    pub audience: Option<String>,

    /// Fixed bearer tokens, checked before JWT validation.
    #[serde(default)]
    pub static_tokens: Vec<StaticToken>,
}

impl CommonConfig for TokenConfig {
    fn default() -> Self {
        Self {
            public_key_path: Self::default_public_key_path(),
            issuer: Self::default_issuer(),
            audience: None,
            static_tokens: vec![],
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.public_key_path = expandenv("public_key_path", &self.public_key_path)?;
        if self.public_key_path.is_empty() {
            let path = ps.pki_path.join("token_public.pem");
            self.public_key_path = format!("{}", path.display());
        }

        if self.issuer.is_empty() {
            bail!("token issuer should not be empty");
        }

        if let Some(audience) = self.audience.as_ref() {
            if audience.is_empty() {
                bail!("token audience should not be empty when set");
            }
        }

        for entry in self.static_tokens.iter_mut() {
            entry.token = expandenv("static_tokens.token", &entry.token)?;
        }

        Ok(())
    }
}

impl TokenConfig {
    pub fn default_public_key_path() -> String {
        String::new()
    }

    pub fn default_issuer() -> String {
        String::from("kubegate")
    }
}
