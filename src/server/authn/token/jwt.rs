use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::super::UserInfo;
use super::TokenValidator;

/// Claims carried by identity tokens, the registered ones follow RFC 7519.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub nbf: usize,
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub extra: BTreeMap<String, Vec<String>>,
}

pub struct JwtTokenValidator {
    key: DecodingKey,
    issuer: String,
    audience: Option<String>,
}

impl JwtTokenValidator {
    pub fn new(public_key: &[u8], issuer: &str, audience: Option<&str>) -> Result<Self> {
        let key = match DecodingKey::from_rsa_pem(public_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA public key for jwt token validation failed: {e}"),
        };
        Ok(Self {
            key,
            issuer: issuer.to_string(),
            audience: audience.map(String::from),
        })
    }
}

impl TokenValidator for JwtTokenValidator {
    fn validate_token(&self, token: &str) -> Result<UserInfo> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "nbf", "sub"]);
        validation.validate_nbf = true;
        match self.audience.as_ref() {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let claims = match decode::<Claims>(token, &self.key, &validation) {
            Ok(data) => data.claims,
            Err(e) => bail!("validate jwt token failed: {e}"),
        };

        if claims.sub.is_empty() {
            bail!("validate jwt token failed: empty subject");
        }

        let now = Utc::now().timestamp() as usize;
        if now >= claims.exp {
            bail!("validate jwt token failed: token expired");
        }

        if now < claims.nbf {
            bail!("validate jwt token failed: token not yet valid");
        }

        Ok(UserInfo {
            name: claims.sub,
            uid: claims.uid,
            groups: claims.groups,
            extra: claims.extra,
        })
    }
}
