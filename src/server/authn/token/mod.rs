pub mod config;
pub mod jwt;
pub mod static_token;

use anyhow::{bail, Result};

use super::UserInfo;

use jwt::JwtTokenValidator;
use static_token::StaticTokenValidator;

pub trait TokenValidator: Send + Sync {
    fn validate_token(&self, token: &str) -> Result<UserInfo>;
}

pub enum UnionTokenValidator {
    Jwt(JwtTokenValidator),
    Static(StaticTokenValidator),
}

impl TokenValidator for UnionTokenValidator {
    fn validate_token(&self, token: &str) -> Result<UserInfo> {
        match self {
            UnionTokenValidator::Jwt(v) => v.validate_token(token),
            UnionTokenValidator::Static(v) => v.validate_token(token),
        }
    }
}

/// Tries each validator in order, the first one accepting the token wins.
pub struct ChainTokenValidator {
    validators: Vec<UnionTokenValidator>,
}

impl ChainTokenValidator {
    pub fn new(validators: Vec<UnionTokenValidator>) -> Self {
        Self { validators }
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl TokenValidator for ChainTokenValidator {
    fn validate_token(&self, token: &str) -> Result<UserInfo> {
        let mut last_err = None;
        for validator in self.validators.iter() {
            match validator.validate_token(token) {
                Ok(user) => return Ok(user),
                Err(e) => last_err = Some(e),
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => bail!("no token validator configured"),
        }
    }
}
