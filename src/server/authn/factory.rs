use std::path::Path;
use std::{fs, io};

use anyhow::{bail, Context, Result};
use log::{info, warn};

use super::anonymous::AnonymousAuthenticator;
use super::bearer_token::BearerTokenAuthenticator;
use super::chain::ChainAuthenticator;
use super::config::AuthnConfig;
use super::token::config::TokenConfig;
use super::token::jwt::JwtTokenValidator;
use super::token::static_token::StaticTokenValidator;
use super::token::{ChainTokenValidator, UnionTokenValidator};
use super::union::UnionAuthenticator;
use super::{to_middleware, Middleware};

/// Factory for building the authentication middleware based on configuration.
///
/// The chain is built in the following order:
/// 1. Bearer token authentication (static tokens, then JWT)
/// 2. Anonymous authentication (if enabled in config)
pub struct AuthnFactory;

impl AuthnFactory {
    pub fn new() -> Self {
        Self
    }

    /// Returns `None` when authentication is disabled, the caller then falls
    /// back to the always-admit authenticator.
    pub fn build_middleware(&self, cfg: &AuthnConfig) -> Result<Option<Middleware>> {
        let chain = match self.build_authenticator(cfg)? {
            Some(chain) => chain,
            None => return Ok(None),
        };
        Ok(Some(to_middleware(chain)))
    }

    pub fn build_authenticator(&self, cfg: &AuthnConfig) -> Result<Option<ChainAuthenticator>> {
        if !cfg.enabled {
            warn!("Authentication disabled, every request is served as the superuser");
            return Ok(None);
        }

        let mut authenticators = Vec::new();

        let validator = self
            .build_token_validator(&cfg.token)
            .context("init token validator")?;
        if !validator.is_empty() {
            let token_auth = BearerTokenAuthenticator::new(validator);
            authenticators.push(UnionAuthenticator::BearerToken(token_auth));
        }

        if cfg.allow_anonymous {
            info!("Anonymous authentication is enabled");
            let anonymous_auth = AnonymousAuthenticator::new();
            authenticators.push(UnionAuthenticator::Anonymous(anonymous_auth));
        }

        if authenticators.is_empty() {
            bail!("authentication is enabled but no authentication method is configured");
        }

        Ok(Some(ChainAuthenticator::new(authenticators)))
    }

    fn build_token_validator(&self, cfg: &TokenConfig) -> Result<ChainTokenValidator> {
        let mut validators = Vec::new();

        if !cfg.static_tokens.is_empty() {
            let validator = StaticTokenValidator::new(cfg.static_tokens.clone())?;
            validators.push(UnionTokenValidator::Static(validator));
        }

        if let Some(public_key) = Self::read_public_key(&cfg.public_key_path)? {
            let validator =
                JwtTokenValidator::new(&public_key, &cfg.issuer, cfg.audience.as_deref())?;
            validators.push(UnionTokenValidator::Jwt(validator));
        } else {
            info!(
                "Token public key '{}' not found, jwt authentication disabled",
                cfg.public_key_path
            );
        }

        Ok(ChainTokenValidator::new(validators))
    }

    fn read_public_key(path: impl AsRef<Path>) -> Result<Option<Vec<u8>>> {
        match fs::read(path.as_ref()) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).context("read token public key"),
        }
    }
}
