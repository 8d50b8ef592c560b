use actix_web::HttpRequest;
use anyhow::{bail, Result};
use log::debug;

use super::token::TokenValidator;
use super::{Authenticator, AuthnResponse, UserInfo, GROUP_AUTHENTICATED};

pub struct BearerTokenAuthenticator<T: TokenValidator> {
    validator: T,
}

impl<T: TokenValidator> BearerTokenAuthenticator<T> {
    pub fn new(validator: T) -> Self {
        Self { validator }
    }
}

impl<T: TokenValidator> Authenticator for BearerTokenAuthenticator<T> {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        _user: Option<UserInfo>,
    ) -> Result<AuthnResponse> {
        let auth = match req.headers().get("Authorization") {
            Some(auth) => match auth.to_str() {
                Ok(auth) => auth.trim(),
                Err(_) => return Ok(AuthnResponse::Continue),
            },
            None => return Ok(AuthnResponse::Continue),
        };

        if auth.is_empty() {
            return Ok(AuthnResponse::Continue);
        }

        let mut iter = auth.split_whitespace();
        match iter.next() {
            Some(bearer) if bearer.eq_ignore_ascii_case("bearer") => {}
            _ => return Ok(AuthnResponse::Unauthenticated),
        }

        let token = match iter.next() {
            Some(token) => token,
            None => return Ok(AuthnResponse::Unauthenticated),
        };

        let mut user = match self.validator.validate_token(token) {
            Ok(user) => user,
            Err(e) => {
                debug!("Validate bearer token failed: {e:#}");
                return Ok(AuthnResponse::Unauthenticated);
            }
        };
        if user.name.is_empty() {
            bail!("empty user identifier in token");
        }

        if !user.in_group(GROUP_AUTHENTICATED) {
            user.groups.push(String::from(GROUP_AUTHENTICATED));
        }

        Ok(AuthnResponse::Ok(user))
    }
}
