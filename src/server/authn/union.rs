use actix_web::HttpRequest;
use anyhow::Result;

use super::anonymous::AnonymousAuthenticator;
use super::bearer_token::BearerTokenAuthenticator;
use super::token::ChainTokenValidator;
use super::{Authenticator, AuthnResponse, UserInfo};

/// Union type that combines different authenticator implementations.
pub enum UnionAuthenticator {
    /// Bearer token authentication using the Authorization header
    BearerToken(BearerTokenAuthenticator<ChainTokenValidator>),
    /// Anonymous access fallback
    Anonymous(AnonymousAuthenticator),
}

impl Authenticator for UnionAuthenticator {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        user: Option<UserInfo>,
    ) -> Result<AuthnResponse> {
        match self {
            UnionAuthenticator::BearerToken(auth) => auth.authenticate_request(req, user),
            UnionAuthenticator::Anonymous(auth) => auth.authenticate_request(req, user),
        }
    }
}
