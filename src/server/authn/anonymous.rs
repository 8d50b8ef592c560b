use actix_web::HttpRequest;
use anyhow::Result;

use super::{Authenticator, AuthnResponse, UserInfo};

pub const ANONYMOUS_USER: &str = "system:anonymous";
pub const GROUP_UNAUTHENTICATED: &str = "system:unauthenticated";

/// Authenticator that provides anonymous access when no other authentication is available.
///
/// This authenticator acts as a fallback mechanism in the authentication chain.
/// If a user is already authenticated, it preserves their identity.
/// Otherwise, it creates an anonymous user.
pub struct AnonymousAuthenticator;

impl AnonymousAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

impl Authenticator for AnonymousAuthenticator {
    fn authenticate_request(
        &self,
        _req: &HttpRequest,
        user: Option<UserInfo>,
    ) -> Result<AuthnResponse> {
        if let Some(user) = user {
            return Ok(AuthnResponse::Ok(user));
        }

        Ok(AuthnResponse::Ok(UserInfo {
            name: String::from(ANONYMOUS_USER),
            uid: None,
            groups: vec![String::from(GROUP_UNAUTHENTICATED)],
            extra: Default::default(),
        }))
    }
}
