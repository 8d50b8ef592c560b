use actix_web::HttpRequest;
use anyhow::Result;

use super::{Authenticator, AuthnResponse, UserInfo, GROUP_AUTHENTICATED, GROUP_MASTERS};

/// Name of the fixed identity produced by [`AlwaysAdmin`].
pub const ADMIN_USER: &str = "admin";

/// Authenticator that admits every request as the superuser.
///
/// Only used when the embedder supplies no authentication, in which case the
/// upstream trusts the gateway's own credential and no impersonation happens.
pub struct AlwaysAdmin;

impl AlwaysAdmin {
    pub fn new() -> Self {
        Self
    }

    pub fn user() -> UserInfo {
        UserInfo {
            name: String::from(ADMIN_USER),
            uid: None,
            groups: vec![
                String::from(GROUP_MASTERS),
                String::from(GROUP_AUTHENTICATED),
            ],
            extra: Default::default(),
        }
    }
}

impl Authenticator for AlwaysAdmin {
    fn authenticate_request(
        &self,
        _req: &HttpRequest,
        _user: Option<UserInfo>,
    ) -> Result<AuthnResponse> {
        Ok(AuthnResponse::Ok(Self::user()))
    }
}
