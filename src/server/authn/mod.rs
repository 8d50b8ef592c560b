mod admin;
mod anonymous;
mod bearer_token;
mod middleware;
mod union;

pub mod chain;
pub mod config;
pub mod factory;
pub mod token;

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{HttpMessage, HttpRequest};
use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::handlers::Handler;

pub use admin::AlwaysAdmin;
pub use anonymous::AnonymousAuthenticator;
pub use bearer_token::BearerTokenAuthenticator;
pub use middleware::AuthnHandler;
pub use union::UnionAuthenticator;

/// Group every authenticated identity belongs to.
pub const GROUP_AUTHENTICATED: &str = "system:authenticated";
/// Group granted full access by the default access rules.
pub const GROUP_MASTERS: &str = "system:masters";

/// Trait for request authenticators.
///
/// Implementors of this trait can authenticate HTTP requests and optionally
/// chain with other authenticators to provide multiple authentication methods.
pub trait Authenticator: Send + Sync {
    /// Attempts to authenticate a request.
    ///
    /// # Arguments
    ///
    /// * `req` - The HTTP request to authenticate
    /// * `user` - Optional user info from previous authentication attempts
    ///
    /// # Returns
    ///
    /// * `Ok(AuthnResponse::Ok(user))` - Authentication successful with user info
    /// * `Ok(AuthnResponse::Continue)` - Authentication skipped, try next authenticator
    /// * `Ok(AuthnResponse::Unauthenticated)` - Authentication failed
    /// * `Err(_)` - Internal error during authentication
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        user: Option<UserInfo>,
    ) -> Result<AuthnResponse>;
}

/// Response from an authentication attempt.
#[derive(Debug)]
pub enum AuthnResponse {
    /// Authentication successful, contains authenticated user information
    Ok(UserInfo),
    /// Authentication skipped, should try next authenticator
    Continue,
    /// Authentication failed, should stop authentication chain
    Unauthenticated,
}

/// The identity of the caller of one request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub extra: BTreeMap<String, Vec<String>>,
}

impl UserInfo {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// Wraps a handler so that it only runs for authenticated requests.
pub type Middleware = Arc<dyn Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync>;

pub fn to_middleware<A>(authenticator: A) -> Middleware
where
    A: Authenticator + 'static,
{
    let authenticator: Arc<dyn Authenticator> = Arc::new(authenticator);
    Arc::new(move |next: Arc<dyn Handler>| -> Arc<dyn Handler> {
        Arc::new(AuthnHandler::new(authenticator.clone(), next))
    })
}

/// Returns the identity attached to the request by the authentication
/// middleware.
pub fn user_from(req: &HttpRequest) -> Option<UserInfo> {
    req.extensions().get::<UserInfo>().cloned()
}

pub fn with_user(req: &HttpRequest, user: UserInfo) {
    req.extensions_mut().insert(user);
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn test_user_context() {
        let req = TestRequest::default().to_http_request();
        assert!(user_from(&req).is_none());

        let user = UserInfo {
            name: "alice".to_string(),
            uid: None,
            groups: vec![GROUP_AUTHENTICATED.to_string()],
            extra: BTreeMap::new(),
        };
        with_user(&req, user.clone());
        assert_eq!(user_from(&req), Some(user));
    }
}
