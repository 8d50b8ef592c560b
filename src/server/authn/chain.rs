use actix_web::HttpRequest;
use anyhow::Result;

use super::union::UnionAuthenticator;
use super::{Authenticator, AuthnResponse, UserInfo};

/// Chain of authenticators that processes authentication requests sequentially.
///
/// Each authenticator in the chain can:
/// - Pass through (Continue) to the next authenticator
/// - Authenticate the user (Ok) and pass to next authenticator for additional processing
/// - Reject the authentication (Unauthenticated) and stop the chain
///
/// The chain succeeds if any authenticator succeeds and no subsequent authenticator rejects.
/// The last successful authentication result is returned.
pub struct ChainAuthenticator {
    pub(super) authenticators: Vec<UnionAuthenticator>,
}

impl ChainAuthenticator {
    pub fn new(authenticators: Vec<UnionAuthenticator>) -> Self {
        Self { authenticators }
    }
}

impl Authenticator for ChainAuthenticator {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        mut user: Option<UserInfo>,
    ) -> Result<AuthnResponse> {
        for authenticator in self.authenticators.iter() {
            let old_user = user.take();
            match authenticator.authenticate_request(req, old_user.clone())? {
                AuthnResponse::Ok(new_user) => user = Some(new_user),
                AuthnResponse::Continue => user = old_user,
                AuthnResponse::Unauthenticated => return Ok(AuthnResponse::Unauthenticated),
            }
        }
        match user {
            Some(user) => Ok(AuthnResponse::Ok(user)),
            None => Ok(AuthnResponse::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use crate::server::authn::anonymous::ANONYMOUS_USER;
    use crate::server::authn::bearer_token::BearerTokenAuthenticator;
    use crate::server::authn::token::static_token::{StaticToken, StaticTokenValidator};
    use crate::server::authn::token::{ChainTokenValidator, UnionTokenValidator};
    use crate::server::authn::AnonymousAuthenticator;

    use super::*;

    fn token_auth() -> UnionAuthenticator {
        let validator = StaticTokenValidator::new(vec![StaticToken {
            token: "alice-token".to_string(),
            user: "alice".to_string(),
            uid: None,
            groups: vec![],
        }])
        .unwrap();
        let validator = ChainTokenValidator::new(vec![UnionTokenValidator::Static(validator)]);
        UnionAuthenticator::BearerToken(BearerTokenAuthenticator::new(validator))
    }

    #[test]
    fn test_chain() {
        let chain = ChainAuthenticator::new(vec![
            token_auth(),
            UnionAuthenticator::Anonymous(AnonymousAuthenticator::new()),
        ]);

        // Test anonymous fallback
        let req = TestRequest::default().to_http_request();
        match chain.authenticate_request(&req, None).unwrap() {
            AuthnResponse::Ok(user) => assert_eq!(user.name, ANONYMOUS_USER),
            _ => panic!("expected anonymous user"),
        }

        // Test valid token auth
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer alice-token"))
            .to_http_request();
        match chain.authenticate_request(&req, None).unwrap() {
            AuthnResponse::Ok(user) => assert_eq!(user.name, "alice"),
            _ => panic!("expected authenticated user"),
        }

        // Invalid credentials stop the chain before the anonymous fallback
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer mallory-token"))
            .to_http_request();
        let resp = chain.authenticate_request(&req, None).unwrap();
        assert!(matches!(resp, AuthnResponse::Unauthenticated));

        // Without a fallback, missing credentials leave the chain undecided
        let chain = ChainAuthenticator::new(vec![token_auth()]);
        let req = TestRequest::default().to_http_request();
        let resp = chain.authenticate_request(&req, None).unwrap();
        assert!(matches!(resp, AuthnResponse::Continue));
    }
}
