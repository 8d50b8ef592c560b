use std::sync::Arc;

use actix_web::web::Payload;
use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use log::{debug, error};

use crate::server::handlers::Handler;
use crate::server::response::{self, Response};

use super::{with_user, Authenticator, AuthnResponse};

/// Handler produced by an authentication [`super::Middleware`].
///
/// The wrapped handler only runs after the authenticator admitted the
/// request, with the resolved identity stored in the request extensions.
pub struct AuthnHandler {
    authn: Arc<dyn Authenticator>,
    next: Arc<dyn Handler>,
}

impl AuthnHandler {
    pub fn new(authn: Arc<dyn Authenticator>, next: Arc<dyn Handler>) -> Self {
        Self { authn, next }
    }
}

#[async_trait(?Send)]
impl Handler for AuthnHandler {
    async fn handle(&self, req: HttpRequest, payload: Payload) -> HttpResponse {
        let resp = match self.authn.authenticate_request(&req, None) {
            Ok(resp) => resp,
            Err(e) => {
                error!("Authentication failed: {e:#}");
                return Response::error(response::AUTHN_ERROR).into();
            }
        };

        let user = match resp {
            AuthnResponse::Ok(user) => user,
            AuthnResponse::Continue => {
                debug!("No credentials for {} {}", req.method(), req.path());
                return Response::unauthenticated("Credentials are required").into();
            }
            AuthnResponse::Unauthenticated => {
                debug!("Rejected credentials for {} {}", req.method(), req.path());
                return Response::unauthenticated("Invalid credentials").into();
            }
        };

        with_user(&req, user);
        self.next.handle(req, payload).await
    }
}
