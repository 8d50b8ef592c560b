pub mod api;
pub mod healthz;

use actix_web::web::Payload;
use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;

use super::response::Response;

/// An HTTP endpoint in the gateway.
///
/// Handler objects are shared between server workers, the futures they return
/// run on the worker that accepted the request.
#[async_trait(?Send)]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: HttpRequest, payload: Payload) -> HttpResponse;
}

/// Fallback used when the embedder does not supply a handler for unmatched
/// routes.
pub struct NotFoundHandler;

#[async_trait(?Send)]
impl Handler for NotFoundHandler {
    async fn handle(&self, req: HttpRequest, _payload: Payload) -> HttpResponse {
        Response::no_route(req.method().as_str(), req.path()).into()
    }
}
