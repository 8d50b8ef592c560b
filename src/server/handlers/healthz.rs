use actix_web::http::Method;
use actix_web::web::Payload;
use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use chrono::Local;

use crate::server::response::Response;
use crate::types::healthz::HealthzResponse;

use super::{Handler, NotFoundHandler};

/// Fallback for routes the gateway does not own: answers `GET /healthz`,
/// everything else is not found.
pub struct HealthzHandler;

impl HealthzHandler {
    const HEALTHZ_PATH: &str = "/healthz";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl Handler for HealthzHandler {
    async fn handle(&self, req: HttpRequest, payload: Payload) -> HttpResponse {
        if req.path() != Self::HEALTHZ_PATH {
            return NotFoundHandler.handle(req, payload).await;
        }
        if req.method() != Method::GET {
            return Response::method_not_allowed().into();
        }

        let local = Local::now();
        let offset = format!("{}", local.offset());
        let now = local.timestamp() as u64;
        let response = HealthzResponse {
            now,
            time_zone: offset,
            client_ip: req.connection_info().peer_addr().map(|a| a.to_string()),
            version: Some(env!("KUBEGATE_VERSION").to_string()),
        };
        Response::json(response).into()
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use actix_web::FromRequest;

    use super::*;

    async fn call(req: TestRequest) -> HttpResponse {
        let (req, mut payload) = req.to_http_parts();
        let payload = Payload::from_request(&req, &mut payload).await.unwrap();
        HealthzHandler::new().handle(req, payload).await
    }

    #[actix_web::test]
    async fn test_healthz() {
        let resp = call(TestRequest::get().uri("/healthz")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = call(TestRequest::post().uri("/healthz")).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        let resp = call(TestRequest::get().uri("/dashboard")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
