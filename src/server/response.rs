use actix_web::http::header::CONTENT_TYPE;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::Serialize;

use crate::types::response::{CommonResponse, MIME_TEXT};

pub const AUTHN_ERROR: &str = "Authentication failed";
pub const STORE_ERROR: &str = "Resource store error";
pub const UPSTREAM_ERROR: &str = "Upstream request failed";

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating common response types
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn not_found() -> Self {
        Self::err_response(StatusCode::NOT_FOUND, "Resource not found".to_string())
    }

    pub fn no_route(method: &str, path: &str) -> Self {
        Self::err_response(StatusCode::NOT_FOUND, format!("No route to {method} {path}"))
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        let message = format!("Bad request: {}", message.as_ref());
        Self::err_response(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthenticated(message: impl AsRef<str>) -> Self {
        let message = format!("Unauthenticated: {}", message.as_ref());
        Self::err_response(StatusCode::UNAUTHORIZED, message)
    }

    pub fn unauthorized(message: impl AsRef<str>) -> Self {
        let message = format!("Unauthorized: {}", message.as_ref());
        Self::err_response(StatusCode::FORBIDDEN, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::err_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    }

    pub fn conflict(message: impl AsRef<str>) -> Self {
        let message = format!("Conflict: {}", message.as_ref());
        Self::err_response(StatusCode::CONFLICT, message)
    }

    pub fn payload_too_large() -> Self {
        Self::err_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body is too large".to_string(),
        )
    }

    pub fn bad_gateway(message: &str) -> Self {
        let message = format!("Bad gateway: {message}");
        Self::err_response(StatusCode::BAD_GATEWAY, message)
    }

    pub fn error(message: &str) -> Self {
        let message = format!("Server error: {message}");
        Self::err_response(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Server error whose body is the raw error text. The status is fixed on
    /// the builder before any body bytes exist.
    pub fn error_text(message: impl Into<String>) -> Self {
        let mut resp = HttpResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR);
        resp.insert_header((CONTENT_TYPE, MIME_TEXT));
        Self {
            http_response: resp.body(message.into()),
        }
    }

    pub fn json<T: Serialize>(data: T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn created<T: Serialize>(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }

    fn with_status<T: Serialize>(status: StatusCode, data: T) -> Self {
        Self {
            http_response: HttpResponseBuilder::new(status).json(data),
        }
    }

    fn err_response(status: StatusCode, message: String) -> Self {
        let resp = CommonResponse {
            code: status.into(),
            message: Some(message),
        };
        Self {
            http_response: HttpResponseBuilder::new(status).json(resp),
        }
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}

impl From<HttpResponse> for Response {
    fn from(http_response: HttpResponse) -> Self {
        Self { http_response }
    }
}
