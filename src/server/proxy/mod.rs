pub mod config;
pub mod impersonate;

use std::time::Duration;
use std::{fs, io};

use actix_web::http::{header, StatusCode};
use actix_web::web::{Bytes, Payload};
use actix_web::{HttpRequest, HttpResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use log::{debug, error, info};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Body, Certificate, Client, Method};
use tokio::sync::mpsc;

use crate::server::authn::{user_from, UserInfo};
use crate::server::handlers::Handler;
use crate::server::response::{self, Response};

use config::UpstreamConfig;
use impersonate::{impersonation_headers, is_impersonation_header};

/// Chunks of request body buffered between the inbound payload and the
/// upstream connection.
const BODY_CHANNEL_SIZE: usize = 16;

/// Connection scoped headers, never forwarded in either direction.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Reverse proxy to the upstream control plane.
///
/// The inbound credentials never reach the upstream: requests carry the
/// gateway's own token, plus the caller's identity as impersonation headers
/// when built with [`ProxyHandler::impersonating`].
pub struct ProxyHandler {
    client: Client,
    server: String,
    prefix: String,
    token: Option<HeaderValue>,
    impersonate: bool,
}

impl ProxyHandler {
    /// Forwards every request as the gateway's own identity.
    pub fn plain(prefix: &str, cfg: &UpstreamConfig) -> Result<Self> {
        Self::new(prefix, cfg, false)
    }

    /// Forwards every request on behalf of the authenticated caller.
    pub fn impersonating(prefix: &str, cfg: &UpstreamConfig) -> Result<Self> {
        Self::new(prefix, cfg, true)
    }

    fn new(prefix: &str, cfg: &UpstreamConfig, impersonate: bool) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .redirect(Policy::none());

        if !cfg.ca_path.is_empty() {
            let pem = fs::read(&cfg.ca_path)
                .with_context(|| format!("read upstream ca file '{}'", cfg.ca_path))?;
            let certs = Certificate::from_pem_bundle(&pem).context("parse upstream ca file")?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        if cfg.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().context("build upstream http client")?;

        let token = if cfg.token.is_empty() {
            None
        } else {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", cfg.token))
                .context("invalid upstream token")?;
            value.set_sensitive(true);
            Some(value)
        };

        info!(
            "Proxy to upstream '{}', impersonate: {impersonate}",
            cfg.server
        );
        Ok(Self {
            client,
            server: cfg.server.trim_end_matches('/').to_string(),
            prefix: prefix.trim_end_matches('/').to_string(),
            token,
            impersonate,
        })
    }

    fn upstream_url(&self, req: &HttpRequest) -> String {
        let path = req.path();
        let path = match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) if !self.prefix.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                rest
            }
            _ => path,
        };

        let mut url = format!("{}{path}", self.server);
        if !req.query_string().is_empty() {
            url.push('?');
            url.push_str(req.query_string());
        }
        url
    }

    fn request_headers(&self, req: &HttpRequest, user: Option<&UserInfo>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let has_body = has_body(req);
        for (name, value) in req.headers() {
            let name = name.as_str();
            if name == "authorization"
                || name == "host"
                || is_hop_by_hop(name)
                || is_impersonation_header(name)
                || (name == "content-length" && !has_body)
            {
                continue;
            }
            headers.append(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_bytes(value.as_bytes())?,
            );
        }

        if let Some(token) = self.token.as_ref() {
            headers.insert(reqwest::header::AUTHORIZATION, token.clone());
        }
        if let Some(user) = user {
            for (name, value) in impersonation_headers(user)?.iter() {
                headers.append(name.clone(), value.clone());
            }
        }
        Ok(headers)
    }

    async fn forward(
        &self,
        req: &HttpRequest,
        payload: Payload,
        headers: HeaderMap,
    ) -> Result<HttpResponse> {
        let url = self.upstream_url(req);
        let method = Method::from_bytes(req.method().as_str().as_bytes())?;
        debug!("Proxy {method} {url}");

        let mut builder = self.client.request(method, &url).headers(headers);
        if has_body(req) {
            builder = builder.body(stream_body(payload));
        }

        let resp = builder
            .send()
            .await
            .with_context(|| format!("send request to '{url}'"))?;

        let status = StatusCode::from_u16(resp.status().as_u16())?;
        let mut out = HttpResponse::build(status);
        for (name, value) in resp.headers() {
            let name = name.as_str();
            if is_hop_by_hop(name) || name == "content-length" {
                continue;
            }
            out.append_header((
                header::HeaderName::from_bytes(name.as_bytes())?,
                header::HeaderValue::from_bytes(value.as_bytes())?,
            ));
        }
        Ok(out.streaming(resp.bytes_stream()))
    }
}

#[async_trait(?Send)]
impl Handler for ProxyHandler {
    async fn handle(&self, req: HttpRequest, payload: Payload) -> HttpResponse {
        let user = match (self.impersonate, user_from(&req)) {
            (false, _) => None,
            (true, Some(user)) => Some(user),
            (true, None) => {
                return Response::unauthenticated("No identity to impersonate").into();
            }
        };

        // Nothing has been sent upstream yet.
        let headers = match self.request_headers(&req, user.as_ref()) {
            Ok(headers) => headers,
            Err(e) => {
                error!("Build upstream headers for {} failed: {e:#}", req.path());
                return Response::error("build upstream request").into();
            }
        };

        match self.forward(&req, payload, headers).await {
            Ok(resp) => resp,
            Err(e) => {
                error!("Proxy {} {} failed: {e:#}", req.method(), req.path());
                Response::bad_gateway(response::UPSTREAM_ERROR).into()
            }
        }
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name)
}

fn has_body(req: &HttpRequest) -> bool {
    let headers = req.headers();
    if headers.contains_key(header::TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|len| len > 0)
        .unwrap_or(false)
}

/// The inbound payload lives on the worker that accepted the request, so it
/// is pumped into a channel that the upstream connection reads from.
fn stream_body(mut payload: Payload) -> Body {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(BODY_CHANNEL_SIZE);
    actix_web::rt::spawn(async move {
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()));
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });

    let body = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    Body::wrap_stream(body)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use actix_web::test::TestRequest;

    use super::*;

    fn upstream() -> UpstreamConfig {
        UpstreamConfig {
            server: String::from("https://10.0.0.1:6443/"),
            token: String::from("gateway-token"),
            ca_path: String::new(),
            insecure_skip_tls_verify: false,
            connect_timeout_secs: 5,
        }
    }

    #[test]
    fn test_upstream_url() {
        let proxy = ProxyHandler::plain("", &upstream()).unwrap();
        let req = TestRequest::get()
            .uri("/api/v1/namespaces/default/pods?labelSelector=app%3Dweb&watch=false")
            .to_http_request();
        assert_eq!(
            proxy.upstream_url(&req),
            "https://10.0.0.1:6443/api/v1/namespaces/default/pods?labelSelector=app%3Dweb&watch=false"
        );

        let proxy = ProxyHandler::plain("/k8s/clusters/local", &upstream()).unwrap();
        let req = TestRequest::get()
            .uri("/k8s/clusters/local/version")
            .to_http_request();
        assert_eq!(proxy.upstream_url(&req), "https://10.0.0.1:6443/version");

        let req = TestRequest::get()
            .uri("/k8s/clusters/localhost/version")
            .to_http_request();
        assert_eq!(
            proxy.upstream_url(&req),
            "https://10.0.0.1:6443/k8s/clusters/localhost/version"
        );
    }

    #[test]
    fn test_plain_headers() {
        let proxy = ProxyHandler::plain("", &upstream()).unwrap();
        let req = TestRequest::get()
            .uri("/api")
            .insert_header(("Authorization", "Bearer caller-token"))
            .insert_header(("Impersonate-User", "mallory"))
            .insert_header(("Impersonate-Group", "system:masters"))
            .insert_header(("Connection", "keep-alive"))
            .insert_header(("Accept", "application/json"))
            .insert_header(("Content-Length", "0"))
            .to_http_request();

        let headers = proxy.request_headers(&req, None).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer gateway-token");
        assert_eq!(headers.get("accept").unwrap(), "application/json");
        assert!(headers.get("impersonate-user").is_none());
        assert!(headers.get("impersonate-group").is_none());
        assert!(headers.get("connection").is_none());
        assert!(headers.get("content-length").is_none());
        assert!(headers.get("host").is_none());
    }

    #[test]
    fn test_impersonating_headers() {
        let proxy = ProxyHandler::impersonating("", &upstream()).unwrap();
        let req = TestRequest::post()
            .uri("/api/v1/namespaces")
            .insert_header(("Authorization", "Bearer caller-token"))
            .insert_header(("Impersonate-User", "mallory"))
            .insert_header(("Content-Length", "2"))
            .to_http_request();
        let user = UserInfo {
            name: String::from("bob"),
            uid: None,
            groups: vec![String::from("dev"), String::from("system:authenticated")],
            extra: BTreeMap::from([(
                String::from("scopes"),
                vec![String::from("view"), String::from("edit")],
            )]),
        };

        let headers = proxy.request_headers(&req, Some(&user)).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer gateway-token");
        let users: Vec<_> = headers.get_all("impersonate-user").iter().collect();
        assert_eq!(users, vec!["bob"]);
        let groups: Vec<_> = headers.get_all("impersonate-group").iter().collect();
        assert_eq!(groups, vec!["dev", "system:authenticated"]);
        let scopes: Vec<_> = headers.get_all("impersonate-extra-scopes").iter().collect();
        assert_eq!(scopes, vec!["view", "edit"]);
        assert_eq!(headers.get("content-length").unwrap(), "2");
    }

    #[actix_web::test]
    async fn test_unrepresentable_identity() {
        let mut cfg = upstream();
        cfg.server = String::from("http://127.0.0.1:9");
        let proxy = ProxyHandler::impersonating("", &cfg).unwrap();
        let (req, mut payload) = TestRequest::get().uri("/api").to_http_parts();
        let user = UserInfo {
            name: String::from("bob"),
            uid: None,
            groups: vec![String::from("dev\u{7}")],
            extra: BTreeMap::new(),
        };
        crate::server::authn::with_user(&req, user);
        let payload = <Payload as actix_web::FromRequest>::from_request(&req, &mut payload)
            .await
            .unwrap();
        let resp = proxy.handle(req, payload).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_missing_identity() {
        let proxy = ProxyHandler::impersonating("", &upstream()).unwrap();
        let (req, mut payload) = TestRequest::get().uri("/api").to_http_parts();
        let payload = <Payload as actix_web::FromRequest>::from_request(&req, &mut payload)
            .await
            .unwrap();
        let resp = proxy.handle(req, payload).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_upstream_unreachable() {
        let mut cfg = upstream();
        // Nothing listens on the discard port.
        cfg.server = String::from("http://127.0.0.1:9");
        let proxy = ProxyHandler::plain("", &cfg).unwrap();
        let (req, mut payload) = TestRequest::get().uri("/version").to_http_parts();
        let payload = <Payload as actix_web::FromRequest>::from_request(&req, &mut payload)
            .await
            .unwrap();
        let resp = proxy.handle(req, payload).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
