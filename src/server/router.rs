use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::http::header::ACCEPT;
use actix_web::web::Payload;
use actix_web::{HttpMessage, HttpRequest, HttpResponse};
use async_trait::async_trait;

use super::handlers::api::API_VERSION;
use super::handlers::Handler;

/// Path segments that belong to the upstream control plane API.
const PROXY_ROOTS: [&str; 4] = ["api", "apis", "openapi", "version"];

/// The named handler slots composed into the final router.
pub struct Handlers {
    /// Unmatched routes
    pub next: Arc<dyn Handler>,
    /// Typed resource API
    pub k8s_resource: Arc<dyn Handler>,
    /// Raw upstream proxy
    pub k8s_proxy: Arc<dyn Handler>,
    /// API root listing
    pub api_root: Arc<dyn Handler>,
}

/// Builds a router from the handler slots, replacing [`routes`].
pub type RouterFunc = Box<dyn FnOnce(Handlers) -> Arc<dyn Handler>>;

/// Variables captured from the matched route, stored in the request
/// extensions for the selected handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteVars(BTreeMap<&'static str, String>);

impl RouteVars {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &'static str, value: &str) {
        self.0.insert(key, value.to_string());
    }

    pub fn from_request(req: &HttpRequest) -> Self {
        req.extensions().get::<RouteVars>().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Resource,
    Proxy,
    ApiRoot,
    Next,
}

/// Default route table.
pub fn routes(handlers: Handlers) -> Arc<dyn Handler> {
    Arc::new(Router { handlers })
}

struct Router {
    handlers: Handlers,
}

impl Router {
    fn route(req: &HttpRequest) -> (Slot, RouteVars) {
        let mut vars = RouteVars::default();
        let segments: Vec<&str> = req
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let first = match segments.first() {
            Some(first) => *first,
            None => {
                let accept = req
                    .headers()
                    .get(ACCEPT)
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or("");
                if accept.contains("json") {
                    return (Slot::ApiRoot, vars);
                }
                return (Slot::Next, vars);
            }
        };

        if PROXY_ROOTS.contains(&first) {
            return (Slot::Proxy, vars);
        }

        if first != API_VERSION {
            return (Slot::Next, vars);
        }

        let slot = match segments[1..] {
            [] => Slot::ApiRoot,
            [type_] => {
                vars.set("type", type_);
                Slot::Resource
            }
            [type_, name_or_ns] => {
                vars.set("type", type_);
                vars.set("nameorns", name_or_ns);
                Slot::Resource
            }
            [type_, namespace, name] => {
                vars.set("type", type_);
                vars.set("namespace", namespace);
                vars.set("name", name);
                Slot::Resource
            }
            [type_, namespace, name, link] => {
                vars.set("type", type_);
                vars.set("namespace", namespace);
                vars.set("name", name);
                vars.set("link", link);
                Slot::Resource
            }
            _ => Slot::Next,
        };
        (slot, vars)
    }
}

#[async_trait(?Send)]
impl Handler for Router {
    async fn handle(&self, req: HttpRequest, payload: Payload) -> HttpResponse {
        let (slot, vars) = Self::route(&req);
        req.extensions_mut().insert(vars);

        let handler = match slot {
            Slot::Resource => &self.handlers.k8s_resource,
            Slot::Proxy => &self.handlers.k8s_proxy,
            Slot::ApiRoot => &self.handlers.api_root,
            Slot::Next => &self.handlers.next,
        };
        handler.handle(req, payload).await
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    fn route(req: TestRequest) -> (Slot, RouteVars) {
        Router::route(&req.to_http_request())
    }

    #[test]
    fn test_route() {
        let (slot, _) = route(
            TestRequest::get()
                .uri("/")
                .insert_header(("Accept", "application/json")),
        );
        assert_eq!(slot, Slot::ApiRoot);

        let (slot, _) =
            route(TestRequest::get().uri("/").insert_header(("Accept", "text/html")));
        assert_eq!(slot, Slot::Next);

        let (slot, _) = route(TestRequest::get().uri("/v1"));
        assert_eq!(slot, Slot::ApiRoot);

        let (slot, vars) = route(TestRequest::get().uri("/v1/pods"));
        assert_eq!(slot, Slot::Resource);
        assert_eq!(vars.get("type"), Some("pods"));

        let (slot, vars) = route(TestRequest::get().uri("/v1/nodes/worker-1/"));
        assert_eq!(slot, Slot::Resource);
        assert_eq!(vars.get("nameorns"), Some("worker-1"));

        let (slot, vars) = route(TestRequest::get().uri("/v1/pods/default/nginx"));
        assert_eq!(slot, Slot::Resource);
        assert_eq!(vars.get("namespace"), Some("default"));
        assert_eq!(vars.get("name"), Some("nginx"));

        let (slot, vars) = route(TestRequest::get().uri("/v1/pods/default/nginx/log"));
        assert_eq!(slot, Slot::Resource);
        assert_eq!(vars.get("link"), Some("log"));

        let (slot, _) = route(TestRequest::get().uri("/v1/a/b/c/d/e"));
        assert_eq!(slot, Slot::Next);

        for path in ["/api", "/api/v1/pods", "/apis/apps/v1", "/openapi/v2", "/version"] {
            let (slot, _) = route(TestRequest::get().uri(path));
            assert_eq!(slot, Slot::Proxy, "{path}");
        }

        let (slot, _) = route(TestRequest::get().uri("/dashboard/index.html"));
        assert_eq!(slot, Slot::Next);
    }
}
