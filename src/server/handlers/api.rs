use std::sync::Arc;

use actix_web::web::Payload;
use actix_web::{HttpRequest, HttpResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{error, warn};

use crate::server::authn::{to_middleware, user_from, AlwaysAdmin, Middleware};
use crate::server::config::ServerConfig;
use crate::server::operation::Operation;
use crate::server::proxy::ProxyHandler;
use crate::server::resources::{MemoryStore, ResourceServer};
use crate::server::response::Response;
use crate::server::router::{routes, Handlers, RouteVars, RouterFunc};
use crate::server::schema::{SchemaFactory, API_ROOT_TYPE};
use crate::server::urlbuilder::UrlBuilder;

use super::{Handler, NotFoundHandler};

/// Path segment the typed resource API is served under.
pub const API_VERSION: &str = "v1";

/// Selects what an [`Operation`] targets before the resource server runs.
pub type ApiFunc = fn(&dyn SchemaFactory, &mut Operation);

/// Takes the resource selection from the matched route and the query.
///
/// `{nameorns}` is a namespace for namespaced types and a name otherwise.
pub fn k8s_api(_sf: &dyn SchemaFactory, op: &mut Operation) {
    let vars = RouteVars::from_request(&op.request);

    op.type_ = vars.get("type").unwrap_or_default().to_string();
    op.namespace = vars.get("namespace").unwrap_or_default().to_string();
    op.name = vars.get("name").unwrap_or_default().to_string();
    op.link = vars.get("link").unwrap_or_default().to_string();

    if let Some(name_or_ns) = vars.get("nameorns") {
        let namespaced = op
            .schemas
            .lookup(&op.type_)
            .map(|s| s.namespaced)
            .unwrap_or(false);
        if namespaced {
            op.namespace = name_or_ns.to_string();
        } else {
            op.name = name_or_ns.to_string();
        }
    }

    if let Some(action) = op.query("action") {
        op.action = action;
    }
    if op.link.is_empty() {
        if let Some(link) = op.query("link") {
            op.link = link;
        }
    }
}

pub fn api_root(_sf: &dyn SchemaFactory, op: &mut Operation) {
    op.type_ = API_ROOT_TYPE.to_string();
}

/// Builds operations for the typed resource API and hands them to the
/// resource server.
pub struct ApiServer {
    sf: Arc<dyn SchemaFactory>,
    server: Arc<ResourceServer>,
}

impl ApiServer {
    pub fn new(sf: Arc<dyn SchemaFactory>, server: Arc<ResourceServer>) -> Self {
        Self { sf, server }
    }

    /// Assembles the operation for an authenticated request. The returned
    /// response is final, the request must not reach any other handler.
    pub async fn common(&self, req: &HttpRequest) -> Result<Operation, Response> {
        let user = match user_from(req) {
            Some(user) => user,
            None => {
                warn!(
                    "Request {} {} reached the api without an identity",
                    req.method(),
                    req.path()
                );
                return Err(Response::unauthenticated("No identity attached to request"));
            }
        };

        let schemas = match self.sf.schemas(&user).await {
            Ok(schemas) => schemas,
            Err(e) => {
                error!("HTTP request failed: {e:#}");
                return Err(Response::error_text(format!("{e:#}")));
            }
        };

        let url_builder = match UrlBuilder::new_prefixed(req, schemas.clone(), API_VERSION) {
            Ok(builder) => builder,
            Err(e) => {
                error!("HTTP request failed: {e:#}");
                return Err(Response::error_text(format!("{e:#}")));
            }
        };

        Ok(Operation::new(user, schemas, url_builder, req.clone()))
    }

    pub fn api_handler(self: &Arc<Self>, api_func: Option<ApiFunc>) -> Arc<dyn Handler> {
        Arc::new(ApiHandler {
            api: self.clone(),
            api_func,
        })
    }
}

struct ApiHandler {
    api: Arc<ApiServer>,
    api_func: Option<ApiFunc>,
}

#[async_trait(?Send)]
impl Handler for ApiHandler {
    async fn handle(&self, req: HttpRequest, payload: Payload) -> HttpResponse {
        let mut op = match self.api.common(&req).await {
            Ok(op) => op,
            Err(resp) => return resp.into(),
        };
        if let Some(api_func) = self.api_func {
            api_func(self.api.sf.as_ref(), &mut op);
        }

        let body = match self.api.server.read_body(payload).await {
            Ok(body) => body,
            Err(resp) => return resp.into(),
        };
        self.api.server.handle(&op, body).into()
    }
}

/// Composes the gateway handler.
///
/// Without an authentication middleware every protected slot admits the
/// request as the superuser and the proxy forwards as the gateway itself.
/// With one, the proxy impersonates the authenticated caller.
pub fn new(
    cfg: &ServerConfig,
    sf: Arc<dyn SchemaFactory>,
    authn: Option<Middleware>,
    next: Option<Arc<dyn Handler>>,
    router_func: Option<RouterFunc>,
) -> Result<(Arc<ResourceServer>, Arc<dyn Handler>)> {
    let server = Arc::new(ResourceServer::new(
        Arc::new(MemoryStore::new()),
        cfg.payload_limit_bytes(),
    ));
    let api = Arc::new(ApiServer::new(sf, server.clone()));
    let next = next.unwrap_or_else(|| Arc::new(NotFoundHandler));

    let (authn, proxy): (Middleware, ProxyHandler) = match authn {
        Some(authn) => {
            let proxy = ProxyHandler::impersonating("", &cfg.upstream)
                .context("init impersonating proxy")?;
            (authn, proxy)
        }
        None => {
            let proxy = ProxyHandler::plain("", &cfg.upstream).context("init proxy")?;
            (to_middleware(AlwaysAdmin::new()), proxy)
        }
    };

    let proxy: Arc<dyn Handler> = Arc::new(proxy);
    let handlers = Handlers {
        next,
        k8s_resource: authn(api.api_handler(Some(k8s_api))),
        k8s_proxy: authn(proxy),
        api_root: authn(api.api_handler(Some(api_root))),
    };

    let handler = match router_func {
        Some(router_func) => router_func(handlers),
        None => routes(handlers),
    };
    Ok((server, handler))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::{web, App, HttpMessage};
    use anyhow::bail;

    use crate::config::CommonConfig;
    use crate::server::authn::{with_user, Authenticator, AuthnResponse, UserInfo};
    use crate::server::schema::tests::mock_schema;
    use crate::server::schema::{SchemaView, ALL_VERBS};

    use super::*;

    struct CountingFactory {
        calls: AtomicUsize,
        fail: bool,
        view: Arc<SchemaView>,
    }

    impl CountingFactory {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
                view: Arc::new(SchemaView::new(vec![
                    mock_schema("pods", true, &ALL_VERBS),
                    mock_schema("configmaps", true, &ALL_VERBS),
                ])),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SchemaFactory for CountingFactory {
        async fn schemas(&self, _user: &UserInfo) -> anyhow::Result<Arc<SchemaView>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("schema store unavailable");
            }
            Ok(self.view.clone())
        }
    }

    struct Alice;

    impl Authenticator for Alice {
        fn authenticate_request(
            &self,
            _req: &HttpRequest,
            _user: Option<UserInfo>,
        ) -> anyhow::Result<AuthnResponse> {
            Ok(AuthnResponse::Ok(alice()))
        }
    }

    fn alice() -> UserInfo {
        UserInfo {
            name: String::from("alice"),
            uid: None,
            groups: vec![],
            extra: BTreeMap::new(),
        }
    }

    fn api_server(sf: Arc<CountingFactory>) -> ApiServer {
        let server = Arc::new(ResourceServer::new(Arc::new(MemoryStore::new()), 1024));
        ApiServer::new(sf, server)
    }

    #[actix_web::test]
    async fn test_common() {
        let sf = CountingFactory::new(false);
        let api = api_server(sf.clone());

        let req = TestRequest::get()
            .uri("/v1/pods")
            .insert_header(("Host", "gate.local"))
            .to_http_request();
        with_user(&req, alice());

        let first = match api.common(&req).await {
            Ok(op) => op,
            Err(_) => panic!("operation not built"),
        };
        let second = match api.common(&req).await {
            Ok(op) => op,
            Err(_) => panic!("operation not built"),
        };
        assert_eq!(sf.calls(), 2);
        assert_eq!(first.user, alice());
        assert_eq!(*first.schemas, *sf.view);
        assert_eq!(first.schemas, second.schemas);
        assert_eq!(first.url_builder.api_root(), "http://gate.local/v1");
    }

    #[actix_web::test]
    async fn test_common_without_identity() {
        let sf = CountingFactory::new(false);
        let api = api_server(sf.clone());

        let req = TestRequest::get().uri("/v1/pods").to_http_request();
        let resp: HttpResponse = match api.common(&req).await {
            Ok(_) => panic!("operation built without identity"),
            Err(resp) => resp.into(),
        };
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(sf.calls(), 0);
    }

    #[actix_web::test]
    async fn test_schema_error() {
        let sf = CountingFactory::new(true);
        let mut cfg = ServerConfig::default();
        cfg.payload_limit_mib = 1;
        let (server, handler) =
            new(&cfg, sf.clone(), Some(to_middleware(Alice)), None, None).unwrap();

        let app = test::init_service(App::new().default_service(web::to(
            move |req: HttpRequest, payload: Payload| {
                let handler = handler.clone();
                async move { handler.handle(req, payload).await }
            },
        )))
        .await;

        let req = TestRequest::post()
            .uri("/v1/pods/default")
            .set_json(serde_json::json!({"metadata": {"name": "nginx"}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = test::read_body(resp).await;
        assert_eq!(body, "schema store unavailable");

        assert_eq!(sf.calls(), 1);
        assert!(server.store().list("pods", None).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_k8s_api() {
        let sf = CountingFactory::new(false);

        let view = Arc::new(SchemaView::new(vec![
            mock_schema("pod", true, &ALL_VERBS),
            mock_schema("node", false, &ALL_VERBS),
        ]));
        let operation = |uri: &str, vars: &[(&'static str, &str)]| {
            let req = TestRequest::get()
                .uri(uri)
                .insert_header(("Host", "gate.local"))
                .to_http_request();
            let mut route_vars = RouteVars::default();
            for (key, value) in vars {
                route_vars.set(*key, value);
            }
            req.extensions_mut().insert(route_vars);
            let builder = UrlBuilder::new_prefixed(&req, view.clone(), API_VERSION).unwrap();
            let mut op = Operation::new(alice(), view.clone(), builder, req);
            k8s_api(sf.as_ref(), &mut op);
            op
        };

        let op = operation("/v1/pod/default", &[("type", "pod"), ("nameorns", "default")]);
        assert_eq!(op.namespace, "default");
        assert_eq!(op.name, "");

        let op = operation("/v1/node/worker", &[("type", "node"), ("nameorns", "worker")]);
        assert_eq!(op.namespace, "");
        assert_eq!(op.name, "worker");
        assert_eq!(op.id().as_deref(), Some("worker"));

        let op = operation(
            "/v1/pod/default/nginx?action=restart",
            &[("type", "pod"), ("namespace", "default"), ("name", "nginx")],
        );
        assert_eq!(op.id().as_deref(), Some("default/nginx"));
        assert_eq!(op.action, "restart");
        assert_eq!(op.link, "");

        let mut op = operation("/v1", &[]);
        api_root(sf.as_ref(), &mut op);
        assert_eq!(op.type_, API_ROOT_TYPE);
    }
}
