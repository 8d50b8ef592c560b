use std::sync::Arc;

use actix_web::http::Method;
use actix_web::HttpRequest;

use super::authn::UserInfo;
use super::schema::SchemaView;
use super::urlbuilder::UrlBuilder;

/// Everything a handler needs to serve one resource API request.
///
/// Only built after the caller was authenticated and its schemas resolved.
/// The selection fields (`type_`, `name`, `namespace`, `link`, `action`) are
/// filled by an [`super::handlers::api::ApiFunc`] before the resource server
/// runs.
pub struct Operation {
    pub user: UserInfo,
    pub schemas: Arc<SchemaView>,
    pub url_builder: UrlBuilder,
    pub request: HttpRequest,

    pub method: Method,
    pub type_: String,
    pub name: String,
    pub namespace: String,
    pub link: String,
    pub action: String,
}

impl Operation {
    pub fn new(
        user: UserInfo,
        schemas: Arc<SchemaView>,
        url_builder: UrlBuilder,
        request: HttpRequest,
    ) -> Self {
        let method = request.method().clone();
        Self {
            user,
            schemas,
            url_builder,
            request,
            method,
            type_: String::new(),
            name: String::new(),
            namespace: String::new(),
            link: String::new(),
            action: String::new(),
        }
    }

    /// Reads a query parameter of the inbound request.
    pub fn query(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(self.request.query_string().as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Resource id: `namespace/name` or just `name`.
    pub fn id(&self) -> Option<String> {
        if self.name.is_empty() {
            return None;
        }
        if self.namespace.is_empty() {
            return Some(self.name.clone());
        }
        Some(format!("{}/{}", self.namespace, self.name))
    }
}
