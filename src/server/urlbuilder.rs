use std::sync::Arc;

use actix_web::HttpRequest;
use anyhow::{bail, Context, Result};
use url::Url;

use super::schema::{Schema, SchemaView};

/// Path prefix added in front of generated links, set by reverse proxies
/// that publish the gateway below a sub path.
pub const HEADER_URL_PREFIX: &str = "X-API-URL-Prefix";

/// Renders absolute links for one request.
///
/// The base comes from the connection info, which honours the `Forwarded`,
/// `X-Forwarded-Proto` and `X-Forwarded-Host` headers.
pub struct UrlBuilder {
    root: String,
    prefix: String,
    current: String,
    schemas: Arc<SchemaView>,
}

impl UrlBuilder {
    pub fn new_prefixed(req: &HttpRequest, schemas: Arc<SchemaView>, prefix: &str) -> Result<Self> {
        let (scheme, host) = {
            let info = req.connection_info();
            (info.scheme().to_string(), info.host().to_string())
        };
        if host.is_empty() {
            bail!("unable to determine request host for building urls");
        }

        let base = Url::parse(&format!("{scheme}://{host}"))
            .with_context(|| format!("invalid request host '{host}'"))?;
        if base.cannot_be_a_base() {
            bail!("request url '{base}' cannot be a base url");
        }

        let mut root = base.as_str().trim_end_matches('/').to_string();
        let url_prefix = req
            .headers()
            .get(HEADER_URL_PREFIX)
            .and_then(|h| h.to_str().ok())
            .map(|h| h.trim_matches('/'))
            .unwrap_or("");
        if !url_prefix.is_empty() {
            root.push('/');
            root.push_str(url_prefix);
        }

        let mut current = format!("{root}{}", req.path());
        if !req.query_string().is_empty() {
            current.push('?');
            current.push_str(req.query_string());
        }

        Ok(Self {
            root,
            prefix: prefix.trim_matches('/').to_string(),
            current,
            schemas,
        })
    }

    pub fn api_root(&self) -> String {
        if self.prefix.is_empty() {
            return self.root.clone();
        }
        format!("{}/{}", self.root, self.prefix)
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn collection(&self, schema: &Schema) -> String {
        format!("{}/{}", self.api_root(), schema.id)
    }

    /// Collection link for a type name, `None` when the type is not visible
    /// in this request.
    pub fn collection_by_type(&self, type_: &str) -> Option<String> {
        self.schemas.lookup(type_).map(|s| self.collection(s))
    }

    /// `id` is `name` for cluster scoped resources and `namespace/name` for
    /// namespaced ones.
    pub fn resource(&self, schema: &Schema, id: &str) -> String {
        format!("{}/{}", self.collection(schema), id)
    }

    /// Returns `url` with the pagination parameters replaced.
    pub fn marker(&self, url: &str, continue_token: Option<&str>, limit: usize) -> Result<String> {
        let mut url = Url::parse(url).with_context(|| format!("parse link '{url}'"))?;
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "continue" && k != "limit")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.extend_pairs(pairs);
            query.append_pair("limit", &limit.to_string());
            if let Some(token) = continue_token {
                query.append_pair("continue", token);
            }
        }
        Ok(url.to_string())
    }
}
