use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{expandenv, CommonConfig, PathSet};

/// Connection to the upstream control plane.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpstreamConfig {
    /// Base url of the control plane API, e.g. `https://127.0.0.1:6443`.
    #[serde(default = "UpstreamConfig::default_server")]
    pub server: String,

    /// Bearer token of the gateway's own identity. It needs the
    /// `impersonate` permission when authentication is enabled.
    #[serde(default)]
    pub token: String,

    /// PEM bundle of CAs trusted for the upstream server certificate.
    /// Default: {config_path}/pki/upstream_ca.pem, if it exists.
    #[serde(default)]
    pub ca_path: String,

    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    #[serde(default = "UpstreamConfig::default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl CommonConfig for UpstreamConfig {
    fn default() -> Self {
        Self {
            server: Self::default_server(),
            token: String::new(),
            ca_path: String::new(),
            insecure_skip_tls_verify: false,
            connect_timeout_secs: Self::default_connect_timeout_secs(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.server = expandenv("server", &self.server)?;
        let url = Url::parse(&self.server)
            .with_context(|| format!("parse upstream server '{}'", self.server))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("upstream server scheme should be http or https");
        }
        if url.query().is_some() {
            bail!("upstream server should not have a query");
        }

        self.token = expandenv("token", &self.token)?;

        self.ca_path = expandenv("ca_path", &self.ca_path)?;
        if self.ca_path.is_empty() {
            let path = ps.pki_path.join("upstream_ca.pem");
            if path.exists() {
                self.ca_path = format!("{}", path.display());
            }
        }

        if self.connect_timeout_secs == 0 {
            bail!("connect_timeout_secs should be greater than 0");
        }

        Ok(())
    }
}

impl UpstreamConfig {
    pub fn default_server() -> String {
        String::from("https://127.0.0.1:6443")
    }

    pub fn default_connect_timeout_secs() -> u64 {
        10
    }
}
