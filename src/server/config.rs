use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};
use crate::logs::LogsConfig;

use super::authn::config::AuthnConfig;
use super::proxy::config::UpstreamConfig;
use super::schema::config::SchemasConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,

    #[serde(default = "ServerConfig::default_ssl")]
    pub ssl: bool,

    #[serde(default = "ServerConfig::default_cert_path")]
    pub cert_path: String,

    #[serde(default = "ServerConfig::default_key_path")]
    pub key_path: String,

    #[serde(default = "ServerConfig::default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "ServerConfig::default_workers")]
    pub workers: u64,

    /// Limit for bodies read by the resource API. Proxied bodies are
    /// streamed and not limited.
    #[serde(default = "ServerConfig::default_payload_limit_mib")]
    pub payload_limit_mib: usize,

    #[serde(default = "LogsConfig::default")]
    pub logs: LogsConfig,

    #[serde(default = "AuthnConfig::default")]
    pub authn: AuthnConfig,

    #[serde(default = "UpstreamConfig::default")]
    pub upstream: UpstreamConfig,

    #[serde(default = "SchemasConfig::default")]
    pub schemas: SchemasConfig,
}

impl CommonConfig for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            ssl: Self::default_ssl(),
            cert_path: Self::default_cert_path(),
            key_path: Self::default_key_path(),
            keep_alive_secs: Self::default_keep_alive_secs(),
            workers: Self::default_workers(),
            payload_limit_mib: Self::default_payload_limit_mib(),
            logs: LogsConfig::default(),
            authn: AuthnConfig::default(),
            upstream: UpstreamConfig::default(),
            schemas: SchemasConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        self.cert_path = expandenv("cert_path", &self.cert_path)?;
        if self.cert_path.is_empty() {
            let path = ps.pki_path.join("server.crt");
            self.cert_path = format!("{}", path.display());
        }

        self.key_path = expandenv("key_path", &self.key_path)?;
        if self.key_path.is_empty() {
            let path = ps.pki_path.join("server.key");
            self.key_path = format!("{}", path.display());
        }

        if self.payload_limit_mib < Self::MIN_PAYLOAD_LIMIT_MIB {
            bail!(
                "payload_limit_mib must be greater than or equal to {}",
                Self::MIN_PAYLOAD_LIMIT_MIB
            );
        }
        if self.payload_limit_mib > Self::MAX_PAYLOAD_LIMIT_MIB {
            bail!(
                "payload_limit_mib must be less than or equal to {}",
                Self::MAX_PAYLOAD_LIMIT_MIB
            );
        }

        self.logs.complete(ps).context("logs")?;
        self.authn.complete(ps).context("authn")?;
        self.upstream.complete(ps).context("upstream")?;
        self.schemas.complete(ps).context("schemas")?;

        Ok(())
    }
}

impl ServerConfig {
    const MAX_PAYLOAD_LIMIT_MIB: usize = 10;
    const MIN_PAYLOAD_LIMIT_MIB: usize = 1;

    pub fn payload_limit_bytes(&self) -> usize {
        self.payload_limit_mib * 1024 * 1024
    }

    pub fn default_bind() -> String {
        String::from("127.0.0.1:9443")
    }

    pub fn default_ssl() -> bool {
        false
    }

    pub fn default_cert_path() -> String {
        String::new()
    }

    pub fn default_key_path() -> String {
        String::new()
    }

    pub fn default_keep_alive_secs() -> u64 {
        0
    }

    pub fn default_workers() -> u64 {
        0
    }

    pub fn default_payload_limit_mib() -> usize {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let toml = r#"
            bind = "0.0.0.0:9443"
            payload_limit_mib = 5

            [logs]
            level = "debug"

            [authn]
            allow_anonymous = true

            [upstream]
            server = "https://10.0.0.1:6443"
            token = "gateway-token"

            [[schemas.schemas]]
            id = "pod"
            pluralName = "pods"
            namespaced = true
            verbs = ["list", "get"]

            [[schemas.rules]]
            groups = ["dev"]
            resources = ["pod"]
            verbs = ["list"]
        "#;

        let mut cfg: ServerConfig = toml::from_str(toml).unwrap();
        cfg.complete(&PathSet::new_test()).unwrap();

        assert_eq!(cfg.bind, "0.0.0.0:9443");
        assert_eq!(cfg.payload_limit_bytes(), 5 * 1024 * 1024);
        assert_eq!(cfg.logs.level, "debug");
        assert!(cfg.authn.enabled);
        assert!(cfg.authn.allow_anonymous);
        assert_eq!(cfg.upstream.token, "gateway-token");
        assert_eq!(cfg.schemas.schemas.len(), 1);
        assert_eq!(cfg.schemas.rules.len(), 1);
        assert!(cfg.cert_path.ends_with("server.crt"));
    }

    #[test]
    fn test_payload_limit() {
        let ps = PathSet::new_test();

        let mut cfg = ServerConfig::default();
        cfg.payload_limit_mib = 0;
        assert!(cfg.complete(&ps).is_err());

        let mut cfg = ServerConfig::default();
        cfg.payload_limit_mib = 11;
        assert!(cfg.complete(&ps).is_err());
    }
}
