use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslMethod};

use crate::server::authn::factory::AuthnFactory;
use crate::server::handlers::api;
use crate::server::handlers::healthz::HealthzHandler;
use crate::server::handlers::Handler;
use crate::server::schema::registry::{RuleSchemaFactory, SchemaRegistry};

use super::config::ServerConfig;
use super::restful::{RestfulContext, RestfulServer};

pub struct ServerFactory {
    cfg: ServerConfig,
}

impl ServerFactory {
    pub fn new(cfg: ServerConfig) -> Self {
        Self { cfg }
    }

    pub fn build_server(&self) -> Result<RestfulServer> {
        let ssl = self.build_ssl()?;
        let ctx = self.build_context()?;

        let mut srv = RestfulServer::new(self.cfg.bind.clone(), ssl, ctx);
        if self.cfg.keep_alive_secs > 0 {
            srv.set_keep_alive_secs(self.cfg.keep_alive_secs);
        }
        if self.cfg.workers > 0 {
            srv.set_workers(self.cfg.workers);
        }

        Ok(srv)
    }

    pub fn build_ssl(&self) -> Result<Option<SslAcceptorBuilder>> {
        if !self.cfg.ssl {
            return Ok(None);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&self.cfg.key_path, openssl::ssl::SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&self.cfg.cert_path)
            .context("load ssl cert file")?;

        Ok(Some(builder))
    }

    pub fn build_context(&self) -> Result<Arc<RestfulContext>> {
        let registry = SchemaRegistry::new(self.cfg.schemas.schemas.clone())
            .context("init schema registry")?;
        info!("Loaded {} schemas", registry.schemas().len());
        let sf = RuleSchemaFactory::new(Arc::new(registry), self.cfg.schemas.rules.clone());

        let authn_factory = AuthnFactory::new();
        let authn = authn_factory
            .build_middleware(&self.cfg.authn)
            .context("init authenticator")?;

        let next: Arc<dyn Handler> = Arc::new(HealthzHandler::new());
        let (_, handler) = api::new(&self.cfg, Arc::new(sf), authn, Some(next), None)
            .context("init api handler")?;

        Ok(Arc::new(RestfulContext { handler }))
    }
}
