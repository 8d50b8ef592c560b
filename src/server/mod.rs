mod handlers;
mod operation;
mod response;
mod restful;
mod router;
mod urlbuilder;

pub mod authn;
pub mod config;
pub mod factory;
pub mod proxy;
pub mod resources;
pub mod schema;

pub use handlers::api::{api_root, k8s_api, new, ApiFunc, ApiServer, API_VERSION};
pub use handlers::healthz::HealthzHandler;
pub use handlers::{Handler, NotFoundHandler};
pub use operation::Operation;
pub use response::Response;
pub use router::{routes, Handlers, RouteVars, RouterFunc};
pub use urlbuilder::{UrlBuilder, HEADER_URL_PREFIX};
