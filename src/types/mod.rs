pub mod healthz;
pub mod response;
