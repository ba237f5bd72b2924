pub mod config;
pub mod metrics;
pub mod protocol;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use server::{HmpiServer, HttpRequest, HttpResponse};
