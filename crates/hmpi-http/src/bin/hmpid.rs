use std::io;

use hmpi_http::{HmpiServer, ServerConfig};
use tracing_subscriber::EnvFilter;

fn main() -> io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hmpi_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = ServerConfig::from_env()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let server = HmpiServer::new(config);
    server
        .validate()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    server.serve_http()
}
