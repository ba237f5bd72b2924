use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:3001";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("HMPID_TRANSPORT must be http, got {0:?}")]
    UnsupportedTransport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub cors_origin: String,
    pub max_body_bytes: usize,
    pub read_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_HTTP_ADDR.to_string(),
            cors_origin: "*".to_string(),
            max_body_bytes: 64 * 1024,
            read_timeout: Duration::from_millis(5_000),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let transport = env_string("HMPID_TRANSPORT").unwrap_or_else(|| "http".to_string());
        if !transport.eq_ignore_ascii_case("http") {
            return Err(ConfigError::UnsupportedTransport(transport));
        }

        let defaults = Self::default();
        Ok(Self {
            addr: env_string("HMPI_HTTP_ADDR").unwrap_or(defaults.addr),
            cors_origin: env_string("HMPI_CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            max_body_bytes: env_usize(
                "HMPI_MAX_BODY_BYTES",
                defaults.max_body_bytes,
                1024,
                1024 * 1024,
            ),
            read_timeout: Duration::from_millis(env_u64("HMPI_READ_TIMEOUT_MS", 5_000, 100, 60_000)),
        })
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

fn env_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}
