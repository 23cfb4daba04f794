//! Server Configuration
//!
//! Read from the environment, with `.env` support.

use std::env;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_LOG_FILTER: &str = "weft=info,tower_http=info";
pub const DEFAULT_MAX_FORM_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the demo server binds to (`WEFT_ADDR`).
    pub addr: String,
    /// `tracing-subscriber` filter directive (`WEFT_LOG`, falling back to `RUST_LOG`).
    pub log_filter: String,
    /// Largest url-encoded body a route will read (`WEFT_MAX_FORM_BYTES`).
    pub max_form_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            max_form_bytes: DEFAULT_MAX_FORM_BYTES,
        }
    }
}

impl ServerConfig {
    /// Loads `.env` if present, then reads the environment over the defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            addr: lookup("WEFT_ADDR").unwrap_or(defaults.addr),
            log_filter: lookup("WEFT_LOG")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_filter),
            max_form_bytes: lookup("WEFT_MAX_FORM_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_form_bytes),
        }
    }
}
