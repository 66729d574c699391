use std::path::PathBuf;

use serde::Deserialize;

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory uploads are spooled to before they reach storage.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Largest accepted upload body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// How long to wait for the garbage collector to stop during shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    /// Charge quotas to the first `X-Forwarded-For` entry instead of the
    /// peer address. Only enable behind a proxy that sets the header.
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            temp_dir: default_temp_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
            trust_proxy: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    3002
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from(".tmp")
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_shutdown_timeout() -> u64 {
    10
}

/// Log output configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_owned()
}
