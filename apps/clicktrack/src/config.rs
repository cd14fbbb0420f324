//! Server configuration.
//!
//! Built from the `serve` command line (see [`crate::cli::ServeArgs`]).

use clicktrack_core::cache::DEFAULT_CACHE_SIZE;
use clicktrack_core::pagination::DEFAULT_PER_PAGE;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// Runtime settings for the HTTP server and its task worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required on admin routes. `None` leaves them open.
    pub api_key: Option<String>,
    /// Externally visible origin, used for QR code links.
    pub base_url: String,
    pub per_page: usize,
    pub cache_size: usize,
    pub queue_capacity: usize,
    /// Attempts per task before it is dropped.
    pub max_attempts: u32,
    /// Delay before the first retry; grows linearly per attempt.
    pub retry_backoff: Duration,
    /// Requests per second across all clients. `0` disables the limit.
    pub rate_limit: u32,
    /// Origins allowed by CORS. `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            per_page: DEFAULT_PER_PAGE,
            cache_size: DEFAULT_CACHE_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            rate_limit: 0,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Socket address string the server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
