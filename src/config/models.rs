//! Configuration data structures for wiretap.
//!
//! These types map directly to JSON (also TOML / YAML) configuration files. They are
//! intentionally serde-friendly and include defaults so a generated config is runnable
//! as-is once `target_url` points at the real upstream.
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the proxy: where to listen, where to forward, and how long to wait.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Base URL of the upstream service, e.g. "http://localhost:1234".
    /// A trailing slash is tolerated; the request path is appended to it.
    pub target_url: String,
    /// Seconds allowed for establishing the upstream TCP connection.
    /// Fractional values are accepted (e.g. 0.5).
    pub connect_timeout_secs: f64,
    /// Seconds allowed for waiting on the upstream response.
    /// Applied to the response head and again to draining the body.
    pub read_timeout_secs: f64,
    /// Address the proxy listens on.
    pub host: String,
    /// Port the proxy listens on.
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:1234".to_string(),
            connect_timeout_secs: 2.0,
            read_timeout_secs: 5.0,
            host: "0.0.0.0".to_string(),
            port: 8888,
        }
    }
}

impl ProxyConfig {
    /// Connect timeout as a `Duration`.
    ///
    /// Assumes a validated config (see `ProxyConfigValidator`); the validator
    /// rejects non-finite and non-positive values before this conversion runs.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout_secs)
    }

    /// Read timeout as a `Duration`. Same validation caveat as `connect_timeout`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.read_timeout_secs)
    }

    /// The `host:port` string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Target base URL with any trailing slash removed, ready for path concatenation.
    pub fn target_base(&self) -> &str {
        self.target_url.trim_end_matches('/')
    }
}
