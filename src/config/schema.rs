//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the dispatch server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Directory served when no handler resolves.
    pub static_root: PathBuf,

    /// Session store and checkpoint settings.
    pub session: SessionConfig,

    /// Login redirect policy.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            static_root: PathBuf::from("dist"),
            session: SessionConfig::default(),
            auth: AuthConfig::default(),
            timeouts: TimeoutConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// TLS configuration. Serving refuses to start without it.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Checkpoint file. `None` (or empty) disables persistence.
    pub dump_path: Option<PathBuf>,

    /// Interval between periodic checkpoints in milliseconds.
    pub checkpoint_interval_ms: u64,

    /// Name of the cookie carrying the session id.
    pub cookie_name: String,

    /// Validity window of the session cookie, reissued on every request.
    pub cookie_ttl_secs: u64,

    /// Length of freshly generated session ids.
    pub id_length: usize,

    /// Keep a client-presented id that is not in the store instead of
    /// minting a fresh one.
    pub adopt_unknown_ids: bool,

    /// Evict sessions idle for longer than this. `None` disables eviction.
    pub idle_timeout_secs: Option<u64>,
}

impl SessionConfig {
    /// Checkpoint path, treating an empty path as unset.
    pub fn dump_path(&self) -> Option<&std::path::Path> {
        self.dump_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_millis(self.checkpoint_interval_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dump_path: None,
            checkpoint_interval_ms: 1000,
            cookie_name: "sessionid".to_string(),
            cookie_ttl_secs: 15 * 60,
            id_length: 24,
            adopt_unknown_ids: false,
            idle_timeout_secs: None,
        }
    }
}

/// Login redirect policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Handler name that new or anonymous sessions may reach.
    pub login_handler: String,

    /// Redirect target for sessions that must log in first.
    pub login_location: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_handler: "Login".to_string(),
            login_location: "/Login".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// Unset means handlers may run as long as they need.
    pub request_secs: Option<u64>,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: None,
            shutdown_grace_secs: 5,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes buffered for request-aware handlers.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
