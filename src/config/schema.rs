//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the FDO passport proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Supervised FDO server process.
    pub backend: BackendConfig,

    /// Passport service integration.
    pub passport: PassportConfig,

    /// Fixed identifiers used when payloads are not decoded.
    pub identifiers: IdentifierConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080"). Host names are resolved.
    pub bind_address: String,

    /// Largest request body the proxy will buffer before relaying.
    pub max_body_bytes: usize,

    /// Total time allowed for one relay, interceptors included.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 90,
        }
    }
}

impl ListenerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Supervised backend process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Executable to launch.
    pub program: String,

    /// Arguments; every `{port}` is replaced with `port`.
    pub args: Vec<String>,

    /// Working directory of the child process.
    pub working_dir: PathBuf,

    /// Host the backend listens on.
    pub host: String,

    /// Port the backend listens on.
    pub port: u16,

    /// Path probed until the backend reports ready.
    pub health_path: String,

    /// Upper bound for the readiness wait in seconds.
    pub ready_timeout_secs: u64,

    /// Fixed interval between readiness probes in milliseconds.
    pub poll_interval_ms: u64,

    /// Timeout of a single readiness probe in milliseconds.
    pub probe_timeout_ms: u64,

    /// Time between SIGTERM and SIGKILL on stop, in seconds.
    pub stop_grace_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            args: [
                "run",
                "./cmd/server",
                "-db",
                "./fdo-backend.db",
                "-http",
                "127.0.0.1:{port}",
                "-debug",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            working_dir: PathBuf::from("../go-fdo"),
            host: "127.0.0.1".to_string(),
            port: 8081,
            health_path: "/health".to_string(),
            ready_timeout_secs: 30,
            poll_interval_ms: 100,
            probe_timeout_ms: 1000,
            stop_grace_secs: 5,
        }
    }
}

impl BackendConfig {
    /// Arguments with the port placeholder substituted.
    pub fn resolved_args(&self) -> Vec<String> {
        let port = self.port.to_string();
        self.args.iter().map(|a| a.replace("{port}", &port)).collect()
    }

    /// `host:port` authority of the backend endpoint.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

/// Passport service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PassportConfig {
    /// Base URL of the product item passport service.
    pub product_base_url: Option<String>,

    /// Full URL of the commissioning passport create endpoint.
    pub commissioning_url: Option<String>,

    /// CA certificate (PEM) trusted for product passport lookups.
    pub ca_cert: Option<PathBuf>,

    /// Client certificate (PEM) presented for product passport lookups.
    pub client_cert: Option<PathBuf>,

    /// Client private key (PEM) matching `client_cert`.
    pub client_key: Option<PathBuf>,

    /// Look up product passports during DI.AppStart.
    pub enable_product_passport: bool,

    /// Owner identity; enables commissioning passports after TO2.
    pub owner_id: Option<String>,

    /// Timeout applied to every passport service call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for PassportConfig {
    fn default() -> Self {
        Self {
            product_base_url: None,
            commissioning_url: None,
            ca_cert: None,
            client_cert: None,
            client_key: None,
            enable_product_passport: false,
            owner_id: None,
            request_timeout_secs: 30,
        }
    }
}

impl PassportConfig {
    /// True when at least one passport endpoint is configured.
    pub fn has_endpoint(&self) -> bool {
        self.product_base_url.is_some() || self.commissioning_url.is_some()
    }

    /// True when any part of the mutual TLS material is configured.
    pub fn has_tls_material(&self) -> bool {
        self.ca_cert.is_some() || self.client_cert.is_some() || self.client_key.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Identifiers reported for every matching message when payload decoding is unavailable.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentifierConfig {
    /// Product UUID looked up on DI.AppStart.
    pub product_id: Option<String>,

    /// Device GUID recorded as controller on TO2.Done2.
    pub device_guid: Option<String>,
}

impl IdentifierConfig {
    pub fn is_empty(&self) -> bool {
        self.product_id.is_none() && self.device_guid.is_none()
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Grace period for in-flight relays after a shutdown signal, in seconds.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 10 }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_go_fdo_tooling() {
        let config = ProxyConfig::default();
        assert_eq!(config.backend.port, 8081);
        assert_eq!(config.backend.health_path, "/health");
        assert_eq!(config.backend.ready_timeout(), Duration::from_secs(30));
        assert_eq!(config.backend.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.passport.request_timeout(), Duration::from_secs(30));
        assert!(!config.passport.enable_product_passport);
        assert!(!config.passport.has_endpoint());
    }

    #[test]
    fn port_placeholder_is_substituted() {
        let backend = BackendConfig {
            port: 9100,
            ..BackendConfig::default()
        };
        let args = backend.resolved_args();
        assert!(args.contains(&"127.0.0.1:9100".to_string()));
        assert!(!args.iter().any(|a| a.contains("{port}")));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [passport]
            owner_id = "owner-1"

            [backend]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.passport.owner_id.as_deref(), Some("owner-1"));
        assert_eq!(config.backend.port, 9000);
        assert_eq!(config.backend.program, "go");
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
    }
}
