// src/config.rs

//! Manages relay configuration: loading, resolving flat legacy keys, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Whether the listener speaks plain HTTP/WS or TLS-wrapped HTTPS/WSS.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    #[serde(alias = "http")]
    Plain,
    #[serde(alias = "https")]
    Secured,
}

/// Credential file locations for secured mode.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TlsConfig {
    #[serde(default = "default_cert_path")]
    pub cert_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: default_cert_path(),
            key_path: default_key_path(),
        }
    }
}

fn default_cert_path() -> String {
    "wsrelay.crt".to_string()
}
fn default_key_path() -> String {
    "wsrelay.key".to_string()
}

/// Settings that shape how messages are fanned out to recipients.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeliveryConfig {
    /// Upper bound for a single write to a peer, in milliseconds. `0` disables the bound.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// If true, a session that is among the recipients of its own message receives it.
    #[serde(default = "default_echo_to_sender")]
    pub echo_to_sender: bool,
    /// The largest websocket message accepted from a client, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_write_timeout_ms(),
            echo_to_sender: default_echo_to_sender(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_write_timeout_ms() -> u64 {
    5000
}
fn default_echo_to_sender() -> bool {
    true
}
fn default_max_frame_bytes() -> usize {
    64 * 1024
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9090
}

/// The listening port may be written as a number or, as in `config.json`, a string.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum PortConfig {
    Number(u16),
    String(String),
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port_config")]
    port: PortConfig,
    #[serde(default)]
    server_mode: ServerMode,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default)]
    tls: TlsConfig,
    /// Flat credential keys of the JSON layout; they win over the `tls` section.
    #[serde(default)]
    cert_file_path: Option<String>,
    #[serde(default)]
    key_file_path: Option<String>,
    #[serde(default)]
    delivery: DeliveryConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_port_config() -> PortConfig {
    PortConfig::Number(default_port())
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10000
}

/// Represents the final, validated, and resolved relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub server_mode: ServerMode,
    pub log_level: String,
    pub max_clients: usize,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            server_mode: ServerMode::default(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            tls: TlsConfig::default(),
            delivery: DeliveryConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Reads and parses a config file. Files ending in `.json` are parsed as
    /// JSON; everything else as TOML.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let is_json = Path::new(path)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
                .with_context(|| format!("Invalid configuration in '{path}'"))
        } else {
            Self::from_toml_str(&contents)
                .with_context(|| format!("Invalid configuration in '{path}'"))
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        Self::resolve(raw)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(contents).context("Failed to parse JSON")?;
        Self::resolve(raw)
    }

    pub fn is_secured(&self) -> bool {
        self.server_mode == ServerMode::Secured
    }

    fn resolve(raw: RawConfig) -> Result<Self> {
        let port = match raw.port {
            PortConfig::Number(p) => p,
            PortConfig::String(s) => s
                .trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid port '{s}'"))?,
        };

        let mut tls = raw.tls;
        if let Some(cert) = raw.cert_file_path {
            tls.cert_path = cert;
        }
        if let Some(key) = raw.key_file_path {
            tls.key_path = key;
        }

        let config = Config {
            host: raw.host,
            port,
            server_mode: raw.server_mode,
            log_level: raw.log_level,
            max_clients: raw.max_clients,
            tls,
            delivery: raw.delivery,
            metrics: raw.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.delivery.max_frame_bytes == 0 {
            return Err(anyhow!("delivery.max_frame_bytes cannot be 0"));
        }
        if self.delivery.write_timeout_ms == 0 {
            warn!(
                "delivery.write_timeout_ms is 0: a stalled peer can hold up every fan-out that addresses it."
            );
        }

        if self.is_secured() {
            if self.tls.cert_path.trim().is_empty() {
                return Err(anyhow!(
                    "tls.cert_path cannot be empty when server_mode is secured"
                ));
            }
            if self.tls.key_path.trim().is_empty() {
                return Err(anyhow!(
                    "tls.key_path cannot be empty when server_mode is secured"
                ));
            }
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}
