//! Layered configuration for NetPulse.
//!
//! Mirrors `examples/original_source/netpulse/utils/config.py`'s
//! `AppConfig`: nested sections loaded with precedence
//! `environment (NETPULSE_, __ nested) -> YAML file -> struct defaults`,
//! via the `config` crate rather than `pydantic-settings`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    pub api_key: String,
    #[serde(default = "ServerConfig::default_api_key_name")]
    pub api_key_name: String,
    #[serde(default = "ServerConfig::default_workers")]
    pub workers: usize,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        9000
    }
    fn default_api_key_name() -> String {
        "X-API-KEY".to_string()
    }
    fn default_workers() -> usize {
        2 * num_cpus_fallback() + 1
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "JobConfig::default_ttl")]
    pub ttl: u64,
    #[serde(default = "JobConfig::default_timeout")]
    pub timeout: u64,
    #[serde(default = "JobConfig::default_result_ttl")]
    pub result_ttl: u64,
}

impl JobConfig {
    fn default_ttl() -> u64 {
        1800
    }
    fn default_timeout() -> u64 {
        300
    }
    fn default_result_ttl() -> u64 {
        300
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            ttl: Self::default_ttl(),
            timeout: Self::default_timeout(),
            result_ttl: Self::default_result_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Default scheduler is `least_load` (confirmed from the original
    /// config defaults, not `greedy`).
    #[serde(default = "WorkerConfig::default_scheduler")]
    pub scheduler: String,
    #[serde(default = "WorkerConfig::default_ttl")]
    pub ttl: u64,
    #[serde(default = "WorkerConfig::default_pinned_per_node")]
    pub pinned_per_node: u32,
    /// Directory holding `node.lock`/`fifo.lock` (§4.3, §5).
    #[serde(default = "WorkerConfig::default_lock_dir")]
    pub lock_dir: PathBuf,
    /// Interval at which a `PinnedWorker`'s background keepalive loop
    /// probes a session-oriented driver's session (§4.3).
    #[serde(default = "WorkerConfig::default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

impl WorkerConfig {
    fn default_scheduler() -> String {
        "least_load".to_string()
    }
    fn default_ttl() -> u64 {
        300
    }
    fn default_pinned_per_node() -> u32 {
        32
    }
    fn default_lock_dir() -> PathBuf {
        PathBuf::from("/var/run/netpulse")
    }
    fn default_keepalive_interval_secs() -> u64 {
        30
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scheduler: Self::default_scheduler(),
            ttl: Self::default_ttl(),
            pinned_per_node: Self::default_pinned_per_node(),
            lock_dir: Self::default_lock_dir(),
            keepalive_interval_secs: Self::default_keepalive_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ca: Option<PathBuf>,
    #[serde(default)]
    pub cert: Option<PathBuf>,
    #[serde(default)]
    pub key: Option<PathBuf>,
}

impl TlsConfig {
    /// Don't require file existence unless TLS is actually enabled.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        for (name, path) in [("ca", &self.ca), ("cert", &self.cert), ("key", &self.key)] {
            match path {
                Some(p) if p.is_file() => {}
                _ => {
                    return Err(Error::Config(format!(
                        "{name} must be an existing file when TLS is enabled"
                    )))
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "SentinelConfig::default_host")]
    pub host: String,
    #[serde(default = "SentinelConfig::default_port")]
    pub port: u16,
    #[serde(default = "SentinelConfig::default_master_name")]
    pub master_name: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl SentinelConfig {
    fn default_host() -> String {
        "redis-sentinel".to_string()
    }
    fn default_port() -> u16 {
        26379
    }
    fn default_master_name() -> String {
        "mymaster".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default = "KeyConfig::default_host_to_node_map")]
    pub host_to_node_map: String,
    #[serde(default = "KeyConfig::default_node_info_map")]
    pub node_info_map: String,
}

impl KeyConfig {
    fn default_host_to_node_map() -> String {
        "netpulse:host_to_node_map".to_string()
    }
    fn default_node_info_map() -> String {
        "netpulse:node_info_map".to_string()
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            host_to_node_map: Self::default_host_to_node_map(),
            node_info_map: Self::default_node_info_map(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_host")]
    pub host: String,
    #[serde(default = "StoreConfig::default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "StoreConfig::default_timeout")]
    pub timeout: u64,
    #[serde(default = "StoreConfig::default_keepalive")]
    pub keepalive: u64,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub sentinel: SentinelConfig,
    #[serde(default)]
    pub key: KeyConfig,
}

impl StoreConfig {
    fn default_host() -> String {
        "localhost".to_string()
    }
    fn default_port() -> u16 {
        6379
    }
    fn default_timeout() -> u64 {
        30
    }
    fn default_keepalive() -> u64 {
        30
    }

    /// Builds a `redis://` URL. Sentinel-based master discovery is not
    /// modeled as a distinct transport here; operators point `host`/`port`
    /// directly at the resolved master, consistent with how most Rust
    /// Redis clients expect a single endpoint (the original's
    /// `Sentinel.discover_master` dance has no equivalent in the `redis`
    /// crate's connection API).
    pub fn connection_url(&self) -> String {
        let scheme = if self.tls.enabled { "rediss" } else { "redis" };
        match &self.password {
            Some(pw) => format!("{scheme}://:{pw}@{}:{}", self.host, self.port),
            None => format!("{scheme}://{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_level")]
    pub level: String,
}

impl LogConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// Read settings: env (`NETPULSE_`, `__` nested) -> YAML file ->
    /// struct defaults, matching the original's
    /// `settings_customise_sources` precedence.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        } else {
            builder =
                builder.add_source(config::File::with_name("config/config.yaml").required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("NETPULSE")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().map_err(|e| Error::Config(e.to_string()))?;

        let app: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        app.store.tls.validate()?;
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scheduler_is_least_load() {
        assert_eq!(WorkerConfig::default().scheduler, "least_load");
    }

    #[test]
    fn tls_disabled_skips_file_checks() {
        let tls = TlsConfig::default();
        assert!(tls.validate().is_ok());
    }

    #[test]
    fn tls_enabled_without_files_fails() {
        let tls = TlsConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(tls.validate().is_err());
    }

    #[test]
    fn connection_url_with_password() {
        let store = StoreConfig {
            host: "localhost".into(),
            port: 6379,
            password: Some("secret".into()),
            timeout: 30,
            keepalive: 30,
            tls: TlsConfig::default(),
            sentinel: SentinelConfig::default(),
            key: KeyConfig::default(),
        };
        assert_eq!(store.connection_url(), "redis://:secret@localhost:6379");
    }
}
