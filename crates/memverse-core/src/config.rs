use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEV_SWEEP_INTERVAL_SECS: u64 = 60;
pub const PROD_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Top-level config (memverse.toml + MEMVERSE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemverseConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Knobs for the sweep and the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Overrides the per-environment sweep interval when set.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
    /// Upper bound for each storage call made while delivering.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
    /// Deliveries allowed in flight at once within one sweep tick.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_deliveries: usize,
    /// Capacity of the outbound notification queue.
    #[serde(default = "default_notification_queue")]
    pub notification_queue: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: None,
            io_timeout_ms: default_io_timeout_ms(),
            max_concurrent_deliveries: default_max_concurrent(),
            notification_queue: default_notification_queue(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,
    #[serde(default = "default_unsubscribe_url")]
    pub unsubscribe_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from_name: default_from_name(),
            dashboard_url: default_dashboard_url(),
            unsubscribe_url: default_unsubscribe_url(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_io_timeout_ms() -> u64 {
    5_000
}
fn default_max_concurrent() -> usize {
    16
}
fn default_notification_queue() -> usize {
    256
}
fn default_from_name() -> String {
    "Memoryverse".to_string()
}
fn default_dashboard_url() -> String {
    "https://memoryverse.app/dashboard".to_string()
}
fn default_unsubscribe_url() -> String {
    "https://memoryverse.app/unsubscribe".to_string()
}
fn default_db_path() -> String {
    format!("{}/memverse.db", home_dir())
}

fn home_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.memverse", home)
}

pub fn default_config_path() -> String {
    format!("{}/memverse.toml", home_dir())
}

impl MemverseConfig {
    /// Load config from a TOML file with MEMVERSE_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `MEMVERSE_DELIVERY__SWEEP_INTERVAL_SECS=30`.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("MEMVERSE_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Explicit override wins; otherwise short in development, daily in production.
    pub fn sweep_interval(&self) -> Duration {
        let secs = self
            .delivery
            .sweep_interval_secs
            .unwrap_or(match self.environment {
                Environment::Development => DEV_SWEEP_INTERVAL_SECS,
                Environment::Production => PROD_SWEEP_INTERVAL_SECS,
            });
        Duration::from_secs(secs.max(1))
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery.io_timeout_ms.max(1))
    }
}
