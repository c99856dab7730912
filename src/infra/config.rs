//! Configuration loading from TOML files
//!
//! The binary picks the file (`--config`, `CONFIG_FILE`, or config/dev.toml)
//! and hands the path to `Config::load_from_path`.

use crate::domain::ledger::RestaurantConfig;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// JSON ledger file path
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

fn default_ledger_path() -> String {
    "data/restaurant.json".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { path: default_ledger_path() }
    }
}

/// Seed values for a brand-new ledger. Once the ledger exists, its own
/// config section is authoritative and these are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantSection {
    #[serde(default = "default_restaurant_name")]
    pub name: String,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u32,
}

fn default_restaurant_name() -> String {
    "Restaurant".to_string()
}

fn default_max_capacity() -> u32 {
    50
}

fn default_alert_threshold() -> u32 {
    80
}

impl Default for RestaurantSection {
    fn default() -> Self {
        Self {
            name: default_restaurant_name(),
            max_capacity: default_max_capacity(),
            alert_threshold: default_alert_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub restaurant: RestaurantSection,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    bind_address: String,
    port: u16,
    ledger_path: String,
    restaurant_name: String,
    max_capacity: u32,
    alert_threshold: u32,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            bind_address: toml_config.server.bind_address,
            port: toml_config.server.port,
            ledger_path: toml_config.ledger.path,
            restaurant_name: toml_config.restaurant.name,
            max_capacity: toml_config.restaurant.max_capacity,
            alert_threshold: toml_config.restaurant.alert_threshold,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let config = Self::from_toml(toml_config, path.display().to_string());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a path, falling back to defaults on any error
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.max_capacity >= 1, "restaurant.max_capacity must be at least 1");
        anyhow::ensure!(
            self.alert_threshold <= 100,
            "restaurant.alert_threshold must be between 0 and 100"
        );
        Ok(())
    }

    /// Restaurant config used to seed a new ledger
    pub fn seed_restaurant(&self) -> RestaurantConfig {
        RestaurantConfig {
            max_capacity: self.max_capacity,
            name: self.restaurant_name.clone(),
            alert_threshold: self.alert_threshold,
        }
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn ledger_path(&self) -> &str {
        &self.ledger_path
    }

    pub fn restaurant_name(&self) -> &str {
        &self.restaurant_name
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    pub fn alert_threshold(&self) -> u32 {
        self.alert_threshold
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}
