//! Configuration management (TOML)

use crate::error::ConfigError;
use crate::identity::TrackedIdentity;
use crate::registry::SamplingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "CPU_USAGE_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default = "default_targets")]
    pub targets: Vec<TrackedIdentity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Passive,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub strategy: StrategyKind,
    pub retention_seconds: f64,
    pub active_interval_ms: u64,
    pub active_duration_seconds: u64,
    pub baseline_interval_ms: u64,
    pub max_samples: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 4302,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            strategy: StrategyKind::Passive,
            retention_seconds: 30.0,
            active_interval_ms: 1000,
            active_duration_seconds: 30,
            baseline_interval_ms: 200,
            max_samples: 10_000,
        }
    }
}

fn default_targets() -> Vec<TrackedIdentity> {
    vec![
        TrackedIdentity::new("mongod", "mongod", "mongod"),
        TrackedIdentity::new("redis", "redis-server", "redis"),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            sampling: SamplingConfig::default(),
            targets: default_targets(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bad listen host {:?}", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid("no targets configured".into()));
        }
        let mut names = HashSet::new();
        for target in &self.targets {
            if target.display_name.is_empty() || target.command_substring.is_empty() {
                return Err(ConfigError::Invalid(
                    "target display_name and command_substring must be non-empty".into(),
                ));
            }
            if !names.insert(target.display_name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate target {:?}",
                    target.display_name
                )));
            }
        }

        let sampling = &self.sampling;
        if !(sampling.retention_seconds.is_finite() && sampling.retention_seconds > 0.0) {
            return Err(ConfigError::Invalid(
                "retention_seconds must be a positive number".into(),
            ));
        }
        if sampling.active_interval_ms == 0
            || Duration::from_millis(sampling.active_interval_ms)
                > Duration::from_secs(sampling.active_duration_seconds)
        {
            return Err(ConfigError::Invalid(
                "active_interval_ms must be non-zero and no longer than active_duration_seconds"
                    .into(),
            ));
        }
        if sampling.max_samples == 0 {
            return Err(ConfigError::Invalid("max_samples must be non-zero".into()));
        }
        self.server.socket_addr()?;
        Ok(())
    }

    pub fn sampling_strategy(&self) -> SamplingStrategy {
        let sampling = &self.sampling;
        match sampling.strategy {
            StrategyKind::Passive => SamplingStrategy::Passive {
                retention: Duration::try_from_secs_f64(sampling.retention_seconds)
                    .unwrap_or(Duration::from_secs(30)),
            },
            StrategyKind::Active => SamplingStrategy::Active {
                interval: Duration::from_millis(sampling.active_interval_ms),
                duration: Duration::from_secs(sampling.active_duration_seconds),
            },
        }
    }

    pub fn baseline_interval(&self) -> Duration {
        Duration::from_millis(self.sampling.baseline_interval_ms)
    }

    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        directories::ProjectDirs::from("", "", "cpu-usage")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}
