use cpu_usage_daemon::config::{Config, StrategyKind};
use cpu_usage_daemon::error::ConfigError;
use cpu_usage_daemon::registry::SamplingStrategy;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn load_str(content: &str) -> Result<Config, ConfigError> {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    Config::load(file.path())
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.server.port, 4302);
    assert_eq!(config.server.socket_addr().unwrap().to_string(), "0.0.0.0:4302");
    assert_eq!(config.sampling.strategy, StrategyKind::Passive);
    assert_eq!(config.targets.len(), 2);
    assert_eq!(config.targets[0].report_key(), "mongod_cpu_percent");
    assert_eq!(config.targets[1].report_key(), "redis_cpu_percent");
    assert_eq!(config.targets[1].command_substring, "redis-server");
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_from_toml() {
    let config = load_str(
        r#"
[server]
host = "127.0.0.1"
port = 8080

[sampling]
strategy = "active"
active_interval_ms = 500
active_duration_seconds = 10

[[targets]]
display_name = "postgres"
command_substring = "postgres"
owner_account = "postgres"
"#,
    )
    .unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.targets.len(), 1);
    assert_eq!(config.sampling.baseline_interval_ms, 200);
    assert_eq!(
        config.sampling_strategy(),
        SamplingStrategy::Active {
            interval: Duration::from_millis(500),
            duration: Duration::from_secs(10),
        }
    );
}

#[test]
fn test_missing_sections_use_defaults() {
    let config = load_str("[sampling]\nretention_seconds = 2.5\n").unwrap();
    assert_eq!(config.server.port, 4302);
    assert_eq!(config.targets.len(), 2);
    assert_eq!(
        config.sampling_strategy(),
        SamplingStrategy::Passive {
            retention: Duration::from_millis(2500),
        }
    );
}

#[test]
fn test_save_config() {
    let config = Config::default();
    let file = NamedTempFile::new().unwrap();
    config.save(file.path()).unwrap();
    let loaded = Config::load(file.path()).unwrap();
    assert_eq!(loaded.server.port, config.server.port);
    assert_eq!(loaded.targets, config.targets);
}

#[test]
fn test_rejects_duplicate_targets() {
    let result = load_str(
        r#"
[[targets]]
display_name = "redis"
command_substring = "redis-server"
owner_account = "redis"

[[targets]]
display_name = "redis"
command_substring = "redis-sentinel"
owner_account = "redis"
"#,
    );
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_rejects_bad_sampling_values() {
    assert!(matches!(
        load_str("[sampling]\nretention_seconds = 0.0\n"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        load_str("[sampling]\nactive_interval_ms = 0\n"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        load_str("[sampling]\nactive_interval_ms = 5000\nactive_duration_seconds = 1\n"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        load_str("[server]\nhost = \"not an ip\"\n"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_rejects_unparseable_file() {
    assert!(matches!(load_str("[server"), Err(ConfigError::Parse(_))));
}

#[test]
fn test_accepts_very_long_active_duration() {
    let config = load_str(
        "[sampling]\nstrategy = \"active\"\nactive_duration_seconds = 9223372036854775807\n",
    )
    .unwrap();
    assert_eq!(
        config.sampling_strategy(),
        SamplingStrategy::Active {
            interval: Duration::from_millis(1000),
            duration: Duration::from_secs(9_223_372_036_854_775_807),
        }
    );
}
