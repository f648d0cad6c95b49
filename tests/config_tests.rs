use logscan::config::{load_config, load_or_default, ConfigError};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_load_full_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    let config_yaml = r#"
client:
  server_url: http://logs.internal:7180
  logfile: access_log
  limit: 50
  connect_timeout: 3s
  idle_timeout: 2m
server:
  listen: 0.0.0.0:7180
  batch_size: 500
  logfiles:
    access_log:
      path: /var/log/nginx/access.log
      pattern: '^(?P<ip>\S+) \S+ \S+ \[(?P<ts>[^\]]+)\]'
      format: "%d/%b/%Y:%H:%M:%S %z"
    app:
      path: /var/log/app.log
      description: application log
      pattern: '^(?P<ts>\S+) (?P<level>\w+) (?P<msg>.*)$'
      format: iso8601
"#;
    fs::write(&config_path, config_yaml).unwrap();

    let config = load_config(&config_path).expect("config should be valid");

    assert_eq!(config.client.server_url, "http://logs.internal:7180");
    assert_eq!(config.client.logfile.as_deref(), Some("access_log"));
    assert_eq!(config.client.limit, 50);
    assert_eq!(config.client.connect_timeout, Some(Duration::from_secs(3)));
    assert_eq!(config.client.idle_timeout, Some(Duration::from_secs(120)));

    let server = config.server.unwrap();
    assert_eq!(server.listen, "0.0.0.0:7180");
    assert_eq!(server.batch_size, 500);
    assert_eq!(server.logfiles.len(), 2);
    assert_eq!(
        server.logfiles["app"].description.as_deref(),
        Some("application log")
    );
}

#[test]
fn test_env_vars_expand_in_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    std::env::set_var("LOGSCAN_CONFIG_TEST_PORT", "7999");

    fs::write(
        &config_path,
        "client:\n  server_url: http://127.0.0.1:$env{LOGSCAN_CONFIG_TEST_PORT}\n",
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.client.server_url, "http://127.0.0.1:7999");
    std::env::remove_var("LOGSCAN_CONFIG_TEST_PORT");
}

#[test]
fn test_invalid_logfile_pattern() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    let config_yaml = r#"
server:
  logfiles:
    app:
      path: /var/log/app.log
      pattern: '^(?P<ts>\S+'
      format: iso8601
"#;
    fs::write(&config_path, config_yaml).unwrap();

    match load_config(&config_path) {
        Err(ConfigError::Validation(msg)) => {
            assert!(msg.contains("server.logfiles.app"), "got: {}", msg)
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_unknown_duration_unit() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, "client:\n  idle_timeout: 3 days\n").unwrap();

    let err = load_config(&config_path).unwrap_err();
    assert!(err.to_string().contains("config.yml"), "got: {}", err);
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("absent.yml");

    assert!(matches!(load_config(&config_path), Err(ConfigError::Io(_))));
    assert!(load_or_default(Some(&config_path)).is_err());
}
