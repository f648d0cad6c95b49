use super::types::Config;
use crate::config::{expand_env_vars, expand_tilde, ENV_VAR_PATTERN};
use crate::server::parser::LineParser;
use regex::Regex;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate config text, expanding `$env{VAR}` and `~` first
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;

    let mut config: Config = serde_yaml::from_str(&yaml)?;
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN).unwrap();
    let mut unset: Vec<&str> = re
        .captures_iter(yaml)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect();

    if unset.is_empty() {
        return Ok(());
    }

    unset.sort_unstable();
    unset.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}\n\
         Set them or replace the $env{{...}} references in the config file",
        unset.join(", ")
    )))
}

fn expand_paths(config: &mut Config) {
    if let Some(server) = config.server.as_mut() {
        for logfile in server.logfiles.values_mut() {
            logfile.path = expand_tilde(&logfile.path);
        }
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if let Err(e) = Url::parse(&config.client.server_url) {
        errors.push(format!(
            "client.server_url '{}' is not a valid URL: {}",
            config.client.server_url, e
        ));
    }

    if config.client.limit == 0 {
        errors.push("client.limit must be greater than 0".to_string());
    }

    if matches!(&config.client.logfile, Some(name) if name.is_empty()) {
        errors.push("client.logfile cannot be empty".to_string());
    }

    if let Some(server) = &config.server {
        if server.batch_size == 0 {
            errors.push("server.batch_size must be greater than 0".to_string());
        }

        for (name, logfile) in &server.logfiles {
            if let Err(e) = LineParser::new(&logfile.pattern, &logfile.format) {
                errors.push(format!("server.logfiles.{}: {}", name, e));
            }
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(ConfigError::Validation(errors.remove(0))),
        _ => Err(ConfigError::ValidationList(errors)),
    }
}
