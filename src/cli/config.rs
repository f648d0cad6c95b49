use super::CliError;
use std::fs;
use std::path::{Path, PathBuf};

const SAMPLE_CONFIG: &str = include_str!("../../samples/config.yml");

/// Write the sample config to the user config path, or print it
pub fn init(stdout: bool) -> Result<(), CliError> {
    if stdout {
        print!("{}", SAMPLE_CONFIG);
        return Ok(());
    }

    let config_path = default_config_path();
    write_sample(&config_path)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

fn default_config_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home_dir) => home_dir.join(".config/logscan/config.yml"),
        None => PathBuf::from("/etc/logscan/config.yml"),
    }
}

fn write_sample(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        return Err(CliError::ConfigExists(path.to_path_buf()));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, SAMPLE_CONFIG)?;
    Ok(())
}
