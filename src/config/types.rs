use crate::query::DEFAULT_SCAN_LIMIT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Logfile opened when `browse` is not given one
    #[serde(default)]
    pub logfile: Option<String>,

    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(with = "duration_format", default = "default_connect_timeout")]
    pub connect_timeout: Option<Duration>,

    /// Fail a scan that goes silent for this long; `infinite` disables it
    #[serde(with = "duration_format", default)]
    pub idle_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            logfile: None,
            limit: default_limit(),
            connect_timeout: default_connect_timeout(),
            idle_timeout: None,
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:7180".to_string()
}

fn default_limit() -> usize {
    DEFAULT_SCAN_LIMIT
}

fn default_connect_timeout() -> Option<Duration> {
    Some(Duration::from_secs(10))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Raw lines examined per pushed batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub logfiles: BTreeMap<String, LogfileConfig>,
}

fn default_listen() -> String {
    "127.0.0.1:7180".to_string()
}

fn default_batch_size() -> usize {
    250
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogfileConfig {
    pub path: PathBuf,

    /// Regex with a `ts` group; other named groups become columns
    pub pattern: String,

    /// `iso8601`, `epoch`, `epoch_ms`, `epoch_us` or a strptime format
    pub format: String,

    #[serde(default)]
    pub description: Option<String>,
}

// Durations like `500ms`, `10s`, `5m`, `1h`; `infinite` means none
mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&format_duration(*d)),
            None => serializer.serialize_str("infinite"),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "infinite" {
            Ok(None)
        } else {
            parse_duration(&s)
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else if let Some(v) = s.strip_suffix('h') {
            (v, "h")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        Ok(match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            _ => Duration::from_secs(value * 3600),
        })
    }

    fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_millis() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::duration_format::parse_duration;
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("10 parsecs").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_client_defaults_apply_to_empty_section() {
        let config: Config = serde_yaml::from_str("client: {}\n").unwrap();

        assert_eq!(config.client.server_url, "http://127.0.0.1:7180");
        assert_eq!(config.client.limit, 100);
        assert_eq!(config.client.connect_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.client.idle_timeout, None);
        assert!(config.server.is_none());
    }

    #[test]
    fn test_durations_round_trip_through_yaml() {
        let client = ClientConfig {
            idle_timeout: Some(Duration::from_millis(1500)),
            connect_timeout: None,
            ..ClientConfig::default()
        };

        let yaml = serde_yaml::to_string(&client).unwrap();
        assert!(yaml.contains("idle_timeout: 1500ms"));
        assert!(yaml.contains("connect_timeout: infinite"));

        let parsed: ClientConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.idle_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(parsed.connect_timeout, None);
    }
}
