use super::LOGFILES_ENDPOINT;
use crate::config::types::ClientConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid server url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("server returned error status {status}: {message}")]
    Status { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// A logfile the server can scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogfileDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Column names carried by each row, in order
    #[serde(default)]
    pub columns: Vec<String>,

    /// Attributes this client does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogfilesResponse {
    pub logfile_definitions: Vec<LogfileDefinition>,
}

/// HTTP client for the logfile catalog
#[derive(Debug, Clone)]
pub struct CatalogClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl CatalogClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.server_url)
            .and_then(|base| base.join(LOGFILES_ENDPOINT))
            .map_err(|source| CatalogError::InvalidUrl {
                url: config.server_url.clone(),
                source,
            })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout).timeout(timeout);
        }

        Ok(Self {
            endpoint,
            client: builder.build()?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch the logfiles the server exposes
    pub async fn list_logfiles(&self) -> Result<Vec<LogfileDefinition>> {
        tracing::debug!(url = %self.endpoint, "Fetching logfile catalog");
        let response = self.client.get(self.endpoint.clone()).send().await?;

        if !response.status().is_success() {
            return Err(CatalogError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: LogfilesResponse = response.json().await?;
        Ok(body.logfile_definitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = ClientConfig {
            server_url: "http://logs.internal:7180/".to_string(),
            ..ClientConfig::default()
        };

        let client = CatalogClient::new(&config).unwrap();

        assert_eq!(client.endpoint().as_str(), "http://logs.internal:7180/api/v1/logfiles");
    }

    #[test]
    fn test_invalid_server_url() {
        let config = ClientConfig {
            server_url: "logs.internal".to_string(),
            ..ClientConfig::default()
        };

        assert!(matches!(
            CatalogClient::new(&config),
            Err(CatalogError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_definition_keeps_unknown_attributes() {
        let body = r#"{"logfile_definitions":[
            {"name":"access_log","columns":["ip","status"],"retention":"7d"},
            {"name":"app"}
        ]}"#;

        let response: LogfilesResponse = serde_json::from_str(body).unwrap();
        let defs = response.logfile_definitions;

        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].columns, vec!["ip", "status"]);
        assert_eq!(defs[0].extra["retention"], serde_json::json!("7d"));
        assert!(defs[1].columns.is_empty());
        assert!(defs[1].description.is_none());
    }
}
