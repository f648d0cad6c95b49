use crate::config::types::ClientConfig;
use crate::stream::sse::{SseDecoder, SseEvent};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid stream url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("server returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Frames decoded from one open connection, in arrival order
pub type EventStream = BoxStream<'static, Result<SseEvent>>;

/// Opens long-lived server-push connections.
///
/// `url` is whatever the caller handed to the connection manager; transports
/// decide how to resolve it (the HTTP transport joins it onto a base URL).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<EventStream>;
}

/// Server-sent-events over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.server_url).map_err(|source| {
            TransportError::InvalidUrl {
                url: config.server_url.clone(),
                source,
            }
        })?;

        // No overall timeout: a scan stays open until the server finishes it
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        Ok(Self {
            base_url,
            client: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, url: &str) -> Result<Url> {
        self.base_url
            .join(url)
            .map_err(|source| TransportError::InvalidUrl {
                url: url.to_string(),
                source,
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, url: &str) -> Result<EventStream> {
        let url = self.resolve(url)?;
        tracing::debug!(url = %url, "Opening event stream");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let mut decoder = SseDecoder::new();
        let frames = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.feed(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(TransportError::from(e))],
            })
            .flat_map(stream::iter);

        Ok(frames.boxed())
    }
}
