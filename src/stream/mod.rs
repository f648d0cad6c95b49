pub mod manager;
pub mod sse;
pub mod transport;

pub use manager::{EventSourceManager, ListenerTable};
pub use sse::{SseDecoder, SseEvent};
pub use transport::{EventStream, HttpTransport, Transport, TransportError};

use thiserror::Error;

/// Event kinds listeners can register for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    Error,
    Custom(String),
}

impl EventKind {
    /// Map an SSE `event:` field to a kind; absent means `message`
    pub fn from_sse_name(name: Option<&str>) -> Self {
        match name {
            None | Some("") | Some("message") => EventKind::Message,
            Some("error") => EventKind::Error,
            Some(other) => EventKind::Custom(other.to_string()),
        }
    }
}

/// Terminal failure of one connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamFailure {
    #[error("failed to open stream: {0}")]
    TransportOpen(String),

    #[error("stream fault: {0}")]
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Data { kind: EventKind, data: String },
    Failed(StreamFailure),
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Data { kind, .. } => kind.clone(),
            StreamEvent::Failed(_) => EventKind::Error,
        }
    }
}

impl From<SseEvent> for StreamEvent {
    fn from(frame: SseEvent) -> Self {
        // A server-sent `event: error` frame is a server-side fault, not data
        match EventKind::from_sse_name(frame.event.as_deref()) {
            EventKind::Error => StreamEvent::Failed(StreamFailure::Fault(frame.data)),
            kind => StreamEvent::Data {
                kind,
                data: frame.data,
            },
        }
    }
}

/// Identifies one opened connection under a channel name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    pub name: String,
    pub epoch: u64,
}

/// An event as forwarded by a connection's pump task
#[derive(Debug, Clone)]
pub struct Envelope {
    pub channel: String,
    pub epoch: u64,
    pub event: StreamEvent,
}

/// A routed event for one registered listener
#[derive(Debug, Clone)]
pub struct Delivery<L> {
    pub handle: ChannelHandle,
    pub listener: L,
    pub event: StreamEvent,
}
