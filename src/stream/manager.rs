use super::transport::Transport;
use super::{ChannelHandle, Delivery, Envelope, EventKind, StreamEvent, StreamFailure};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Ordered listener tags per event kind
#[derive(Debug, Clone)]
pub struct ListenerTable<L> {
    listeners: HashMap<EventKind, Vec<L>>,
}

impl<L> Default for ListenerTable<L> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }
}

impl<L: Clone> ListenerTable<L> {
    pub fn add(&mut self, kind: EventKind, listener: L) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    pub fn for_kind(&self, kind: &EventKind) -> &[L] {
        self.listeners.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Channel<L> {
    epoch: u64,
    url: String,
    pump: JoinHandle<()>,
    listeners: ListenerTable<L>,
}

impl<L> Drop for Channel<L> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Owns named server-push connections, at most one per name.
///
/// Every `get` assigns a fresh epoch. Pump tasks tag what they forward with the
/// epoch they were spawned for, and `route` discards anything whose epoch is
/// no longer current, so a replaced connection can never reach the listeners
/// registered on its successor.
pub struct EventSourceManager<L> {
    transport: Arc<dyn Transport>,
    idle_timeout: Option<Duration>,
    channels: HashMap<String, Channel<L>>,
    next_epoch: u64,
    events_tx: mpsc::UnboundedSender<Envelope>,
    events_rx: mpsc::UnboundedReceiver<Envelope>,
}

impl<L: Clone> EventSourceManager<L> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            transport,
            idle_timeout: None,
            channels: HashMap::new(),
            next_epoch: 0,
            events_tx,
            events_rx,
        }
    }

    /// Fail streams that stay silent for longer than `timeout`
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Open a connection to `url` under `name`, replacing any existing one.
    ///
    /// Must be called from within a tokio runtime. Never fails synchronously;
    /// transport problems arrive later as `EventKind::Error` events.
    pub fn get(&mut self, name: &str, url: &str) -> ChannelHandle {
        if self.close(name) {
            debug!(channel = %name, "Replacing open stream");
        }

        self.next_epoch += 1;
        let epoch = self.next_epoch;

        let pump = tokio::spawn(pump_events(
            Arc::clone(&self.transport),
            url.to_string(),
            name.to_string(),
            epoch,
            self.idle_timeout,
            self.events_tx.clone(),
        ));

        self.channels.insert(
            name.to_string(),
            Channel {
                epoch,
                url: url.to_string(),
                pump,
                listeners: ListenerTable::default(),
            },
        );

        debug!(channel = %name, epoch, url = %url, "Opened stream");

        ChannelHandle {
            name: name.to_string(),
            epoch,
        }
    }

    /// Register `listener` for `kind` on the connection behind `handle`.
    ///
    /// Returns false if the handle's connection has been closed or replaced.
    pub fn add_listener(&mut self, handle: &ChannelHandle, kind: EventKind, listener: L) -> bool {
        match self.channels.get_mut(&handle.name) {
            Some(channel) if channel.epoch == handle.epoch => {
                channel.listeners.add(kind, listener);
                true
            }
            _ => false,
        }
    }

    /// Terminate the connection under `name`. Returns false if none was open.
    pub fn close(&mut self, name: &str) -> bool {
        match self.channels.remove(name) {
            Some(channel) => {
                debug!(channel = %name, epoch = channel.epoch, "Closed stream");
                true
            }
            None => false,
        }
    }

    /// Close every channel, returning how many were open
    pub fn close_all(&mut self) -> usize {
        let count = self.channels.len();
        self.channels.clear();
        if count > 0 {
            debug!(count, "Closed all streams");
        }
        count
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn active_count(&self) -> usize {
        self.channels.len()
    }

    pub fn epoch_of(&self, name: &str) -> Option<u64> {
        self.channels.get(name).map(|c| c.epoch)
    }

    pub fn url_of(&self, name: &str) -> Option<&str> {
        self.channels.get(name).map(|c| c.url.as_str())
    }

    /// Resolve an envelope into deliveries for the listeners of its kind.
    ///
    /// Envelopes from closed or superseded connections resolve to nothing.
    pub fn route(&self, envelope: Envelope) -> Vec<Delivery<L>> {
        let Some(channel) = self.channels.get(&envelope.channel) else {
            trace!(channel = %envelope.channel, epoch = envelope.epoch, "Dropping event for closed channel");
            return Vec::new();
        };

        if channel.epoch != envelope.epoch {
            trace!(
                channel = %envelope.channel,
                epoch = envelope.epoch,
                current_epoch = channel.epoch,
                "Dropping event from superseded stream"
            );
            return Vec::new();
        }

        let kind = envelope.event.kind();
        let handle = ChannelHandle {
            name: envelope.channel,
            epoch: envelope.epoch,
        };

        channel
            .listeners
            .for_kind(&kind)
            .iter()
            .map(|listener| Delivery {
                handle: handle.clone(),
                listener: listener.clone(),
                event: envelope.event.clone(),
            })
            .collect()
    }

    /// Wait for the next event that has at least one live listener.
    ///
    /// Returns `None` once no channel is open, since nothing could arrive.
    pub async fn next_deliveries(&mut self) -> Option<Vec<Delivery<L>>> {
        loop {
            if self.channels.is_empty() {
                return None;
            }

            let envelope = self.events_rx.recv().await?;
            let deliveries = self.route(envelope);
            if !deliveries.is_empty() {
                return Some(deliveries);
            }
        }
    }
}

async fn pump_events(
    transport: Arc<dyn Transport>,
    url: String,
    channel: String,
    epoch: u64,
    idle_timeout: Option<Duration>,
    events_tx: mpsc::UnboundedSender<Envelope>,
) {
    let send = |event: StreamEvent| {
        events_tx
            .send(Envelope {
                channel: channel.clone(),
                epoch,
                event,
            })
            .is_ok()
    };

    let mut frames = match transport.open(&url).await {
        Ok(frames) => frames,
        Err(e) => {
            warn!(channel = %channel, epoch, url = %url, error = %e, "Failed to open stream");
            send(StreamEvent::Failed(StreamFailure::TransportOpen(e.to_string())));
            return;
        }
    };

    loop {
        let next = match idle_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, frames.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(channel = %channel, epoch, timeout_ms = timeout.as_millis() as u64, "Stream idle timeout");
                    send(StreamEvent::Failed(StreamFailure::Fault(format!(
                        "no data received for {}ms",
                        timeout.as_millis()
                    ))));
                    return;
                }
            },
            None => frames.next().await,
        };

        match next {
            Some(Ok(frame)) => {
                if !send(StreamEvent::from(frame)) {
                    return;
                }
            }
            Some(Err(e)) => {
                warn!(channel = %channel, epoch, error = %e, "Stream fault");
                send(StreamEvent::Failed(StreamFailure::Fault(e.to_string())));
                return;
            }
            None => {
                send(StreamEvent::Failed(StreamFailure::Fault(
                    "stream closed by server".to_string(),
                )));
                return;
            }
        }
    }
}
