//! Deterministic collaborators for driving the query controller without a
//! server: a transport whose connections are fed from test code, and a view
//! that records everything it is asked to render.
//!
//! This is public API: code implementing `ViewAdapter` or embedding
//! `LogViewer` can script scans with these in its own tests.

use crate::query::{LogRow, ScanRequest, ViewAdapter};
use crate::stream::transport::{EventStream, Result, Transport, TransportError};
use crate::stream::{SseEvent, StreamFailure};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type FrameSender = mpsc::UnboundedSender<Result<SseEvent>>;
type FrameReceiver = mpsc::UnboundedReceiver<Result<SseEvent>>;

#[derive(Default)]
struct ScriptState {
    opened: Vec<String>,
    feeds: HashMap<String, VecDeque<FrameReceiver>>,
    refused: HashSet<String>,
}

/// Transport whose connections are scripted per URL.
///
/// `feed(url)` prepares the next connection to `url` and returns the sender
/// side; opening a URL with no prepared feed yields a connection that never
/// produces anything.
#[derive(Default)]
pub struct ScriptedTransport {
    state: Mutex<ScriptState>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn feed(&self, url: &str) -> ScriptedFeed {
        let (tx, rx) = mpsc::unbounded();
        self.state()
            .feeds
            .entry(url.to_string())
            .or_default()
            .push_back(rx);
        ScriptedFeed { tx }
    }

    /// Make every open of `url` fail
    pub fn refuse(&self, url: &str) {
        self.state().refused.insert(url.to_string());
    }

    /// URLs in the order connections were opened
    pub fn opened(&self) -> Vec<String> {
        self.state().opened.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, url: &str) -> Result<EventStream> {
        let mut state = self.state();
        state.opened.push(url.to_string());

        if state.refused.contains(url) {
            return Err(TransportError::Other(format!("connection refused: {url}")));
        }

        match state.feeds.get_mut(url).and_then(VecDeque::pop_front) {
            Some(rx) => Ok(rx.boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }
}

/// Test-side end of one scripted connection
#[derive(Clone)]
pub struct ScriptedFeed {
    tx: FrameSender,
}

impl ScriptedFeed {
    /// Push a `message` frame; false once the connection has been torn down
    pub fn message(&self, data: impl Into<String>) -> bool {
        self.tx.unbounded_send(Ok(SseEvent::message(data))).is_ok()
    }

    pub fn event(&self, event: &str, data: impl Into<String>) -> bool {
        self.tx.unbounded_send(Ok(SseEvent::named(event, data))).is_ok()
    }

    pub fn fail(&self, reason: &str) -> bool {
        self.tx
            .unbounded_send(Err(TransportError::Other(reason.to_string())))
            .is_ok()
    }

    /// End the connection the way a server hanging up would
    pub fn hang_up(&self) {
        self.tx.close_channel();
    }

    /// True once the consuming side has dropped the connection
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One call the controller made on a view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Started { logfile: String, end_time: i64 },
    Progress { rows_scanned: u64, last_row_time: i64 },
    Batch(Vec<LogRow>),
    Finished,
    Error(StreamFailure),
}

#[derive(Debug, Default)]
pub struct RecordingView {
    pub calls: Vec<ViewCall>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<&[LogRow]> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ViewCall::Batch(rows) => Some(rows.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn rendered_times(&self) -> Vec<i64> {
        self.batches()
            .into_iter()
            .flat_map(|rows| rows.iter().map(|row| row.time))
            .collect()
    }

    pub fn progress(&self) -> Vec<(u64, i64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ViewCall::Progress {
                    rows_scanned,
                    last_row_time,
                } => Some((*rows_scanned, *last_row_time)),
                _ => None,
            })
            .collect()
    }

    pub fn finished_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, ViewCall::Finished))
            .count()
    }

    pub fn errors(&self) -> Vec<&StreamFailure> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ViewCall::Error(failure) => Some(failure),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl ViewAdapter for RecordingView {
    fn on_started(&mut self, request: &ScanRequest) {
        self.calls.push(ViewCall::Started {
            logfile: request.logfile.clone(),
            end_time: request.end_time,
        });
    }

    fn on_progress(&mut self, rows_scanned: u64, last_row_time: i64) {
        self.calls.push(ViewCall::Progress {
            rows_scanned,
            last_row_time,
        });
    }

    fn on_batch(&mut self, rows: &[LogRow]) {
        self.calls.push(ViewCall::Batch(rows.to_vec()));
    }

    fn on_finished(&mut self) {
        self.calls.push(ViewCall::Finished);
    }

    fn on_error(&mut self, failure: &StreamFailure) {
        self.calls.push(ViewCall::Error(failure.clone()));
    }
}
