use super::types::{Result, ScanBatch, ScanRequest, LOGFILE_QUERY_CHANNEL};
use super::view::ViewAdapter;
use crate::stream::{ChannelHandle, Delivery, EventKind, EventSourceManager, StreamEvent, StreamFailure};
use tracing::{debug, info, warn};

/// Lifecycle of the controller's scan slot.
///
/// A scan ends by emitting `QueryEvent::Finished` or `QueryEvent::Failed`,
/// after which the controller is back in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Requesting,
    Streaming,
}

/// Listener tags the controller registers on its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryListener {
    Message,
    Error,
}

/// Accumulated progress of one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    pub end_time: i64,
    pub rows_scanned: u64,
    pub rows_received: usize,
    pub batches: usize,
    /// Time of the oldest row received so far
    pub last_row_time: Option<i64>,
}

impl ScanProgress {
    fn new(end_time: i64) -> Self {
        Self {
            end_time,
            rows_scanned: 0,
            rows_received: 0,
            batches: 0,
            last_row_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// A non-terminal batch was processed
    Batch { rows: usize },
    Finished(ScanProgress),
    Failed(ScanProgress, StreamFailure),
    /// The delivery belonged to a superseded or finished scan
    Ignored,
}

impl QueryEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryEvent::Finished(_) | QueryEvent::Failed(..))
    }
}

struct ActiveQuery {
    handle: ChannelHandle,
    request: ScanRequest,
    progress: ScanProgress,
}

/// Issues scans through the connection manager and turns their batches into
/// view updates.
///
/// Starting a scan while another is in flight replaces the channel, which
/// cancels the old scan; anything still arriving for it is dropped.
pub struct QueryController<V> {
    manager: EventSourceManager<QueryListener>,
    view: V,
    limit: usize,
    state: QueryState,
    active: Option<ActiveQuery>,
}

impl<V: ViewAdapter> QueryController<V> {
    pub fn new(manager: EventSourceManager<QueryListener>, view: V, limit: usize) -> Self {
        Self {
            manager,
            view,
            limit,
            state: QueryState::Idle,
            active: None,
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, QueryState::Requesting | QueryState::Streaming)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Progress of the scan in flight, if any
    pub fn progress(&self) -> Option<&ScanProgress> {
        self.active.as_ref().map(|active| &active.progress)
    }

    pub fn active_request(&self) -> Option<&ScanRequest> {
        self.active.as_ref().map(|active| &active.request)
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn manager(&self) -> &EventSourceManager<QueryListener> {
        &self.manager
    }

    /// Start scanning `logfile` backward from `end_time` (exclusive)
    pub fn execute(&mut self, logfile: &str, end_time: i64) -> Result<ChannelHandle> {
        let request = ScanRequest::new(logfile, end_time, self.limit)?;

        if let Some(previous) = self.active.take() {
            debug!(
                end_time = previous.request.end_time,
                rows_received = previous.progress.rows_received,
                "Cancelling in-flight scan"
            );
        }

        self.view.on_started(&request);

        let handle = self.manager.get(LOGFILE_QUERY_CHANNEL, &request.url());
        self.manager
            .add_listener(&handle, EventKind::Message, QueryListener::Message);
        self.manager
            .add_listener(&handle, EventKind::Error, QueryListener::Error);

        info!(
            logfile = %request.logfile,
            end_time = request.end_time,
            limit = request.limit,
            epoch = handle.epoch,
            "Issued scan"
        );

        self.active = Some(ActiveQuery {
            handle: handle.clone(),
            progress: ScanProgress::new(request.end_time),
            request,
        });
        self.state = QueryState::Requesting;

        Ok(handle)
    }

    /// Apply one routed event to the scan it belongs to
    pub fn handle(&mut self, delivery: Delivery<QueryListener>) -> QueryEvent {
        let is_current = self
            .active
            .as_ref()
            .is_some_and(|active| active.handle == delivery.handle);
        if !is_current {
            return QueryEvent::Ignored;
        }

        match (delivery.listener, delivery.event) {
            (QueryListener::Message, StreamEvent::Data { data, .. }) => {
                match ScanBatch::parse(&data) {
                    Ok(batch) => self.apply_batch(batch),
                    Err(e) => self.fail(StreamFailure::Fault(e.to_string())),
                }
            }
            (QueryListener::Error, StreamEvent::Failed(failure)) => self.fail(failure),
            _ => QueryEvent::Ignored,
        }
    }

    fn apply_batch(&mut self, batch: ScanBatch) -> QueryEvent {
        let Some(active) = self.active.as_mut() else {
            return QueryEvent::Ignored;
        };
        self.state = QueryState::Streaming;

        let progress = &mut active.progress;
        if batch.rows_scanned < progress.rows_scanned {
            warn!(
                previous = progress.rows_scanned,
                reported = batch.rows_scanned,
                "Server reported fewer scanned rows than before"
            );
        }
        progress.rows_scanned = progress.rows_scanned.max(batch.rows_scanned);
        progress.batches += 1;

        if let (Some(first), Some(last)) = (batch.result.first(), batch.result.last()) {
            if progress.last_row_time.is_some_and(|previous| first.time > previous) {
                warn!(
                    previous_last = progress.last_row_time,
                    batch_first = first.time,
                    "Scan batch is newer than the previous batch"
                );
            }
            progress.last_row_time = Some(last.time);
            progress.rows_received += batch.result.len();

            self.view.on_progress(batch.rows_scanned, last.time);
            self.view.on_batch(&batch.result);
        }

        if !batch.is_finished() {
            return QueryEvent::Batch {
                rows: batch.result.len(),
            };
        }

        self.manager.close(LOGFILE_QUERY_CHANNEL);
        self.state = QueryState::Idle;
        let progress = active.progress.clone();
        self.active = None;

        info!(
            end_time = progress.end_time,
            rows_scanned = progress.rows_scanned,
            rows_received = progress.rows_received,
            last_row_time = progress.last_row_time,
            "Scan finished"
        );
        self.view.on_finished();

        QueryEvent::Finished(progress)
    }

    fn fail(&mut self, failure: StreamFailure) -> QueryEvent {
        let Some(active) = self.active.take() else {
            return QueryEvent::Ignored;
        };

        self.manager.close(LOGFILE_QUERY_CHANNEL);
        self.state = QueryState::Idle;

        warn!(
            end_time = active.progress.end_time,
            rows_received = active.progress.rows_received,
            error = %failure,
            "Scan failed"
        );
        self.view.on_error(&failure);

        QueryEvent::Failed(active.progress, failure)
    }

    /// Wait for the next event that changes the active scan.
    ///
    /// Returns `None` when no scan is open.
    pub async fn next_event(&mut self) -> Option<QueryEvent> {
        loop {
            let deliveries = self.manager.next_deliveries().await?;

            let mut outcome = QueryEvent::Ignored;
            for delivery in deliveries {
                let event = self.handle(delivery);
                if event != QueryEvent::Ignored {
                    outcome = event;
                }
            }

            if outcome != QueryEvent::Ignored {
                return Some(outcome);
            }
        }
    }

    /// Drive the active scan until it finishes or fails
    pub async fn run_to_completion(&mut self) -> Option<QueryEvent> {
        while let Some(event) = self.next_event().await {
            if event.is_terminal() {
                return Some(event);
            }
        }
        None
    }

    /// Close every stream; safe to call more than once
    pub fn shutdown(&mut self) {
        let closed = self.manager.close_all();
        if self.active.take().is_some() || closed > 0 {
            debug!(closed, "Query controller shut down");
        }
        self.state = QueryState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingView, ScriptedTransport, ViewCall};
    use std::sync::Arc;

    fn controller(transport: &Arc<ScriptedTransport>) -> QueryController<RecordingView> {
        QueryController::new(
            EventSourceManager::new(transport.clone()),
            RecordingView::new(),
            100,
        )
    }

    fn url(end_time: i64) -> String {
        ScanRequest::new("access_log", end_time, 100).unwrap().url()
    }

    #[tokio::test]
    async fn test_execute_enters_requesting() {
        let transport = ScriptedTransport::new();
        let mut controller = controller(&transport);

        assert_eq!(controller.state(), QueryState::Idle);
        controller.execute("access_log", 1_000).unwrap();

        assert_eq!(controller.state(), QueryState::Requesting);
        assert!(controller.manager().is_open(LOGFILE_QUERY_CHANNEL));
        assert_eq!(
            controller.view().calls,
            vec![ViewCall::Started {
                logfile: "access_log".to_string(),
                end_time: 1_000
            }]
        );
    }

    #[tokio::test]
    async fn test_invalid_end_time_opens_nothing() {
        let transport = ScriptedTransport::new();
        let mut controller = controller(&transport);

        assert!(controller.execute("access_log", -5).is_err());
        assert!(!controller.manager().is_open(LOGFILE_QUERY_CHANNEL));
        assert_eq!(controller.state(), QueryState::Idle);
    }

    #[tokio::test]
    async fn test_running_batch_keeps_channel_open() {
        let transport = ScriptedTransport::new();
        let feed = transport.feed(&url(1_000));
        let mut controller = controller(&transport);
        controller.execute("access_log", 1_000).unwrap();

        feed.message(r#"{"result":[{"time":900,"raw":"a","columns":[]}],"rows_scanned":3,"status":"running"}"#);
        let event = controller.next_event().await.unwrap();

        assert_eq!(event, QueryEvent::Batch { rows: 1 });
        assert_eq!(controller.state(), QueryState::Streaming);
        assert!(controller.manager().is_open(LOGFILE_QUERY_CHANNEL));
        assert_eq!(controller.progress().unwrap().last_row_time, Some(900));
    }

    #[tokio::test]
    async fn test_empty_running_batch_emits_no_progress() {
        let transport = ScriptedTransport::new();
        let feed = transport.feed(&url(1_000));
        let mut controller = controller(&transport);
        controller.execute("access_log", 1_000).unwrap();

        feed.message(r#"{"result":[],"rows_scanned":50,"status":"running"}"#);
        controller.next_event().await.unwrap();

        assert!(controller.view().progress().is_empty());
        assert!(controller.view().batches().is_empty());
        assert_eq!(controller.progress().unwrap().rows_scanned, 50);
    }

    #[tokio::test]
    async fn test_malformed_batch_fails_scan() {
        let transport = ScriptedTransport::new();
        let feed = transport.feed(&url(1_000));
        let mut controller = controller(&transport);
        controller.execute("access_log", 1_000).unwrap();

        feed.message("not json");
        let event = controller.next_event().await.unwrap();

        assert!(matches!(event, QueryEvent::Failed(_, StreamFailure::Fault(_))));
        assert_eq!(controller.state(), QueryState::Idle);
        assert!(!controller.is_active());
        assert!(!controller.manager().is_open(LOGFILE_QUERY_CHANNEL));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let transport = ScriptedTransport::new();
        let mut controller = controller(&transport);
        controller.execute("access_log", 1_000).unwrap();

        controller.shutdown();
        controller.shutdown();

        assert_eq!(controller.state(), QueryState::Idle);
        assert_eq!(controller.manager().active_count(), 0);
        assert!(controller.next_event().await.is_none());
    }
}
