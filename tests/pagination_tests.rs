/// Pagination tests: a `LogViewer` walking a five-row logfile two rows at a
/// time, with every page served by a scripted transport.

use logscan::pagination::{BoundaryStack, LogViewer, NavigationParams, ViewerError};
use logscan::query::{
    LogRow, QueryController, QueryError, QueryEvent, ScanBatch, ScanProgress, ScanRequest,
    ScanStatus,
};
use logscan::stream::{EventSourceManager, StreamFailure};
use logscan::testing::{RecordingView, ScriptedFeed, ScriptedTransport};
use std::sync::Arc;

const LOGFILE: &str = "app";
const LIMIT: usize = 2;
const T0: i64 = 10_000;

/// Row times in the scripted logfile, oldest first
const FILE: [i64; 5] = [100, 200, 300, 400, 500];

struct Harness {
    transport: Arc<ScriptedTransport>,
    viewer: LogViewer<RecordingView>,
    feeds: Vec<ScriptedFeed>,
}

impl Harness {
    fn new() -> Self {
        let transport = ScriptedTransport::new();
        let controller = QueryController::new(
            EventSourceManager::new(transport.clone()),
            RecordingView::new(),
            LIMIT,
        );
        Self {
            transport,
            viewer: LogViewer::new(controller),
            feeds: Vec::new(),
        }
    }

    /// Queue the server's answer to the next scan ending at `end_time`
    fn serve(&mut self, end_time: i64) {
        let url = ScanRequest::new(LOGFILE, end_time, LIMIT).unwrap().url();
        let result: Vec<LogRow> = FILE
            .iter()
            .rev()
            .filter(|&&t| t < end_time)
            .take(LIMIT)
            .map(|&t| LogRow {
                time: t,
                raw: format!("{} line", t),
                columns: vec![],
            })
            .collect();
        let batch = ScanBatch {
            rows_scanned: result.len() as u64,
            result,
            status: ScanStatus::Finished,
        };

        let feed = self.transport.feed(&url);
        feed.message(serde_json::to_string(&batch).unwrap());
        self.feeds.push(feed);
    }

    async fn page(&mut self) -> Vec<i64> {
        self.viewer.view_mut().clear();
        let event = self.viewer.run_page().await.unwrap();
        assert!(matches!(event, QueryEvent::Finished(_)), "{:?}", event);
        self.viewer.view().rendered_times()
    }

    fn boundaries(&self) -> Vec<i64> {
        self.viewer.session().unwrap().boundaries.as_slice().to_vec()
    }

    async fn load(&mut self) -> Vec<i64> {
        self.serve(T0);
        self.viewer
            .load(&NavigationParams::new(LOGFILE).until(T0))
            .unwrap();
        self.page().await
    }

    async fn older(&mut self) -> Vec<i64> {
        let end_time = self.boundaries().last().copied().unwrap();
        self.serve(end_time);
        self.viewer.older().unwrap();
        self.page().await
    }
}

#[test]
fn test_push_rejects_equal_and_newer_boundaries() {
    let mut stack = BoundaryStack::new(1000);

    assert!(stack.push(900));
    assert!(!stack.push(900));
    assert!(!stack.push(1100));
    assert_eq!(stack.as_slice(), &[1000, 900]);
}

#[test]
fn test_pop_keeps_first_two_boundaries() {
    let mut stack = BoundaryStack::new(1000);
    stack.push(900);

    assert_eq!(stack.pop(), None);
    stack.push(800);
    assert_eq!(stack.pop(), Some(800));
    assert_eq!(stack.as_slice(), &[1000, 900]);
}

#[tokio::test]
async fn test_initial_load_renders_newest_page() {
    let mut h = Harness::new();

    assert_eq!(h.load().await, vec![500, 400]);
    assert_eq!(h.boundaries(), vec![T0, 400]);
    assert!(h.viewer.can_go_older());
    assert!(!h.viewer.can_go_newer());
    assert_eq!(h.viewer.page_end(), Some(T0));
}

#[tokio::test]
async fn test_older_walks_to_start_of_file() {
    let mut h = Harness::new();
    h.load().await;

    assert_eq!(h.older().await, vec![300, 200]);
    assert_eq!(h.boundaries(), vec![T0, 400, 200]);
    assert!(h.viewer.can_go_newer());

    assert_eq!(h.older().await, vec![100]);
    assert_eq!(h.boundaries(), vec![T0, 400, 200, 100]);

    // Nothing older than the first row: the stack stays put
    assert_eq!(h.older().await, Vec::<i64>::new());
    assert_eq!(h.boundaries(), vec![T0, 400, 200, 100]);
    assert_eq!(h.viewer.page_end(), Some(100));
}

#[tokio::test]
async fn test_newer_retraces_pages() {
    let mut h = Harness::new();
    h.load().await;
    h.older().await;
    h.older().await;
    h.older().await;

    // From the empty page back to the page holding the first row
    h.serve(200);
    assert!(h.viewer.newer().unwrap());
    assert_eq!(h.page().await, vec![100]);
    assert_eq!(h.boundaries(), vec![T0, 400, 200, 100]);

    h.serve(400);
    assert!(h.viewer.newer().unwrap());
    assert_eq!(h.page().await, vec![300, 200]);
    assert_eq!(h.boundaries(), vec![T0, 400, 200]);

    h.serve(T0);
    assert!(h.viewer.newer().unwrap());
    assert_eq!(h.page().await, vec![500, 400]);
    assert_eq!(h.boundaries(), vec![T0, 400]);

    assert!(!h.viewer.newer().unwrap());
    assert!(!h.viewer.can_go_newer());

    // Older again re-extends the same boundaries
    assert_eq!(h.older().await, vec![300, 200]);
    assert_eq!(h.boundaries(), vec![T0, 400, 200]);
}

#[tokio::test]
async fn test_reload_rescans_current_page() {
    let mut h = Harness::new();
    h.load().await;
    h.older().await;

    h.serve(400);
    h.viewer.reload().unwrap();

    assert_eq!(h.page().await, vec![300, 200]);
    assert_eq!(h.boundaries(), vec![T0, 400, 200]);
}

#[tokio::test]
async fn test_failed_page_does_not_extend_boundaries() {
    let mut h = Harness::new();
    h.load().await;

    let url = ScanRequest::new(LOGFILE, 400, LIMIT).unwrap().url();
    h.transport.refuse(&url);
    h.viewer.older().unwrap();

    let event = h.viewer.run_page().await.unwrap();
    assert!(matches!(
        event,
        QueryEvent::Failed(_, StreamFailure::TransportOpen(_))
    ));
    assert_eq!(h.boundaries(), vec![T0, 400]);
}

#[tokio::test]
async fn test_finish_below_top_does_not_extend_boundaries() {
    let mut h = Harness::new();
    h.load().await;

    // A scan that ended at an older boundary than the cursor only re-renders
    h.viewer.apply(&QueryEvent::Finished(ScanProgress {
        end_time: T0,
        rows_scanned: 2,
        rows_received: 2,
        batches: 1,
        last_row_time: Some(50),
    }));

    assert_eq!(h.boundaries(), vec![T0, 400]);
}

#[tokio::test]
async fn test_failed_load_keeps_current_view() {
    let mut h = Harness::new();
    h.serve(T0);
    h.viewer
        .load(&NavigationParams::new(LOGFILE).until(T0))
        .unwrap();

    let err = h
        .viewer
        .load(&NavigationParams::new("other").until(0))
        .unwrap_err();

    assert!(matches!(err, ViewerError::Query(QueryError::InvalidEndTime(0))));
    assert_eq!(h.viewer.session().unwrap().logfile, LOGFILE);
    assert_eq!(h.boundaries(), vec![T0]);
    assert_eq!(h.viewer.page_end(), Some(T0));
    assert_eq!(
        h.viewer.controller().active_request(),
        Some(&ScanRequest::new(LOGFILE, T0, LIMIT).unwrap())
    );

    // The first page's scan is still the one being delivered
    assert_eq!(h.page().await, vec![500, 400]);
    assert_eq!(h.boundaries(), vec![T0, 400]);
}

#[tokio::test]
async fn test_unusable_row_time_does_not_extend_boundaries() {
    let mut h = Harness::new();
    h.load().await;
    h.older().await;

    for last_row_time in [0, -5_000, i64::MIN] {
        h.viewer.apply(&QueryEvent::Finished(ScanProgress {
            end_time: 200,
            rows_scanned: 1,
            rows_received: 1,
            batches: 1,
            last_row_time: Some(last_row_time),
        }));
    }

    assert_eq!(h.boundaries(), vec![T0, 400, 200]);
    assert_eq!(h.older().await, vec![100]);
    assert_eq!(h.boundaries(), vec![T0, 400, 200, 100]);
}

#[tokio::test]
async fn test_navigation_requires_loaded_view() {
    let mut h = Harness::new();

    assert!(matches!(h.viewer.older(), Err(ViewerError::NotLoaded)));
    assert!(matches!(h.viewer.newer(), Err(ViewerError::NotLoaded)));
    assert!(matches!(h.viewer.reload(), Err(ViewerError::NotLoaded)));
    assert!(!h.viewer.can_go_older());
}

#[tokio::test]
async fn test_unload_discards_session() {
    let mut h = Harness::new();
    h.load().await;
    h.viewer.older().unwrap();

    h.viewer.unload();
    h.viewer.unload();

    assert!(h.viewer.session().is_none());
    assert_eq!(h.viewer.page_end(), None);
    assert!(h.viewer.next_event().await.is_none());
    assert!(matches!(h.viewer.older(), Err(ViewerError::NotLoaded)));
}
