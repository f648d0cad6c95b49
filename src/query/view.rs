use super::types::{LogRow, ScanRequest};
use crate::stream::StreamFailure;

/// Rendering side of a scan.
///
/// Batches arrive in the order the server produced them and must be
/// rendered in that order.
pub trait ViewAdapter {
    /// A scan was issued; nothing has been received yet
    fn on_started(&mut self, _request: &ScanRequest) {}

    fn on_progress(&mut self, rows_scanned: u64, last_row_time: i64);

    fn on_batch(&mut self, rows: &[LogRow]);

    fn on_finished(&mut self);

    /// The scan failed; rows already rendered stay on screen
    fn on_error(&mut self, failure: &StreamFailure);
}
