pub mod controller;
pub mod types;
pub mod view;

pub use controller::{QueryController, QueryEvent, QueryListener, QueryState, ScanProgress};
pub use types::{
    is_valid_end_time, micros_to_datetime, now_micros, LogRow, QueryError, ScanBatch, ScanRequest, ScanStatus,
    DEFAULT_SCAN_LIMIT, LOGFILE_QUERY_CHANNEL, SCAN_ENDPOINT,
};
pub use view::ViewAdapter;
