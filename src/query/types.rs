use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rows per scan when the caller does not override it
pub const DEFAULT_SCAN_LIMIT: usize = 100;

pub const SCAN_ENDPOINT: &str = "/api/v1/logfiles/scan";

/// The single channel scans are issued on
pub const LOGFILE_QUERY_CHANNEL: &str = "logfile_query";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("logfile name cannot be empty")]
    EmptyLogfile,

    #[error("end time {0} is not a valid microsecond timestamp")]
    InvalidEndTime(i64),

    #[error("scan limit must be positive")]
    InvalidLimit,

    #[error("malformed scan batch: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// Current time in microseconds since the epoch
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

pub fn micros_to_datetime(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
}

/// Whether a scan may end at `micros`: positive and representable as a date
pub fn is_valid_end_time(micros: i64) -> bool {
    micros > 0 && micros_to_datetime(micros).is_some()
}

/// Parameters for one streaming scan.
///
/// Same parameters yield the same result set, modulo the log file growing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub logfile: String,
    /// Exclusive upper bound of the scan, microseconds since the epoch
    pub end_time: i64,
    pub limit: usize,
}

impl ScanRequest {
    pub fn new(logfile: impl Into<String>, end_time: i64, limit: usize) -> Result<Self> {
        let logfile = logfile.into();
        if logfile.is_empty() {
            return Err(QueryError::EmptyLogfile);
        }
        if !is_valid_end_time(end_time) {
            return Err(QueryError::InvalidEndTime(end_time));
        }
        if limit == 0 {
            return Err(QueryError::InvalidLimit);
        }

        Ok(Self {
            logfile,
            end_time,
            limit,
        })
    }

    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("logfile", &self.logfile)
            .append_pair("time", &self.end_time.to_string())
            .append_pair("limit", &self.limit.to_string())
            .finish()
    }

    /// Path and query of the streaming scan endpoint for this request
    pub fn url(&self) -> String {
        format!("{}?{}", SCAN_ENDPOINT, self.query_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    /// Microseconds since the epoch
    pub time: i64,
    pub raw: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Finished,
}

/// One pushed message of a scan stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanBatch {
    /// Newest row first; may be empty
    #[serde(default)]
    pub result: Vec<LogRow>,

    /// Raw rows scanned so far in this stream (cumulative)
    pub rows_scanned: u64,

    pub status: ScanStatus,
}

impl ScanBatch {
    pub fn parse(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn is_finished(&self) -> bool {
        self.status == ScanStatus::Finished
    }

    /// Time of the oldest row in this batch
    pub fn last_row_time(&self) -> Option<i64> {
        self.result.last().map(|row| row.time)
    }
}
