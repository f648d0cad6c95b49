use super::parser::{LineParser, ParseError};
use super::reverse::{ReverseLines, READ_BLOCK_SIZE};
use crate::catalog::LogfileDefinition;
use crate::config::types::ServerConfig;
use crate::query::{LogRow, ScanBatch, ScanStatus};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unknown logfile '{0}'")]
    UnknownLogfile(String),

    #[error("failed to read logfile '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("logfile '{name}': {source}")]
    Parser {
        name: String,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Clone)]
struct StoredLogfile {
    path: PathBuf,
    parser: LineParser,
    description: Option<String>,
}

/// The logfiles a server exposes, keyed by name
#[derive(Debug, Clone, Default)]
pub struct LogfileStore {
    logfiles: BTreeMap<String, StoredLogfile>,
}

impl LogfileStore {
    pub fn from_config(config: &ServerConfig) -> Result<Self, ScanError> {
        let mut store = Self::default();
        for (name, logfile) in &config.logfiles {
            let parser = LineParser::new(&logfile.pattern, &logfile.format).map_err(|source| {
                ScanError::Parser {
                    name: name.clone(),
                    source,
                }
            })?;
            store.insert(name, logfile.path.clone(), parser, logfile.description.clone());
        }
        Ok(store)
    }

    pub fn insert(
        &mut self,
        name: &str,
        path: PathBuf,
        parser: LineParser,
        description: Option<String>,
    ) {
        self.logfiles.insert(
            name.to_string(),
            StoredLogfile {
                path,
                parser,
                description,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.logfiles.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.logfiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logfiles.is_empty()
    }

    pub fn definitions(&self) -> Vec<LogfileDefinition> {
        self.logfiles
            .iter()
            .map(|(name, logfile)| LogfileDefinition {
                name: name.clone(),
                description: logfile.description.clone(),
                columns: logfile.parser.columns().to_vec(),
                extra: BTreeMap::new(),
            })
            .collect()
    }

    /// Open `name` and prepare a scan backward from `end_time` (exclusive)
    pub async fn scan(
        &self,
        name: &str,
        end_time: i64,
        limit: usize,
        batch_size: usize,
    ) -> Result<BackwardScan<File>, ScanError> {
        let logfile = self
            .logfiles
            .get(name)
            .ok_or_else(|| ScanError::UnknownLogfile(name.to_string()))?;
        let io_error = |source: std::io::Error| ScanError::Io {
            path: logfile.path.clone(),
            source,
        };

        let file = File::open(&logfile.path).await.map_err(io_error)?;
        let lines = ReverseLines::new(file, READ_BLOCK_SIZE)
            .await
            .map_err(io_error)?;

        debug!(
            logfile = %name,
            path = %logfile.path.display(),
            end_time,
            limit,
            "Starting backward scan"
        );

        Ok(BackwardScan::new(
            lines,
            logfile.parser.clone(),
            end_time,
            limit,
            batch_size,
        ))
    }
}

/// Walks a logfile from its last line toward its first.
///
/// Each batch examines at most `batch_size` raw lines. Rows strictly older
/// than `end_time` are returned newest first until `limit` rows have been
/// produced or the start of the file is reached; that batch is `finished`
/// and ends the scan.
#[derive(Debug)]
pub struct BackwardScan<R> {
    lines: ReverseLines<R>,
    parser: LineParser,
    end_time: i64,
    limit: usize,
    batch_size: usize,
    rows_scanned: u64,
    rows_returned: usize,
    done: bool,
}

impl<R: AsyncRead + AsyncSeek + Unpin> BackwardScan<R> {
    pub fn new(
        lines: ReverseLines<R>,
        parser: LineParser,
        end_time: i64,
        limit: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            lines,
            parser,
            end_time,
            limit,
            batch_size: batch_size.max(1),
            rows_scanned: 0,
            rows_returned: 0,
            done: false,
        }
    }

    /// Read the next batch, or `None` once the finished batch has been returned
    pub async fn next_batch(&mut self) -> std::io::Result<Option<ScanBatch>> {
        if self.done {
            return Ok(None);
        }

        let mut result = Vec::new();
        let mut examined = 0;
        while examined < self.batch_size && self.rows_returned + result.len() < self.limit {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            };
            examined += 1;
            self.rows_scanned += 1;

            match self.parser.parse(&line) {
                Ok(Some(parsed)) if parsed.time < self.end_time => result.push(LogRow {
                    time: parsed.time,
                    raw: line,
                    columns: parsed.columns,
                }),
                Ok(_) => {}
                Err(e) => trace!(rows_scanned = self.rows_scanned, error = %e, "Skipping unparseable line"),
            }
        }

        self.rows_returned += result.len();
        self.done = self.lines.is_exhausted() || self.rows_returned >= self.limit;

        Ok(Some(ScanBatch {
            result,
            rows_scanned: self.rows_scanned,
            status: if self.done {
                ScanStatus::Finished
            } else {
                ScanStatus::Running
            },
        }))
    }
}
