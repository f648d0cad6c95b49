use crate::query::{micros_to_datetime, LogRow, ScanRequest, ViewAdapter};
use crate::stream::StreamFailure;
use console::{style, Term};
use std::io::{self, Stdout, Write};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Renders scans as text: rows on `out`, transient progress on stderr.
pub struct TerminalView<W = Stdout> {
    out: W,
    columns: Vec<String>,
    progress: Option<Term>,
    rows_shown: usize,
}

impl TerminalView<Stdout> {
    pub fn stdout() -> Self {
        let stderr = Term::stderr();
        let progress = stderr.is_term().then_some(stderr);
        Self {
            out: io::stdout(),
            columns: Vec::new(),
            progress,
            rows_shown: 0,
        }
    }
}

impl<W: Write> TerminalView<W> {
    /// A view without a progress line, for non-interactive output
    pub fn new(out: W) -> Self {
        Self {
            out,
            columns: Vec::new(),
            progress: None,
            rows_shown: 0,
        }
    }

    /// Column names printed as a header above each page
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn clear_progress(&self) {
        if let Some(term) = &self.progress {
            let _ = term.clear_line();
        }
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            tracing::debug!(error = %e, "Failed to write to terminal");
        }
    }
}

pub fn format_time(micros: i64) -> String {
    micros_to_datetime(micros)
        .map(|dt| dt.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| micros.to_string())
}

fn format_row(row: &LogRow) -> String {
    let time = style(format_time(row.time)).cyan();
    if row.columns.is_empty() {
        format!("{}  {}", time, row.raw)
    } else {
        format!("{}  {}", time, row.columns.join("  "))
    }
}

impl<W: Write> ViewAdapter for TerminalView<W> {
    fn on_started(&mut self, request: &ScanRequest) {
        self.rows_shown = 0;
        let header = format!(
            "── {} before {}",
            request.logfile,
            format_time(request.end_time)
        );
        self.write_line(&style(header).bold().to_string());
        if !self.columns.is_empty() {
            let names = format!("{:26}  {}", "time", self.columns.join("  "));
            self.write_line(&style(names).dim().to_string());
        }
    }

    fn on_progress(&mut self, rows_scanned: u64, last_row_time: i64) {
        if let Some(term) = &self.progress {
            let _ = term.clear_line();
            let _ = term.write_str(&format!(
                "scanned {} lines, reached {}",
                rows_scanned,
                format_time(last_row_time)
            ));
        }
    }

    fn on_batch(&mut self, rows: &[LogRow]) {
        self.clear_progress();
        for row in rows {
            let line = format_row(row);
            self.write_line(&line);
        }
        self.rows_shown += rows.len();
        let _ = self.out.flush();
    }

    fn on_finished(&mut self) {
        self.clear_progress();
        let summary = match self.rows_shown {
            0 => "(no rows)".to_string(),
            1 => "(1 row)".to_string(),
            n => format!("({} rows)", n),
        };
        self.write_line(&style(summary).dim().to_string());
        let _ = self.out.flush();
    }

    fn on_error(&mut self, failure: &StreamFailure) {
        self.clear_progress();
        let message = format!("scan failed: {}", failure);
        self.write_line(&style(message).red().to_string());
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(view: TerminalView<Vec<u8>>) -> Vec<String> {
        let bytes = view.into_inner();
        console::strip_ansi_codes(&String::from_utf8(bytes).unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn row(time: i64, raw: &str, columns: &[&str]) -> LogRow {
        LogRow {
            time,
            raw: raw.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_format_time_microsecond_precision() {
        assert_eq!(format_time(1_764_816_131_000_042), "2025-12-04 02:42:11.000042");
    }

    #[test]
    fn test_renders_page() {
        let mut view = TerminalView::new(Vec::new()).with_columns(vec!["level".into(), "msg".into()]);
        let request = ScanRequest::new("app", 1_764_816_200_000_000, 10).unwrap();

        view.on_started(&request);
        view.on_batch(&[
            row(1_764_816_131_000_000, "x INFO ready", &["INFO", "ready"]),
            row(1_764_816_130_000_000, "continuation", &[]),
        ]);
        view.on_finished();

        let lines = rendered(view);
        assert_eq!(lines[0], "── app before 2025-12-04 02:43:20.000000");
        assert!(lines[1].starts_with("time"));
        assert_eq!(lines[2], "2025-12-04 02:42:11.000000  INFO  ready");
        assert_eq!(lines[3], "2025-12-04 02:42:10.000000  continuation");
        assert_eq!(lines[4], "(2 rows)");
    }

    #[test]
    fn test_renders_failure() {
        let mut view = TerminalView::new(Vec::new());

        view.on_error(&StreamFailure::Fault("stream closed by server".to_string()));

        assert_eq!(rendered(view), vec!["scan failed: stream fault: stream closed by server"]);
    }
}
