use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("regex compilation failed: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("pattern missing 'ts' capture group")]
    MissingTsGroup,

    #[error("failed to parse timestamp '{value}' with format '{format}': {reason}")]
    Timestamp {
        value: String,
        format: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TimeFormat {
    Iso8601,
    Epoch,
    EpochMs,
    EpochUs,
    Strptime { format: String, has_zone: bool },
}

impl TimeFormat {
    fn from_name(name: &str) -> Self {
        match name {
            "iso8601" => TimeFormat::Iso8601,
            "epoch" => TimeFormat::Epoch,
            "epoch_ms" => TimeFormat::EpochMs,
            "epoch_us" => TimeFormat::EpochUs,
            other => TimeFormat::Strptime {
                format: other.to_string(),
                has_zone: ["%z", "%Z", "%:z"].iter().any(|z| other.contains(z)),
            },
        }
    }

    fn name(&self) -> &str {
        match self {
            TimeFormat::Iso8601 => "iso8601",
            TimeFormat::Epoch => "epoch",
            TimeFormat::EpochMs => "epoch_ms",
            TimeFormat::EpochUs => "epoch_us",
            TimeFormat::Strptime { format, .. } => format,
        }
    }
}

/// A log line split into its timestamp and column values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Microseconds since the epoch
    pub time: i64,
    pub columns: Vec<String>,
}

/// Extracts the timestamp and named fields from log lines.
///
/// The pattern must have a `ts` group. Every other named group becomes a
/// column, in the order the groups appear in the pattern.
#[derive(Debug, Clone)]
pub struct LineParser {
    pattern: Regex,
    format: TimeFormat,
    columns: Vec<String>,
}

impl LineParser {
    pub fn new(pattern: &str, format: &str) -> Result<Self, ParseError> {
        let pattern = Regex::new(pattern)?;

        let mut has_ts = false;
        let mut columns = Vec::new();
        for name in pattern.capture_names().flatten() {
            if name == "ts" {
                has_ts = true;
            } else {
                columns.push(name.to_string());
            }
        }

        if !has_ts {
            return Err(ParseError::MissingTsGroup);
        }

        Ok(Self {
            pattern,
            format: TimeFormat::from_name(format),
            columns,
        })
    }

    /// Column names in pattern order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns `Ok(None)` when the line does not match the pattern
    pub fn parse(&self, line: &str) -> Result<Option<ParsedLine>, ParseError> {
        let Some(captures) = self.pattern.captures(line) else {
            return Ok(None);
        };
        let Some(ts) = captures.name("ts") else {
            return Ok(None);
        };

        let time = self.parse_time(ts.as_str())?;
        let columns = self
            .columns
            .iter()
            .map(|name| {
                captures
                    .name(name)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
            .collect();

        Ok(Some(ParsedLine { time, columns }))
    }

    fn parse_time(&self, value: &str) -> Result<i64, ParseError> {
        let error = |reason: String| ParseError::Timestamp {
            value: value.to_string(),
            format: self.format.name().to_string(),
            reason,
        };

        let datetime: DateTime<Utc> = match &self.format {
            TimeFormat::Iso8601 => DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| error(e.to_string()))?,
            TimeFormat::Epoch => {
                let secs: i64 = value.parse().map_err(|e: std::num::ParseIntError| error(e.to_string()))?;
                Utc.timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| error("timestamp out of range".to_string()))?
            }
            TimeFormat::EpochMs => {
                let millis: i64 = value.parse().map_err(|e: std::num::ParseIntError| error(e.to_string()))?;
                DateTime::from_timestamp_millis(millis)
                    .ok_or_else(|| error("timestamp out of range".to_string()))?
            }
            TimeFormat::EpochUs => {
                let micros: i64 = value.parse().map_err(|e: std::num::ParseIntError| error(e.to_string()))?;
                DateTime::from_timestamp_micros(micros)
                    .ok_or_else(|| error("timestamp out of range".to_string()))?
            }
            TimeFormat::Strptime { format, has_zone: true } => {
                DateTime::parse_from_str(value, format)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| error(e.to_string()))?
            }
            TimeFormat::Strptime { format, has_zone: false } => {
                // Zone-less formats are read as UTC
                NaiveDateTime::parse_from_str(value, format)
                    .map(|ndt| Utc.from_utc_datetime(&ndt))
                    .map_err(|e| error(e.to_string()))?
            }
        };

        Ok(datetime.timestamp_micros())
    }
}
