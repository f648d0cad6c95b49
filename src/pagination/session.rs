use super::boundary::BoundaryStack;
use crate::query::now_micros;

/// Navigation inputs already resolved by whoever owns the URL/CLI state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationParams {
    pub logfile: String,
    /// Upper bound override in microseconds; defaults to now
    pub until: Option<i64>,
}

impl NavigationParams {
    pub fn new(logfile: impl Into<String>) -> Self {
        Self {
            logfile: logfile.into(),
            until: None,
        }
    }

    pub fn until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn resolve_end_time(&self) -> i64 {
        self.until.unwrap_or_else(now_micros)
    }
}

/// Per-view state, created when a view loads and dropped when it unloads
#[derive(Debug, Clone)]
pub struct ViewSession {
    pub logfile: String,
    pub initial_end_time: i64,
    pub boundaries: BoundaryStack,
}

impl ViewSession {
    pub fn new(params: &NavigationParams) -> Self {
        let initial_end_time = params.resolve_end_time();

        Self {
            logfile: params.logfile.clone(),
            initial_end_time,
            boundaries: BoundaryStack::new(initial_end_time),
        }
    }
}
