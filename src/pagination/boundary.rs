use tracing::debug;

/// Time boundaries of the pages visited so far, oldest call first.
///
/// The first element is the view's original upper bound and is never
/// removed. The top is the `end_time` of the next older page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryStack {
    boundaries: Vec<i64>,
}

impl BoundaryStack {
    pub fn new(initial_end_time: i64) -> Self {
        Self {
            boundaries: vec![initial_end_time],
        }
    }

    pub fn top(&self) -> i64 {
        // Never empty: `new` seeds one element and `pop` keeps at least two
        self.boundaries[self.boundaries.len() - 1]
    }

    /// The boundary directly beneath the top
    pub fn previous(&self) -> Option<i64> {
        self.boundaries.len().checked_sub(2).map(|i| self.boundaries[i])
    }

    /// Append `time` if it is strictly older than the top
    pub fn push(&mut self, time: i64) -> bool {
        let top = self.top();
        if time >= top {
            debug!(time, top, "Rejected page boundary that is not older than the top");
            return false;
        }

        self.boundaries.push(time);
        true
    }

    /// Remove the top unless that would leave fewer than two boundaries
    pub fn pop(&mut self) -> Option<i64> {
        if !self.can_go_newer() {
            return None;
        }
        self.boundaries.pop()
    }

    pub fn can_go_older(&self) -> bool {
        true
    }

    pub fn can_go_newer(&self) -> bool {
        self.boundaries.len() > 2
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.boundaries
    }
}
