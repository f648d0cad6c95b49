use super::session::{NavigationParams, ViewSession};
use crate::query::{is_valid_end_time, QueryController, QueryError, QueryEvent, ViewAdapter};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("no logfile view is loaded")]
    NotLoaded,

    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Paginated view over one logfile: a session, its boundary stack and the
/// controller that scans each page.
///
/// A scan issued at the top of the stack extends the stack with its oldest
/// row time when it finishes; scans at any other boundary only re-render.
pub struct LogViewer<V> {
    controller: QueryController<V>,
    session: Option<ViewSession>,
    page_end: Option<i64>,
}

impl<V: ViewAdapter> LogViewer<V> {
    pub fn new(controller: QueryController<V>) -> Self {
        Self {
            controller,
            session: None,
            page_end: None,
        }
    }

    pub fn session(&self) -> Option<&ViewSession> {
        self.session.as_ref()
    }

    pub fn controller(&self) -> &QueryController<V> {
        &self.controller
    }

    pub fn view(&self) -> &V {
        self.controller.view()
    }

    pub fn view_mut(&mut self) -> &mut V {
        self.controller.view_mut()
    }

    /// End time of the most recently requested page
    pub fn page_end(&self) -> Option<i64> {
        self.page_end
    }

    pub fn can_go_older(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.boundaries.can_go_older())
    }

    pub fn can_go_newer(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.boundaries.can_go_newer())
    }

    /// Start a fresh session, replacing any scan in flight.
    ///
    /// On error the current session, page and scan are left untouched.
    pub fn load(&mut self, params: &NavigationParams) -> Result<()> {
        let session = ViewSession::new(params);
        let end_time = session.boundaries.top();
        self.controller.execute(&session.logfile, end_time)?;

        info!(
            logfile = %session.logfile,
            end_time = session.initial_end_time,
            "Loaded logfile view"
        );
        self.session = Some(session);
        self.page_end = Some(end_time);
        Ok(())
    }

    /// Scan the page just older than everything seen so far
    pub fn older(&mut self) -> Result<()> {
        let end_time = self
            .session()
            .ok_or(ViewerError::NotLoaded)?
            .boundaries
            .top();
        self.request(end_time)
    }

    /// Go back one page toward the original boundary.
    ///
    /// Returns false without scanning when already on one of the first pages.
    pub fn newer(&mut self) -> Result<bool> {
        let page_end = self.page_end;
        let session = self.session.as_mut().ok_or(ViewerError::NotLoaded)?;
        if !session.boundaries.can_go_newer() {
            return Ok(false);
        }

        // The displayed page's own boundary is the top only when its scan
        // found nothing older; otherwise the top is the next page's cursor.
        if page_end != Some(session.boundaries.top()) {
            session.boundaries.pop();
        }

        let Some(end_time) = session.boundaries.previous() else {
            return Ok(false);
        };

        debug!(end_time, boundaries = session.boundaries.len(), "Navigating to newer page");
        self.request(end_time)?;
        Ok(true)
    }

    /// Scan the current page again
    pub fn reload(&mut self) -> Result<()> {
        let end_time = match self.page_end {
            Some(end_time) => end_time,
            None => self.session().ok_or(ViewerError::NotLoaded)?.boundaries.top(),
        };
        self.request(end_time)
    }

    fn request(&mut self, end_time: i64) -> Result<()> {
        let logfile = self
            .session()
            .ok_or(ViewerError::NotLoaded)?
            .logfile
            .clone();

        self.controller.execute(&logfile, end_time)?;
        self.page_end = Some(end_time);
        Ok(())
    }

    /// Fold a controller event into the session
    pub fn apply(&mut self, event: &QueryEvent) {
        let QueryEvent::Finished(progress) = event else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if progress.end_time != session.boundaries.top() {
            return;
        }

        if let Some(last_row_time) = progress.last_row_time {
            // The next older page could never be requested from here
            if !is_valid_end_time(last_row_time) {
                debug!(boundary = last_row_time, "Ignoring unusable page boundary");
                return;
            }
            if session.boundaries.push(last_row_time) {
                debug!(
                    boundary = last_row_time,
                    boundaries = session.boundaries.len(),
                    "Extended page boundaries"
                );
            }
        }
    }

    pub async fn next_event(&mut self) -> Option<QueryEvent> {
        let event = self.controller.next_event().await?;
        self.apply(&event);
        Some(event)
    }

    /// Drive the current page's scan to its end
    pub async fn run_page(&mut self) -> Option<QueryEvent> {
        while let Some(event) = self.next_event().await {
            if event.is_terminal() {
                return Some(event);
            }
        }
        None
    }

    /// Tear the view down; safe to call more than once
    pub fn unload(&mut self) {
        self.controller.shutdown();
        if self.session.take().is_some() {
            debug!("Unloaded logfile view");
        }
        self.page_end = None;
    }
}
