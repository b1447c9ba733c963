//! Background worker for Moodle calls and exports.
//!
//! Handles running one long operation at a time:
//! - Login, course loading and visibility changes
//! - PDF export with progress reporting
//! - Event delivery to the UI thread over a channel

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use url::Url;

use crate::export::{ExportError, ExportJob, ExportSummary, PdfSettings};
use crate::moodle::{
    Course, Database, Glossary, MoodleApi, MoodleError, MoodleResult, Section, Session, Wiki,
};
use crate::security::Credentials;

/// Work the worker can run.
#[derive(Debug)]
pub enum Job {
    /// Authenticate and list the user's courses
    Login { site: Url, credentials: Credentials },
    /// Load sections, modules and exportable activities of a course
    LoadCourse { course_id: u64 },
    /// Show or hide modules, one call per module
    SetVisibility { module_ids: Vec<u64>, visible: bool },
    /// Fetch, render and write a PDF
    Export(ExportJob),
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::LoadCourse { .. } => "load-course",
            Self::SetVisibility { .. } => "set-visibility",
            Self::Export(_) => "export",
        }
    }
}

/// Everything shown under a course node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseContents {
    pub course_id: u64,
    pub sections: Vec<Section>,
    pub glossaries: Vec<Glossary>,
    pub wikis: Vec<Wiki>,
    pub databases: Vec<Database>,
}

/// Event from the worker thread.
#[derive(Debug)]
pub enum WorkerEvent {
    LoggedIn { session: Session, courses: Vec<Course> },
    LoginFailed(MoodleError),
    CourseLoaded(CourseContents),
    /// Export progress as `(done, overall)`
    Progress { done: usize, overall: usize },
    /// `applied` holds the modules that changed; `failed` the ones that did not
    VisibilityChanged { applied: Vec<u64>, failed: Vec<(u64, MoodleError)>, visible: bool },
    Exported(ExportSummary),
    ExportFailed(ExportError),
    /// A course load failed
    Failed(MoodleError),
}

impl WorkerEvent {
    /// Whether this event ends the running job.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Runs jobs on a background thread, one at a time.
pub struct Worker {
    api: Arc<dyn MoodleApi>,
    pdf: PdfSettings,
    event_tx: Sender<WorkerEvent>,
    event_rx: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
    busy: bool,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("busy", &self.busy).finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(api: Arc<dyn MoodleApi>, pdf: PdfSettings) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self { api, pdf, event_tx, event_rx, handle: None, busy: false }
    }

    /// Whether a job is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Start a job. Fails when another job is still running.
    pub fn submit(&mut self, session: Option<Session>, job: Job) -> anyhow::Result<()> {
        if self.busy {
            anyhow::bail!("another operation is still running");
        }

        let api = Arc::clone(&self.api);
        let pdf = self.pdf.clone();
        let event_tx = self.event_tx.clone();
        let name = job.name();

        let handle = thread::Builder::new().name(format!("moodle2pdf-{name}")).spawn(move || {
            let start = Instant::now();
            let event = run_job(api.as_ref(), session, &pdf, job, &event_tx);
            tracing::debug!(job = name, elapsed = ?start.elapsed(), "Job finished");
            let _ = event_tx.send(event);
        })?;

        // Reap the previous thread; it has already sent its final event.
        if let Some(previous) = self.handle.replace(handle) {
            let _ = previous.join();
        }
        self.busy = true;
        Ok(())
    }

    /// Drain pending events without blocking.
    pub fn poll_events(&mut self) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            self.track(&event);
            events.push(event);
        }
        events
    }

    /// Block until the running job finishes or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Vec<WorkerEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        while self.busy {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.event_rx.recv_timeout(remaining) {
                Ok(event) => {
                    self.track(&event);
                    events.push(event);
                }
                Err(_) => break,
            }
        }
        events
    }

    fn track(&mut self, event: &WorkerEvent) {
        if event.is_terminal() {
            self.busy = false;
        }
    }
}

fn run_job(
    api: &dyn MoodleApi,
    session: Option<Session>,
    pdf: &PdfSettings,
    job: Job,
    events: &Sender<WorkerEvent>,
) -> WorkerEvent {
    match job {
        Job::Login { site, credentials } => match login(api, &site, &credentials) {
            Ok((session, courses)) => WorkerEvent::LoggedIn { session, courses },
            Err(e) => WorkerEvent::LoginFailed(e),
        },
        Job::LoadCourse { course_id } => {
            match require(session.as_ref()).and_then(|s| load_course(api, s, course_id)) {
                Ok(contents) => WorkerEvent::CourseLoaded(contents),
                Err(e) => WorkerEvent::Failed(e),
            }
        }
        Job::SetVisibility { module_ids, visible } => {
            let session = match require(session.as_ref()) {
                Ok(session) => session,
                Err(e) => return WorkerEvent::Failed(e),
            };
            let mut applied = Vec::new();
            let mut failed = Vec::new();
            for id in module_ids {
                match api.set_module_visibility(session, id, visible) {
                    Ok(()) => applied.push(id),
                    Err(e) => {
                        tracing::warn!(module = id, error = %e, "Visibility change failed");
                        failed.push((id, e));
                    }
                }
            }
            WorkerEvent::VisibilityChanged { applied, failed, visible }
        }
        Job::Export(export) => {
            let session = match require(session.as_ref()) {
                Ok(session) => session,
                Err(e) => return WorkerEvent::ExportFailed(e.into()),
            };
            let progress = |done, overall| {
                let _ = events.send(WorkerEvent::Progress { done, overall });
            };
            match export.run(api, session, pdf, progress) {
                Ok(summary) => WorkerEvent::Exported(summary),
                Err(e) => WorkerEvent::ExportFailed(e),
            }
        }
    }
}

fn require(session: Option<&Session>) -> MoodleResult<&Session> {
    session.ok_or_else(|| MoodleError::Auth("not logged in".to_string()))
}

/// Authenticate and list courses.
pub fn login(
    api: &dyn MoodleApi,
    site: &Url,
    credentials: &Credentials,
) -> MoodleResult<(Session, Vec<Course>)> {
    let session = api.authenticate(site, credentials)?;
    let courses = api.courses(&session)?;
    tracing::info!(site = %session.site, courses = courses.len(), "Logged in");
    Ok((session, courses))
}

/// Fetch modules, glossaries, wikis and databases of one course.
pub fn load_course(
    api: &dyn MoodleApi,
    session: &Session,
    course_id: u64,
) -> MoodleResult<CourseContents> {
    Ok(CourseContents {
        course_id,
        sections: api.course_contents(session, course_id)?,
        glossaries: api.glossaries(session, course_id)?,
        wikis: api.wikis(session, course_id)?,
        databases: api.databases(session, course_id)?,
    })
}
