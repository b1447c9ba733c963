//! Application state and lifecycle management.
//!
//! This module contains the `App` struct that holds the editor state: the
//! session, the course tree, the export selection and the open dialog. Long
//! operations go to the [`Worker`]; their results come back as
//! [`WorkerEvent`]s that are applied in [`App::handle_event`].

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::core::{Config, CourseContents, Job, Locale, Message, Translator, Worker, WorkerEvent};
use crate::export::{
    open_in_viewer, with_pdf_extension, ExportError, ExportItem, ExportJob, ExportKind, ExportMode,
    PdfSettings,
};
use crate::moodle::{parse_site_url, Course, MoodleApi, MoodleError, Session};
use crate::security::Credentials;
use crate::tui::Theme;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    LoggedOut,
    Authenticating,
    LoggedIn,
    /// Loading a course
    Loading,
    /// Changing module visibility
    Updating,
    Exporting,
}

impl SessionState {
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Authenticating | Self::Loading | Self::Updating | Self::Exporting)
    }
}

/// Focused field of the credentials dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialField {
    #[default]
    Username,
    Password,
}

/// A modal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBox {
    pub title: String,
    pub text: String,
    pub error: bool,
}

/// Application modes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AppMode {
    /// Browsing the course tree
    #[default]
    Normal,
    /// Entering the site URL
    SiteDialog,
    /// Entering username and password
    CredentialsDialog(CredentialField),
    /// Entering the output file name
    OutputDialog,
    /// Showing a message box
    Message(MessageBox),
}

/// A single-line text field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    pub value: String,
    /// Cursor position in characters
    pub cursor: usize,
    /// Render as `*`
    pub masked: bool,
}

impl TextInput {
    pub fn with_value(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        Self { value, cursor, masked: false }
    }

    pub fn masked() -> Self {
        Self { masked: true, ..Self::default() }
    }

    fn byte_index(&self) -> usize {
        self.value.char_indices().nth(self.cursor).map_or(self.value.len(), |(i, _)| i)
    }

    pub fn enter_char(&mut self, c: char) {
        let index = self.byte_index();
        self.value.insert(index, c);
        self.cursor += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let index = self.byte_index();
            self.value.remove(index);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Text as it should be drawn.
    pub fn display(&self) -> String {
        if self.masked {
            "*".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }
}

/// A course under the site node.
#[derive(Debug, Clone)]
pub struct CourseNode {
    pub course: Course,
    pub expanded: bool,
    pub contents: Option<CourseContents>,
}

/// What a tree row stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Site,
    Course { course_id: u64 },
    Section { course_id: u64, section_id: u64 },
    Module { course_id: u64, module_id: u64 },
    Export { course_id: u64, item: ExportItem },
}

/// One visible line of the course tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub kind: RowKind,
    pub label: String,
    /// Visibility flag for sections and modules
    pub visible: Option<bool>,
    /// Export checkbox for glossaries, wikis and databases
    pub checked: Option<bool>,
    /// Expansion state for the site and courses
    pub expanded: Option<bool>,
}

/// Status bar message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub error: bool,
}

/// Main application state.
///
/// The `App` struct is the central state container for moodle2pdf. It manages:
/// - The session and its lifecycle state
/// - The course tree and the cursor
/// - The export selection
/// - Dialogs and the status bar
#[derive(Debug)]
pub struct App {
    /// Application configuration
    pub config: Config,

    /// Current UI theme
    pub theme: Theme,

    /// Translator for the configured language
    pub translator: Translator,

    /// Current mode (dialogs and message boxes)
    pub mode: AppMode,

    /// Where the session is in its lifecycle
    pub state: SessionState,

    /// Active session, only set after a successful login
    pub session: Option<Session>,

    /// Courses of the logged in user
    pub courses: Vec<CourseNode>,

    /// Cursor position in the tree
    pub selected: usize,

    /// Items checked for export, in selection order
    pub export_selection: Vec<ExportItem>,

    /// Combine all items into one PDF file
    pub combine: bool,

    /// Export progress as `(done, overall)`
    pub progress: Option<(usize, usize)>,

    /// Status bar message
    pub status: Option<Status>,

    /// Site URL dialog input
    pub site_input: TextInput,

    /// Credentials dialog inputs
    pub username_input: TextInput,
    pub password_input: TextInput,

    /// Output file dialog input
    pub output_input: TextInput,

    /// Site waiting for credentials
    pending_site: Option<Url>,

    /// Whether the application should quit
    pub should_quit: bool,

    worker: Worker,
}

impl App {
    /// Create the application state.
    pub fn new(config: Config, api: Arc<dyn MoodleApi>) -> Self {
        let translator = Translator::new(Locale::from_setting(&config.ui.language));
        let theme = Theme::by_name(&config.ui.theme).unwrap_or_default();
        let worker = Worker::new(api, PdfSettings::from_config(&config.pdf));

        Self {
            theme,
            translator,
            mode: AppMode::Normal,
            state: SessionState::LoggedOut,
            session: None,
            courses: Vec::new(),
            selected: 0,
            export_selection: Vec::new(),
            combine: true,
            progress: None,
            status: None,
            site_input: TextInput::with_value(config.moodle.url.clone()),
            username_input: TextInput::default(),
            password_input: TextInput::masked(),
            output_input: TextInput::with_value(config.pdf.default_output_filename.clone()),
            pending_site: None,
            should_quit: false,
            worker,
            config,
        }
    }

    /// Translate a catalog message.
    pub fn tr(&self, message: Message) -> &'static str {
        self.translator.tr(message)
    }

    /// Label of the root node.
    pub fn site_label(&self) -> String {
        match &self.session {
            Some(session) => self.translator.format(Message::MoodleSite, session.site.as_str()),
            None => self.tr(Message::MoodleSiteRoot).to_string(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy() || self.worker.is_busy()
    }

    // ------------------------------------------------------------------
    // Status and dialogs
    // ------------------------------------------------------------------

    pub fn set_status(&mut self, message: Message) {
        self.status = Some(Status { text: self.tr(message).to_string(), error: false });
    }

    pub fn set_error_status(&mut self, detail: impl std::fmt::Display) {
        let text = format!("{}: {detail}", self.tr(Message::Error));
        self.status = Some(Status { text, error: true });
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    fn show_message(&mut self, title: Message, text: impl Into<String>, error: bool) {
        self.mode = AppMode::Message(MessageBox {
            title: self.tr(title).to_string(),
            text: text.into(),
            error,
        });
    }

    pub fn show_about(&mut self) {
        self.show_message(Message::About, self.tr(Message::AboutText), false);
    }

    /// Close the current dialog or message box.
    pub fn dismiss(&mut self) {
        if matches!(self.mode, AppMode::CredentialsDialog(_)) {
            self.password_input.clear();
            self.pending_site = None;
        }
        self.mode = AppMode::Normal;
    }

    /// Refuse new work while an operation is in flight.
    fn ensure_idle(&mut self) -> bool {
        if self.is_busy() {
            self.set_status(Message::Busy);
            false
        } else {
            true
        }
    }

    /// Quit unless an operation is still running.
    pub fn quit(&mut self) {
        if self.ensure_idle() {
            self.should_quit = true;
        }
    }

    /// Quit without waiting for the worker.
    pub fn force_quit(&mut self) {
        self.should_quit = true;
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    /// Open the site URL dialog.
    pub fn open_site_dialog(&mut self) {
        if !self.ensure_idle() {
            return;
        }
        if let Some(session) = &self.session {
            self.site_input = TextInput::with_value(session.site.as_str());
        }
        self.mode = AppMode::SiteDialog;
    }

    /// Accept the site URL and ask for credentials.
    pub fn submit_site(&mut self) {
        match parse_site_url(&self.site_input.value) {
            Ok(site) => {
                self.pending_site = Some(site);
                self.password_input.clear();
                self.mode = AppMode::CredentialsDialog(CredentialField::Username);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected site URL");
                self.mode = AppMode::Normal;
                self.auth_failed();
            }
        }
    }

    /// Switch focus between username and password.
    pub fn next_credential_field(&mut self) {
        if let AppMode::CredentialsDialog(field) = self.mode {
            self.mode = AppMode::CredentialsDialog(match field {
                CredentialField::Username => CredentialField::Password,
                CredentialField::Password => CredentialField::Username,
            });
        }
    }

    /// The input that has focus in the current dialog.
    pub fn focused_input(&mut self) -> Option<&mut TextInput> {
        match self.mode {
            AppMode::SiteDialog => Some(&mut self.site_input),
            AppMode::CredentialsDialog(CredentialField::Username) => Some(&mut self.username_input),
            AppMode::CredentialsDialog(CredentialField::Password) => Some(&mut self.password_input),
            AppMode::OutputDialog => Some(&mut self.output_input),
            _ => None,
        }
    }

    /// Start authentication with the entered credentials.
    ///
    /// The dialog stays open while username or password is blank.
    pub fn submit_credentials(&mut self) {
        let credentials =
            Credentials::new(self.username_input.value.trim(), self.password_input.value.as_str());
        if !credentials.is_complete() {
            let field = if credentials.username.trim().is_empty() {
                CredentialField::Username
            } else {
                CredentialField::Password
            };
            self.mode = AppMode::CredentialsDialog(field);
            self.set_status(Message::EnterCredentials);
            return;
        }
        let Some(site) = self.pending_site.take() else {
            self.mode = AppMode::Normal;
            return;
        };
        self.password_input.clear();
        self.mode = AppMode::Normal;

        // A new login always replaces the old session.
        self.session = None;
        self.courses.clear();
        self.export_selection.clear();
        self.selected = 0;

        self.state = SessionState::Authenticating;
        self.set_status(Message::LoggingIn);
        if let Err(e) = self.worker.submit(None, Job::Login { site, credentials }) {
            tracing::error!(error = %e, "Could not start login");
            self.auth_failed();
        }
    }

    fn auth_failed(&mut self) {
        self.session = None;
        self.courses.clear();
        self.export_selection.clear();
        self.selected = 0;
        self.state = SessionState::LoggedOut;
        self.clear_status();
        self.show_message(Message::Error, self.tr(Message::WrongCredentials), true);
    }

    // ------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------

    /// Visible rows of the course tree, top to bottom.
    pub fn rows(&self) -> Vec<TreeRow> {
        let mut rows = vec![TreeRow {
            depth: 0,
            kind: RowKind::Site,
            label: self.site_label(),
            visible: None,
            checked: None,
            expanded: Some(self.session.is_some()),
        }];

        for node in &self.courses {
            let course_id = node.course.id;
            rows.push(TreeRow {
                depth: 1,
                kind: RowKind::Course { course_id },
                label: node.course.fullname.clone(),
                visible: None,
                checked: None,
                expanded: Some(node.expanded),
            });

            let Some(contents) = node.contents.as_ref().filter(|_| node.expanded) else {
                continue;
            };

            for section in &contents.sections {
                rows.push(TreeRow {
                    depth: 2,
                    kind: RowKind::Section { course_id, section_id: section.id },
                    label: section.name.clone(),
                    visible: Some(section.all_modules_visible()),
                    checked: None,
                    expanded: None,
                });
                for module in &section.modules {
                    rows.push(TreeRow {
                        depth: 3,
                        kind: RowKind::Module { course_id, module_id: module.id },
                        label: module.name.clone(),
                        visible: Some(module.visible),
                        checked: None,
                        expanded: None,
                    });
                }
            }

            let exportable = contents
                .glossaries
                .iter()
                .map(|g| ExportItem::new(ExportKind::Glossary, g.id, g.name.clone()))
                .chain(
                    contents.wikis.iter().map(|w| ExportItem::new(ExportKind::Wiki, w.id, w.name.clone())),
                )
                .chain(
                    contents
                        .databases
                        .iter()
                        .map(|d| ExportItem::new(ExportKind::Database, d.id, d.name.clone())),
                );
            for item in exportable {
                rows.push(TreeRow {
                    depth: 2,
                    label: format!("{} ({})", item.name, item.kind.label()),
                    checked: Some(self.is_checked(&item)),
                    kind: RowKind::Export { course_id, item },
                    visible: None,
                    expanded: None,
                });
            }
        }
        rows
    }

    pub fn selected_row(&self) -> Option<TreeRow> {
        self.rows().into_iter().nth(self.selected)
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        let count = self.rows().len();
        if self.selected + 1 < count {
            self.selected += 1;
        }
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.rows().len().saturating_sub(1);
    }

    /// Enter on the selected row.
    pub fn activate(&mut self) {
        match self.selected_row().map(|row| row.kind) {
            Some(RowKind::Site) => self.open_site_dialog(),
            Some(RowKind::Course { course_id }) => self.open_course(course_id),
            Some(RowKind::Export { .. }) => self.toggle_selection(),
            _ => {}
        }
    }

    /// Expand a course, loading its contents on first use.
    pub fn open_course(&mut self, course_id: u64) {
        let Some(index) = self.courses.iter().position(|n| n.course.id == course_id) else {
            return;
        };
        if self.courses[index].contents.is_some() {
            self.courses[index].expanded = !self.courses[index].expanded;
            self.clamp_selection();
            return;
        }
        self.load_course(course_id);
    }

    /// Fetch the course of the selected row again.
    pub fn reload(&mut self) {
        let course_id = match self.selected_row().map(|row| row.kind) {
            Some(
                RowKind::Course { course_id }
                | RowKind::Section { course_id, .. }
                | RowKind::Module { course_id, .. }
                | RowKind::Export { course_id, .. },
            ) => course_id,
            _ => return,
        };
        self.load_course(course_id);
    }

    /// Fetch sections, modules and exportable activities of a course.
    pub fn load_course(&mut self, course_id: u64) {
        if !self.ensure_idle() {
            return;
        }
        if self.session.is_none() {
            self.set_status(Message::NotLoggedIn);
            return;
        }
        self.state = SessionState::Loading;
        self.set_status(Message::LoadingModules);
        let session = self.session.clone();
        if let Err(e) = self.worker.submit(session, Job::LoadCourse { course_id }) {
            self.state = SessionState::LoggedIn;
            self.set_error_status(e);
        }
    }

    fn clamp_selection(&mut self) {
        let count = self.rows().len();
        self.selected = self.selected.min(count.saturating_sub(1));
    }

    fn contents(&self, course_id: u64) -> Option<&CourseContents> {
        self.courses.iter().find(|n| n.course.id == course_id).and_then(|n| n.contents.as_ref())
    }

    // ------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------

    /// Flip the visibility of the selected module or section.
    pub fn toggle_visibility(&mut self) {
        let (module_ids, visible, message) = match self.selected_row().map(|row| row.kind) {
            Some(RowKind::Module { course_id, module_id }) => {
                let Some(module) = self
                    .contents(course_id)
                    .into_iter()
                    .flat_map(|c| &c.sections)
                    .flat_map(|s| &s.modules)
                    .find(|m| m.id == module_id)
                else {
                    return;
                };
                (vec![module_id], !module.visible, Message::ChangingModuleVisibility)
            }
            Some(RowKind::Section { course_id, section_id }) => {
                let Some(section) = self
                    .contents(course_id)
                    .into_iter()
                    .flat_map(|c| &c.sections)
                    .find(|s| s.id == section_id)
                else {
                    return;
                };
                let ids = section.modules.iter().map(|m| m.id).collect::<Vec<_>>();
                if ids.is_empty() {
                    return;
                }
                (ids, !section.all_modules_visible(), Message::ChangingSectionVisibility)
            }
            _ => return,
        };

        if !self.ensure_idle() {
            return;
        }
        self.state = SessionState::Updating;
        self.set_status(message);
        let session = self.session.clone();
        if let Err(e) = self.worker.submit(session, Job::SetVisibility { module_ids, visible }) {
            self.state = SessionState::LoggedIn;
            self.set_error_status(e);
        }
    }

    fn apply_visibility(&mut self, module_ids: &[u64], visible: bool) {
        let modules = self
            .courses
            .iter_mut()
            .filter_map(|n| n.contents.as_mut())
            .flat_map(|c| c.sections.iter_mut())
            .flat_map(|s| s.modules.iter_mut());
        for module in modules {
            if module_ids.contains(&module.id) {
                module.visible = visible;
            }
        }
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    pub fn is_checked(&self, item: &ExportItem) -> bool {
        self.export_selection.iter().any(|s| s.kind == item.kind && s.id == item.id)
    }

    /// Check or uncheck the selected glossary, wiki or database.
    pub fn toggle_selection(&mut self) {
        let Some(RowKind::Export { item, .. }) = self.selected_row().map(|row| row.kind) else {
            return;
        };
        if self.is_checked(&item) {
            self.export_selection.retain(|s| !(s.kind == item.kind && s.id == item.id));
        } else {
            self.export_selection.push(item);
        }
    }

    pub fn toggle_combine(&mut self) {
        self.combine = !self.combine;
    }

    /// Check the selection and ask for the output file.
    pub fn start_export(&mut self) {
        if !self.ensure_idle() {
            return;
        }
        if !self.combine {
            self.show_message(Message::Info, self.tr(Message::SeparateNotImplemented), false);
            return;
        }
        if self.export_selection.is_empty() {
            self.show_message(Message::Info, self.tr(Message::SelectModulesFirst), false);
            return;
        }
        if self.output_input.value.is_empty() {
            self.output_input = TextInput::with_value(self.config.pdf.default_output_filename.clone());
        }
        self.mode = AppMode::OutputDialog;
    }

    /// Start the export into the entered file.
    pub fn submit_output(&mut self) {
        self.mode = AppMode::Normal;
        let name = self.output_input.value.trim();
        if name.is_empty() {
            return;
        }
        let path = with_pdf_extension(name);
        let job = ExportJob::new(
            self.export_selection.clone(),
            ExportMode::from_combine(self.combine),
            path,
        );

        self.state = SessionState::Exporting;
        self.progress = Some((0, job.items.len()));
        self.set_status(Message::BuildingPdf);
        let session = self.session.clone();
        if let Err(e) = self.worker.submit(session, Job::Export(job)) {
            self.state = SessionState::LoggedIn;
            self.progress = None;
            self.set_error_status(e);
        }
    }

    // ------------------------------------------------------------------
    // Worker events
    // ------------------------------------------------------------------

    /// Apply finished work. Called on every tick.
    pub fn poll_worker(&mut self) {
        for event in self.worker.poll_events() {
            self.handle_event(event);
        }
    }

    /// Block until the running operation finishes, applying its events.
    pub fn wait_for_worker(&mut self, timeout: Duration) {
        for event in self.worker.wait(timeout) {
            self.handle_event(event);
        }
    }

    pub fn tick(&mut self) {
        self.poll_worker();
    }

    fn idle_state(&self) -> SessionState {
        if self.session.is_some() {
            SessionState::LoggedIn
        } else {
            SessionState::LoggedOut
        }
    }

    pub fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::LoggedIn { session, courses } => {
                self.session = Some(session);
                self.courses = courses
                    .into_iter()
                    .map(|course| CourseNode { course, expanded: false, contents: None })
                    .collect();
                self.selected = 0;
                self.state = SessionState::LoggedIn;
                self.set_status(Message::LoggedIn);
            }
            WorkerEvent::LoginFailed(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.auth_failed();
            }
            WorkerEvent::CourseLoaded(contents) => {
                if let Some(node) =
                    self.courses.iter_mut().find(|n| n.course.id == contents.course_id)
                {
                    node.contents = Some(contents);
                    node.expanded = true;
                }
                self.clamp_selection();
                self.state = self.idle_state();
                self.set_status(Message::ModulesLoaded);
            }
            WorkerEvent::VisibilityChanged { applied, failed, visible } => {
                self.apply_visibility(&applied, visible);
                self.state = self.idle_state();
                match failed.first() {
                    None => self.set_status(Message::VisibilityChanged),
                    Some((_, e)) => {
                        let total = applied.len() + failed.len();
                        self.set_error_status(format!("{e} ({}/{total})", failed.len()));
                    }
                }
            }
            WorkerEvent::Progress { done, overall } => {
                self.progress = Some((done, overall));
            }
            WorkerEvent::Exported(summary) => {
                tracing::info!(path = %summary.path.display(), "Export finished");
                self.progress = None;
                self.state = self.idle_state();
                self.set_status(Message::FinishedPdf);
                if self.config.pdf.open_after_export {
                    if let Err(e) = open_in_viewer(&summary.path) {
                        tracing::warn!(error = %e, "Could not open PDF viewer");
                    }
                }
            }
            WorkerEvent::ExportFailed(e) => {
                self.progress = None;
                self.state = self.idle_state();
                self.export_failed(&e);
            }
            WorkerEvent::Failed(e) => {
                self.state = self.idle_state();
                self.remote_failed(&e);
            }
        }
    }

    fn export_failed(&mut self, error: &ExportError) {
        match (error.message(), error) {
            (Some(message), _) => {
                self.clear_status();
                self.show_message(Message::Info, self.tr(message), false);
            }
            (None, ExportError::Moodle(e)) => self.remote_failed(e),
            (None, e) => {
                self.clear_status();
                self.show_message(Message::Error, e.to_string(), true);
            }
        }
    }

    fn remote_failed(&mut self, error: &MoodleError) {
        tracing::warn!(error = %error, "Moodle call failed");
        self.set_error_status(error);
    }
}
