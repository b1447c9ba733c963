//! Moodle web service integration.
//!
//! Talks to the REST server of a Moodle site (`webservice/rest/server.php`)
//! with JSON responses and token authentication. Everything the UI and the
//! export pipeline need goes through the [`MoodleApi`] trait, implemented
//! against a live site by [`MoodleClient`].

mod client;
mod error;
mod link;
mod params;
mod types;

pub use client::{remote_error, MoodleClient};
pub use error::{MoodleError, MoodleResult};
pub use link::{parse_course_link, parse_site_url};
pub use params::flatten_params;
pub use types::{
    Course, Database, DatabaseEntry, Glossary, GlossaryEntry, Module, Section, Session, SiteInfo,
    Wiki, WikiPage,
};

use url::Url;

use crate::security::Credentials;

/// Operations offered by a Moodle site.
///
/// All calls block the calling thread; the TUI runs them on the worker.
pub trait MoodleApi: Send + Sync {
    /// Log in and obtain a session. Fails with [`MoodleError::Auth`] when the
    /// site is unreachable or the credentials are rejected.
    fn authenticate(&self, site: &Url, credentials: &Credentials) -> MoodleResult<Session>;

    /// Courses the logged in user is enrolled in.
    fn courses(&self, session: &Session) -> MoodleResult<Vec<Course>>;

    /// Sections and modules of a course, in course order.
    fn course_contents(&self, session: &Session, course_id: u64) -> MoodleResult<Vec<Section>>;

    /// Show or hide a single course module.
    fn set_module_visibility(
        &self,
        session: &Session,
        module_id: u64,
        visible: bool,
    ) -> MoodleResult<()>;

    fn glossaries(&self, session: &Session, course_id: u64) -> MoodleResult<Vec<Glossary>>;

    fn glossary_entries(
        &self,
        session: &Session,
        glossary_id: u64,
    ) -> MoodleResult<Vec<GlossaryEntry>>;

    fn wikis(&self, session: &Session, course_id: u64) -> MoodleResult<Vec<Wiki>>;

    fn wiki_pages(&self, session: &Session, wiki_id: u64) -> MoodleResult<Vec<WikiPage>>;

    fn databases(&self, session: &Session, course_id: u64) -> MoodleResult<Vec<Database>>;

    fn database_entries(
        &self,
        session: &Session,
        database_id: u64,
    ) -> MoodleResult<Vec<DatabaseEntry>>;

    /// Download a file linked from content, e.g. an image in a glossary
    /// entry. Relative links resolve against the site.
    fn download_file(&self, session: &Session, link: &str) -> MoodleResult<Vec<u8>>;
}
