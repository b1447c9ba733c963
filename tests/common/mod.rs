//! In-memory Moodle site shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use moodle2pdf::moodle::{
    Course, Database, DatabaseEntry, Glossary, GlossaryEntry, Module, MoodleApi, MoodleError,
    MoodleResult, Section, Session, Wiki, WikiPage,
};
use moodle2pdf::security::{Credentials, SecretValue};
use url::Url;

pub const USERNAME: &str = "teacher";
pub const PASSWORD: &str = "hunter2";
pub const COURSE_ID: u64 = 42;
pub const SCREENSHOT: &str = "https://moodle.example.org/school/webservice/pluginfile.php/5/drucken.png";
pub const MISSING_IMAGE: &str = "https://moodle.example.org/school/webservice/pluginfile.php/5/fehlt.png";

/// A fake site with one course holding two sections, a glossary, a wiki and
/// a database. Every call is recorded.
#[derive(Debug, Default)]
pub struct FakeMoodle {
    pub sections: Mutex<HashMap<u64, Vec<Section>>>,
    pub glossaries: Vec<Glossary>,
    pub glossary_entries: HashMap<u64, Vec<GlossaryEntry>>,
    pub wikis: Vec<Wiki>,
    pub wiki_pages: HashMap<u64, Vec<WikiPage>>,
    pub databases: Vec<Database>,
    pub database_entries: HashMap<u64, Vec<DatabaseEntry>>,
    /// Downloadable files by link
    pub files: HashMap<String, Vec<u8>>,
    /// Modules whose visibility cannot be changed
    pub locked_modules: HashSet<u64>,
    pub calls: Mutex<Vec<String>>,
}

fn module(id: u64, name: &str, modname: &str, visible: bool) -> Module {
    Module { id, name: name.into(), modname: modname.into(), visible, url: None }
}

impl FakeMoodle {
    pub fn new() -> Self {
        let sections = vec![
            Section {
                id: 1,
                name: "Allgemeines".into(),
                visible: true,
                modules: vec![
                    module(101, "FAQ", "glossary", true),
                    module(102, "Ankündigungen", "forum", true),
                ],
            },
            Section {
                id: 2,
                name: "Material".into(),
                visible: true,
                modules: vec![
                    module(201, "Handbuch", "wiki", false),
                    module(202, "Links", "data", true),
                ],
            },
        ];

        let entry = |concept: &str, definition: &str| GlossaryEntry {
            concept: concept.into(),
            definition: definition.into(),
        };

        Self {
            sections: Mutex::new(HashMap::from([(COURSE_ID, sections)])),
            glossaries: vec![Glossary { id: 7, name: "FAQ".into(), coursemodule: 101 }],
            glossary_entries: HashMap::from([(
                7,
                vec![
                    entry("Passwort vergessen", "<p>Wende dich an den <b>Admin</b>.</p>"),
                    entry(
                        "Drucken",
                        &format!(
                            r#"<ul><li>Datei öffnen</li><li>Drucken wählen</li></ul><p><img src="{SCREENSHOT}" width="64" height="32"></p><p><img src="{MISSING_IMAGE}"></p>"#
                        ),
                    ),
                ],
            )]),
            wikis: vec![Wiki { id: 8, name: "Handbuch".into(), coursemodule: 201 }],
            wiki_pages: HashMap::from([(
                8,
                vec![WikiPage { id: 1, title: "Start".into(), content: "<p>Willkommen</p>".into() }],
            )]),
            databases: vec![Database { id: 9, name: "Links".into(), coursemodule: 202 }],
            database_entries: HashMap::from([(
                9,
                vec![DatabaseEntry {
                    id: 31,
                    fields: vec![
                        ("Titel".into(), "Moodle Docs".into()),
                        ("URL".into(), "https://docs.moodle.org".into()),
                    ],
                }],
            )]),
            files: HashMap::from([(SCREENSHOT.to_string(), png(64, 32))]),
            locked_modules: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_locked_module(mut self, id: u64) -> Self {
        self.locked_modules.insert(id);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn module_visible(&self, id: u64) -> Option<bool> {
        self.sections
            .lock()
            .unwrap()
            .values()
            .flatten()
            .flat_map(|s| &s.modules)
            .find(|m| m.id == id)
            .map(|m| m.visible)
    }
}

/// A small opaque PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([30, 90, 160, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

pub fn session() -> Session {
    let mut session = Session::new(
        Url::parse("https://moodle.example.org/school/").unwrap(),
        SecretValue::new("token"),
    );
    session.user_id = 2;
    session.site_name = "Schule".into();
    session.username = USERNAME.into();
    session
}

impl MoodleApi for FakeMoodle {
    fn authenticate(&self, site: &Url, credentials: &Credentials) -> MoodleResult<Session> {
        self.record("authenticate");
        if credentials.username != USERNAME || credentials.password.expose() != PASSWORD {
            return Err(MoodleError::Auth("Invalid login, please try again".into()));
        }
        let mut session = session();
        session.site = site.clone();
        Ok(session)
    }

    fn courses(&self, _session: &Session) -> MoodleResult<Vec<Course>> {
        self.record("courses");
        Ok(vec![Course { id: COURSE_ID, fullname: "FAQ-Kurs".into(), shortname: "faq".into() }])
    }

    fn course_contents(&self, _session: &Session, course_id: u64) -> MoodleResult<Vec<Section>> {
        self.record(format!("course_contents:{course_id}"));
        Ok(self.sections.lock().unwrap().get(&course_id).cloned().unwrap_or_default())
    }

    fn set_module_visibility(
        &self,
        _session: &Session,
        module_id: u64,
        visible: bool,
    ) -> MoodleResult<()> {
        self.record(format!("set_module_visibility:{module_id}:{visible}"));
        if self.locked_modules.contains(&module_id) {
            return Err(MoodleError::remote("nopermissions", "Sorry, but you do not have permissions"));
        }
        let mut sections = self.sections.lock().unwrap();
        for module in sections.values_mut().flatten().flat_map(|s| s.modules.iter_mut()) {
            if module.id == module_id {
                module.visible = visible;
            }
        }
        Ok(())
    }

    fn glossaries(&self, _session: &Session, course_id: u64) -> MoodleResult<Vec<Glossary>> {
        self.record(format!("glossaries:{course_id}"));
        Ok(self.glossaries.clone())
    }

    fn glossary_entries(
        &self,
        _session: &Session,
        glossary_id: u64,
    ) -> MoodleResult<Vec<GlossaryEntry>> {
        self.record(format!("glossary_entries:{glossary_id}"));
        self.glossary_entries
            .get(&glossary_id)
            .cloned()
            .ok_or_else(|| MoodleError::remote("invalidrecord", "Can't find data record in database."))
    }

    fn wikis(&self, _session: &Session, course_id: u64) -> MoodleResult<Vec<Wiki>> {
        self.record(format!("wikis:{course_id}"));
        Ok(self.wikis.clone())
    }

    fn wiki_pages(&self, _session: &Session, wiki_id: u64) -> MoodleResult<Vec<WikiPage>> {
        self.record(format!("wiki_pages:{wiki_id}"));
        Ok(self.wiki_pages.get(&wiki_id).cloned().unwrap_or_default())
    }

    fn databases(&self, _session: &Session, course_id: u64) -> MoodleResult<Vec<Database>> {
        self.record(format!("databases:{course_id}"));
        Ok(self.databases.clone())
    }

    fn database_entries(
        &self,
        _session: &Session,
        database_id: u64,
    ) -> MoodleResult<Vec<DatabaseEntry>> {
        self.record(format!("database_entries:{database_id}"));
        Ok(self.database_entries.get(&database_id).cloned().unwrap_or_default())
    }

    fn download_file(&self, _session: &Session, link: &str) -> MoodleResult<Vec<u8>> {
        self.record(format!("download_file:{link}"));
        self.files
            .get(link)
            .cloned()
            .ok_or_else(|| MoodleError::remote("filenotfound", "File not found"))
    }
}
