//! Blocking HTTP client for the Moodle REST web service.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::{
    flatten_params, Course, Database, DatabaseEntry, Glossary, GlossaryEntry, MoodleApi,
    MoodleError, MoodleResult, Section, Session, SiteInfo, Wiki, WikiPage,
};
use crate::core::MoodleConfig;
use crate::security::{Credentials, SecretValue};

/// Moodle API client.
#[derive(Debug, Clone)]
pub struct MoodleClient {
    /// HTTP client
    http: reqwest::blocking::Client,
    /// REST endpoint relative to the site URL
    endpoint: String,
    /// Web service the token is requested for
    service: String,
    /// Maximum number of glossary entries fetched per glossary
    entry_limit: u32,
}

impl MoodleClient {
    /// Create a client from the `[moodle]` config section.
    pub fn new(config: &MoodleConfig) -> MoodleResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("moodle2pdf/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            service: config.service.clone(),
            entry_limit: config.entry_limit,
        })
    }

    /// Call a web service function and decode its answer.
    fn call<T: DeserializeOwned>(
        &self,
        session: &Session,
        function: &str,
        args: Value,
    ) -> MoodleResult<T> {
        let form = request_form(function, &args, session.token.expose());
        let url = session.site.join(&self.endpoint).map_err(|e| MoodleError::InvalidUrl {
            url: session.site.to_string(),
            reason: e.to_string(),
        })?;

        debug!("Calling Moodle function {}", function);
        let response = self.http.post(url).form(&form).send()?.error_for_status()?;
        let value: Value = response.json()?;

        if let Some(err) = remote_error(&value) {
            warn!("Moodle function {} failed: {}", function, err);
            return Err(err);
        }

        Ok(serde_json::from_value(value)?)
    }

    fn request_token(&self, site: &Url, credentials: &Credentials) -> MoodleResult<SecretValue> {
        let url = site.join("login/token.php").map_err(|e| MoodleError::InvalidUrl {
            url: site.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .http
            .post(url)
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.expose()),
                ("service", self.service.as_str()),
            ])
            .send()
            .map_err(|e| MoodleError::Auth(format!("Could not connect to Moodle site: {e}")))?;

        let value: Value = response
            .json()
            .map_err(|e| MoodleError::Auth(format!("No valid answer from login page: {e}")))?;

        token_from_response(&value)
    }

    fn database_fields(&self, session: &Session, database_id: u64) -> MoodleResult<HashMap<u64, String>> {
        #[derive(Deserialize)]
        struct Field {
            id: u64,
            name: String,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            fields: Vec<Field>,
        }

        let response: Response =
            self.call(session, "mod_data_get_fields", json!({ "databaseid": database_id }))?;
        Ok(response.fields.into_iter().map(|f| (f.id, f.name)).collect())
    }
}

impl MoodleApi for MoodleClient {
    fn authenticate(&self, site: &Url, credentials: &Credentials) -> MoodleResult<Session> {
        info!("Logging in to {} as {}", site, credentials.username);
        let token = self.request_token(site, credentials)?;

        let mut session = Session::new(site.clone(), token);
        let site_info: SiteInfo = self
            .call(&session, "core_webservice_get_site_info", json!({}))
            .map_err(|e| MoodleError::Auth(e.to_string()))?;

        session.user_id = site_info.userid;
        session.site_name = site_info.sitename;
        session.username = if site_info.username.is_empty() {
            credentials.username.clone()
        } else {
            site_info.username
        };

        info!("Logged in to '{}' as user {}", session.site_name, session.user_id);
        Ok(session)
    }

    fn courses(&self, session: &Session) -> MoodleResult<Vec<Course>> {
        self.call(session, "core_enrol_get_users_courses", json!({ "userid": session.user_id }))
    }

    fn course_contents(&self, session: &Session, course_id: u64) -> MoodleResult<Vec<Section>> {
        self.call(session, "core_course_get_contents", json!({ "courseid": course_id }))
    }

    fn set_module_visibility(
        &self,
        session: &Session,
        module_id: u64,
        visible: bool,
    ) -> MoodleResult<()> {
        let action = if visible { "show" } else { "hide" };
        info!("Changing visibility of module {} ({})", module_id, action);

        // Answers with the rendered module HTML, which is not needed here.
        let _: Value = self.call(
            session,
            "core_course_edit_module",
            json!({ "action": action, "id": module_id }),
        )?;
        Ok(())
    }

    fn glossaries(&self, session: &Session, course_id: u64) -> MoodleResult<Vec<Glossary>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            glossaries: Vec<Glossary>,
        }

        let response: Response = self.call(
            session,
            "mod_glossary_get_glossaries_by_courses",
            json!({ "courseids": [course_id] }),
        )?;
        Ok(response.glossaries)
    }

    fn glossary_entries(
        &self,
        session: &Session,
        glossary_id: u64,
    ) -> MoodleResult<Vec<GlossaryEntry>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            count: u64,
            #[serde(default)]
            entries: Vec<GlossaryEntry>,
        }

        let response: Response = self.call(
            session,
            "mod_glossary_get_entries_by_letter",
            json!({ "id": glossary_id, "letter": "ALL", "limit": self.entry_limit }),
        )?;

        info!("Found {} entries in glossary {}.", response.count, glossary_id);
        if response.count > response.entries.len() as u64 {
            warn!(
                "Glossary {} has {} entries but only {} were fetched",
                glossary_id,
                response.count,
                response.entries.len()
            );
        }
        Ok(response.entries)
    }

    fn wikis(&self, session: &Session, course_id: u64) -> MoodleResult<Vec<Wiki>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            wikis: Vec<Wiki>,
        }

        let response: Response = self.call(
            session,
            "mod_wiki_get_wikis_by_courses",
            json!({ "courseids": [course_id] }),
        )?;
        Ok(response.wikis)
    }

    fn wiki_pages(&self, session: &Session, wiki_id: u64) -> MoodleResult<Vec<WikiPage>> {
        #[derive(Deserialize)]
        struct Subwiki {
            #[serde(default)]
            groupid: i64,
            #[serde(default)]
            userid: i64,
        }

        #[derive(Deserialize)]
        struct SubwikisResponse {
            #[serde(default)]
            subwikis: Vec<Subwiki>,
        }

        #[derive(Deserialize)]
        struct PagesResponse {
            #[serde(default)]
            pages: Vec<WikiPage>,
        }

        let subwikis: SubwikisResponse =
            self.call(session, "mod_wiki_get_subwikis", json!({ "wikiid": wiki_id }))?;
        debug!("Wiki {} has {} subwikis", wiki_id, subwikis.subwikis.len());

        let mut pages = Vec::new();
        for subwiki in &subwikis.subwikis {
            let response: PagesResponse = self.call(
                session,
                "mod_wiki_get_subwiki_pages",
                json!({
                    "wikiid": wiki_id,
                    "groupid": subwiki.groupid,
                    "userid": subwiki.userid,
                    "options": { "includecontent": 1 }
                }),
            )?;
            pages.extend(response.pages);
        }
        Ok(pages)
    }

    fn databases(&self, session: &Session, course_id: u64) -> MoodleResult<Vec<Database>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            databases: Vec<Database>,
        }

        let response: Response = self.call(
            session,
            "mod_data_get_databases_by_courses",
            json!({ "courseids": [course_id] }),
        )?;
        Ok(response.databases)
    }

    fn database_entries(
        &self,
        session: &Session,
        database_id: u64,
    ) -> MoodleResult<Vec<DatabaseEntry>> {
        #[derive(Deserialize)]
        struct File {
            filename: String,
            #[serde(default)]
            fileurl: String,
            #[serde(default)]
            mimetype: String,
        }

        #[derive(Deserialize)]
        struct Content {
            fieldid: u64,
            #[serde(default)]
            content: Option<String>,
            #[serde(default)]
            files: Vec<File>,
        }

        #[derive(Deserialize)]
        struct Entry {
            id: u64,
            #[serde(default)]
            contents: Vec<Content>,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            entries: Vec<Entry>,
        }

        let field_names = self.database_fields(session, database_id)?;
        let response: Response = self.call(
            session,
            "mod_data_get_entries",
            json!({ "databaseid": database_id, "returncontents": 1 }),
        )?;

        let entries = response
            .entries
            .into_iter()
            .map(|entry| {
                let fields = entry
                    .contents
                    .into_iter()
                    .map(|c| {
                        let name = field_names
                            .get(&c.fieldid)
                            .cloned()
                            .unwrap_or_else(|| format!("Feld {}", c.fieldid));
                        let value = match c.files.first() {
                            Some(file) if is_image(&file.mimetype, &file.filename) => format!(
                                "<img src=\"{}\" alt=\"{}\">",
                                attribute(&file.fileurl),
                                attribute(&file.filename)
                            ),
                            Some(file) => format!("[Datei: {}]", file.filename),
                            None => c.content.unwrap_or_default(),
                        };
                        (name, value)
                    })
                    .collect();
                DatabaseEntry { id: entry.id, fields }
            })
            .collect();

        Ok(entries)
    }

    fn download_file(&self, session: &Session, link: &str) -> MoodleResult<Vec<u8>> {
        let url = session.site.join(link.trim()).map_err(|e| MoodleError::InvalidUrl {
            url: link.to_string(),
            reason: e.to_string(),
        })?;

        info!("Loading file from {}", url);
        let mut request = self.http.post(url.clone());
        if sends_token(&session.site, &url) {
            request = request.form(&[("token", session.token.expose())]);
        }
        let bytes = request.send()?.error_for_status()?.bytes()?;
        debug!("Loaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

/// Form fields of a web service call.
fn request_form(function: &str, args: &Value, token: &str) -> Vec<(String, String)> {
    let mut form = flatten_params(args);
    form.push(("wstoken".to_string(), token.to_string()));
    form.push(("moodlewsrestformat".to_string(), "json".to_string()));
    form.push(("wsfunction".to_string(), function.to_string()));
    form
}

/// Extract the token from the answer of `login/token.php`.
///
/// Wrong credentials are answered with `{"error": ..., "errorcode": ...}`.
fn token_from_response(value: &Value) -> MoodleResult<SecretValue> {
    match value.get("token").and_then(Value::as_str).filter(|t| !t.is_empty()) {
        Some(token) => Ok(SecretValue::new(token)),
        None => {
            let reason = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("no token in response")
                .to_string();
            Err(MoodleError::Auth(reason))
        }
    }
}

/// The token only goes to the site it belongs to.
fn sends_token(site: &Url, target: &Url) -> bool {
    site.scheme() == target.scheme()
        && site.host_str() == target.host_str()
        && site.port_or_known_default() == target.port_or_known_default()
}

fn is_image(mimetype: &str, filename: &str) -> bool {
    if mimetype.starts_with("image/") {
        return true;
    }
    let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    matches!(extension.as_deref(), Some("png" | "jpg" | "jpeg" | "gif"))
}

fn attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Turn an exception payload of the web service into an error.
///
/// Moodle answers failed calls with HTTP 200 and a JSON object containing
/// `exception`, `errorcode` and `message`.
pub fn remote_error(value: &Value) -> Option<MoodleError> {
    let object = value.as_object()?;
    if !object.contains_key("exception") {
        return None;
    }

    let field = |key: &str| object.get(key).and_then(Value::as_str).unwrap_or("").to_string();
    let errorcode = field("errorcode");
    let message = field("message");

    Some(MoodleError::Remote {
        errorcode: if errorcode.is_empty() { "unknown".to_string() } else { errorcode },
        message: if message.is_empty() { field("exception") } else { message },
    })
}
