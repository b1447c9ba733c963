//! Data types returned by the Moodle web service.

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::security::SecretValue;

/// An authenticated connection to one Moodle site.
///
/// Lives for one login; a failed login never produces a session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Site URL (always ends with `/`)
    pub site: Url,
    /// Web service token
    pub token: SecretValue,
    /// Id of the logged in user
    pub user_id: u64,
    /// Site name as reported by `core_webservice_get_site_info`
    pub site_name: String,
    /// Username used for the login
    pub username: String,
}

impl Session {
    pub fn new(site: Url, token: SecretValue) -> Self {
        Self { site, token, user_id: 0, site_name: String::new(), username: String::new() }
    }
}

/// Answer of `core_webservice_get_site_info`.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteInfo {
    pub userid: u64,
    #[serde(default)]
    pub sitename: String,
    #[serde(default)]
    pub username: String,
}

/// A course the user is enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    pub fullname: String,
    #[serde(default)]
    pub shortname: String,
}

/// A course section with its modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_visible", deserialize_with = "flag")]
    pub visible: bool,
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl Section {
    /// A section counts as visible when it has no hidden module.
    pub fn all_modules_visible(&self) -> bool {
        self.modules.iter().all(|m| m.visible)
    }
}

/// An activity or resource inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Course module id
    pub id: u64,
    pub name: String,
    /// Module type (`glossary`, `wiki`, `forum`, ...)
    pub modname: String,
    #[serde(default = "default_visible", deserialize_with = "flag")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A glossary activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glossary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub coursemodule: u64,
}

/// One glossary entry; the definition is HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub concept: String,
    #[serde(default)]
    pub definition: String,
}

/// A wiki activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wiki {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub coursemodule: u64,
}

/// One wiki page; the content is HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub id: u64,
    pub title: String,
    #[serde(default, alias = "cachedcontent")]
    pub content: String,
}

/// A database activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub coursemodule: u64,
}

/// A database record with its field values in field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub id: u64,
    pub fields: Vec<(String, String)>,
}

fn default_visible() -> bool {
    true
}

/// Moodle reports flags as `0`/`1`, sometimes as booleans.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(1) != 0,
        serde_json::Value::String(s) => s != "0",
        _ => true,
    })
}
