//! Configuration management for moodle2pdf.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Moodle site settings
    pub moodle: MoodleConfig,

    /// PDF layout settings
    pub pdf: PdfConfig,

    /// System settings
    pub system: SystemConfig,

    /// UI/TUI settings
    pub ui: UiConfig,
}

/// Moodle site and web service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodleConfig {
    /// Default site URL offered in the site dialog
    pub url: String,

    /// REST endpoint relative to the site URL
    pub endpoint: String,

    /// Web service used when requesting a token
    pub service: String,

    /// Maximum number of glossary entries fetched per glossary
    pub entry_limit: u32,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

/// PDF document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Document title, also printed in the page footer
    pub title: String,

    /// Document author
    pub author: String,

    /// Left and right page border in cm
    pub border_horizontal: f32,

    /// Top and bottom page border in cm
    pub border_vertical: f32,

    /// File name suggested when saving
    pub default_output_filename: String,

    /// Open the finished PDF in the system viewer
    pub open_after_export: bool,
}

/// System settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Log file written while the TUI is running
    pub log_filename: String,
}

/// UI/TUI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Interface language (auto, en, de)
    pub language: String,

    /// Color theme name (built-in: default, nord, high-contrast)
    pub theme: String,
}

impl Config {
    /// Load configuration.
    ///
    /// Looks for `./.moodle2pdf.toml` first, then the global config file,
    /// and falls back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        // Try local config first
        let local_config = PathBuf::from(".moodle2pdf.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        // Try global config
        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        // Return defaults
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the global config directory.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("moodle2pdf"))
    }
}

impl Default for MoodleConfig {
    fn default() -> Self {
        Self {
            url: "https://moodle.nibis.de/bbs_osb/".to_string(),
            endpoint: "webservice/rest/server.php".to_string(),
            service: "moodle_mobile_app".to_string(),
            entry_limit: 1000,
            timeout_secs: 30,
        }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            title: "Häufig gestellte Fragen - Logodidact und Moodle".to_string(),
            author: "Moodle2PDF".to_string(),
            border_horizontal: 2.0,
            border_vertical: 1.5,
            default_output_filename: "FAQ.pdf".to_string(),
            open_after_export: true,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { log_filename: "moodle2pdf.log".to_string() }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { language: "auto".to_string(), theme: "default".to_string() }
    }
}
