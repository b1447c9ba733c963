//! Export of glossaries, wikis and databases to PDF.
//!
//! The pipeline has three stages:
//!
//! 1. [`fetch_content`] pulls entries, pages or records for each selected
//!    [`ExportItem`] through the [`MoodleApi`].
//! 2. [`build_story`] turns the fetched [`ContentItem`]s into layout blocks.
//! 3. [`PdfWriter`] renders the blocks into one document, with images
//!    downloaded through [`MoodleApi::download_file`].
//!
//! [`ExportJob::run`] drives all three and writes the file.

mod fonts;
mod html;
mod pdf;

pub use fonts::{encode_win_ansi, text_width, Font};
pub use html::{decode_entities, html_to_blocks};
pub use pdf::{Block, ImageBlock, PdfSettings, PdfWriter, PAGE_HEIGHT, PAGE_WIDTH, POINTS_PER_CM};

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Message;
use crate::moodle::{MoodleApi, MoodleError, Session};

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can end an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("You have to select some modules first.")]
    NoSelection,

    #[error("Separate export is not implemented yet.")]
    NotImplemented,

    #[error("Failed to render PDF: {0}")]
    Render(String),

    #[error(transparent)]
    Moodle(#[from] MoodleError),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Catalog message shown to the user, when one exists.
    pub fn message(&self) -> Option<Message> {
        match self {
            Self::NoSelection => Some(Message::SelectModulesFirst),
            Self::NotImplemented => Some(Message::SeparateNotImplemented),
            _ => None,
        }
    }
}

/// Kind of exportable activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExportKind {
    Glossary,
    Wiki,
    Database,
}

impl ExportKind {
    /// Suffix used in the item heading.
    pub fn label(self) -> &'static str {
        match self {
            Self::Glossary => "Glossar",
            Self::Wiki => "Wiki",
            Self::Database => "Datenbank",
        }
    }
}

/// An activity selected for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportItem {
    pub kind: ExportKind,
    /// Activity instance id (not the course module id)
    pub id: u64,
    pub name: String,
}

impl ExportItem {
    pub fn new(kind: ExportKind, id: u64, name: impl Into<String>) -> Self {
        Self { kind, id, name: name.into() }
    }
}

/// One entry, page or record with an HTML body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSection {
    pub heading: String,
    pub body: String,
}

/// Fetched content of one export item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub kind: ExportKind,
    pub title: String,
    pub sections: Vec<ContentSection>,
}

impl ContentItem {
    /// Level 1 heading, e.g. `FAQ (Glossar)`.
    pub fn heading(&self) -> String {
        format!("{} ({})", self.title, self.kind.label())
    }
}

/// Whether selected items go into one file or one file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    #[default]
    Combined,
    Separate,
}

impl ExportMode {
    pub fn from_combine(combine: bool) -> Self {
        if combine {
            Self::Combined
        } else {
            Self::Separate
        }
    }
}

/// Sort selected items into fetch order: glossaries, then wikis, then
/// databases. Selection order is kept within each kind.
pub fn order_items(items: &[ExportItem]) -> Vec<ExportItem> {
    let mut ordered = items.to_vec();
    ordered.sort_by_key(|item| item.kind);
    ordered
}

/// Fetch everything needed to render one item.
pub fn fetch_content(
    api: &dyn MoodleApi,
    session: &Session,
    item: &ExportItem,
) -> ExportResult<ContentItem> {
    tracing::debug!(kind = ?item.kind, id = item.id, "Fetching export content");

    let sections = match item.kind {
        ExportKind::Glossary => api
            .glossary_entries(session, item.id)?
            .into_iter()
            .map(|entry| ContentSection { heading: entry.concept, body: entry.definition })
            .collect(),
        ExportKind::Wiki => api
            .wiki_pages(session, item.id)?
            .into_iter()
            .map(|page| ContentSection { heading: page.title, body: page.content })
            .collect(),
        ExportKind::Database => api
            .database_entries(session, item.id)?
            .into_iter()
            .map(|entry| {
                let body = entry
                    .fields
                    .iter()
                    .map(|(name, value)| format!("<h4>{}</h4><div>{}</div>", html::escape(name), value))
                    .collect::<String>();
                ContentSection { heading: format!("Eintrag: {}", entry.id), body }
            })
            .collect(),
    };

    Ok(ContentItem { kind: item.kind, title: item.name.clone(), sections })
}

/// Lay out fetched items as one flow of blocks.
pub fn build_story(items: &[ContentItem]) -> Vec<Block> {
    let mut story = Vec::new();
    for item in items {
        story.push(Block::Heading1(item.heading()));

        let count = item.sections.len();
        for (index, section) in item.sections.iter().enumerate() {
            story.push(Block::Heading2(section.heading.clone()));
            story.extend(html_to_blocks(&section.body));
            if item.kind == ExportKind::Glossary && index + 1 < count {
                story.push(Block::Divider);
            }
        }
        story.push(Block::PageBreak);
    }
    story
}

/// Render all items into a single PDF document.
///
/// `load_image` receives the source of every image and returns its bytes,
/// or `None` to draw a placeholder instead.
pub fn export_combined(
    items: &[ContentItem],
    settings: &PdfSettings,
    mut load_image: impl FnMut(&str) -> Option<Vec<u8>>,
) -> ExportResult<Vec<u8>> {
    let mut story = build_story(items);
    for block in &mut story {
        if let Block::Image(image) = block {
            image.data = load_image(&image.src);
        }
    }
    PdfWriter::new(settings.clone()).render(&story)
}

/// Write one file per item. Not implemented.
pub fn export_separate(_items: &[ContentItem]) -> ExportResult<()> {
    Err(ExportError::NotImplemented)
}

/// Outcome of a finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub items: usize,
    pub bytes: usize,
}

/// A complete export request.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub items: Vec<ExportItem>,
    pub mode: ExportMode,
    pub output: PathBuf,
}

impl ExportJob {
    pub fn new(items: Vec<ExportItem>, mode: ExportMode, output: impl Into<PathBuf>) -> Self {
        Self { items, mode, output: output.into() }
    }

    /// Fetch, render and write. `progress` receives `(done, overall)` after
    /// each fetched item.
    ///
    /// Separate mode fails before anything else is checked; an empty
    /// selection fails before anything is fetched.
    pub fn run(
        &self,
        api: &dyn MoodleApi,
        session: &Session,
        settings: &PdfSettings,
        mut progress: impl FnMut(usize, usize),
    ) -> ExportResult<ExportSummary> {
        if self.mode == ExportMode::Separate {
            return export_separate(&[]).map(|()| unreachable!("export_separate never succeeds"));
        }
        if self.items.is_empty() {
            return Err(ExportError::NoSelection);
        }

        let ordered = order_items(&self.items);
        let overall = ordered.len();
        progress(0, overall);

        let mut content = Vec::with_capacity(overall);
        for (index, item) in ordered.iter().enumerate() {
            content.push(fetch_content(api, session, item)?);
            progress(index + 1, overall);
        }

        let bytes = export_combined(&content, settings, |src| {
            match api.download_file(session, src) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(src, error = %e, "Image download failed");
                    None
                }
            }
        })?;
        write_file(&self.output, &bytes)?;
        tracing::info!(path = %self.output.display(), items = overall, "Exported PDF");

        Ok(ExportSummary { path: self.output.clone(), items: overall, bytes: bytes.len() })
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> ExportResult<()> {
    std::fs::write(path, bytes)
        .map_err(|source| ExportError::Write { path: path.to_path_buf(), source })
}

/// Open a finished file with the desktop's default viewer.
pub fn open_in_viewer(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/c", "start", ""]);
        command
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = Command::new("xdg-open");

    command.arg(path).spawn().map(|_| ())
}

/// Append `.pdf` unless the path already has that extension.
pub fn with_pdf_extension(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    let is_pdf =
        path.extension().is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"));
    if is_pdf {
        path
    } else {
        let mut name = path.into_os_string();
        name.push(".pdf");
        PathBuf::from(name)
    }
}
