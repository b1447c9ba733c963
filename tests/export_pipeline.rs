//! Export pipeline tests against an in-memory Moodle site.

mod common;

use common::{session, FakeMoodle, MISSING_IMAGE, SCREENSHOT};
use moodle2pdf::export::{
    fetch_content, ExportError, ExportItem, ExportJob, ExportKind, ExportMode, PdfSettings,
};
use moodle2pdf::moodle::MoodleError;

fn all_items() -> Vec<ExportItem> {
    // Deliberately out of fetch order
    vec![
        ExportItem::new(ExportKind::Database, 9, "Links"),
        ExportItem::new(ExportKind::Wiki, 8, "Handbuch"),
        ExportItem::new(ExportKind::Glossary, 7, "FAQ"),
    ]
}

/// Decoded content stream of every page, in page order.
fn page_contents(path: &std::path::Path) -> Vec<String> {
    let document = lopdf::Document::load(path).unwrap();
    document
        .get_pages()
        .values()
        .map(|id| String::from_utf8_lossy(&document.get_page_content(*id).unwrap()).into_owned())
        .collect()
}

fn content_calls(api: &FakeMoodle) -> Vec<String> {
    api.calls()
        .into_iter()
        .filter(|c| c.contains("_entries:") || c.contains("_pages:"))
        .collect()
}

// ============================================================================
// Ordering and progress
// ============================================================================

#[test]
fn test_items_are_fetched_glossary_wiki_database() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();
    let job = ExportJob::new(all_items(), ExportMode::Combined, dir.path().join("out.pdf"));

    job.run(&api, &session(), &PdfSettings::default(), |_, _| {}).unwrap();

    assert_eq!(
        content_calls(&api),
        vec!["glossary_entries:7", "wiki_pages:8", "database_entries:9"]
    );
}

#[test]
fn test_progress_counts_up_to_overall() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();
    let job = ExportJob::new(all_items(), ExportMode::Combined, dir.path().join("out.pdf"));

    let mut reports = Vec::new();
    job.run(&api, &session(), &PdfSettings::default(), |done, overall| {
        reports.push((done, overall));
    })
    .unwrap();

    assert_eq!(reports, vec![(0, 3), (1, 3), (2, 3), (3, 3)]);
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn test_combined_export_writes_one_page_per_item() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("faq.pdf");
    let job = ExportJob::new(all_items(), ExportMode::Combined, &output);

    let summary = job.run(&api, &session(), &PdfSettings::default(), |_, _| {}).unwrap();

    assert_eq!(summary.path, output);
    assert_eq!(summary.items, 3);

    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(bytes.len(), summary.bytes);
    assert!(bytes.starts_with(b"%PDF-"));

    let document = lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(document.get_pages().len(), 3);
}

#[test]
fn test_items_appear_in_fetch_order() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("faq.pdf");

    ExportJob::new(all_items(), ExportMode::Combined, &output)
        .run(&api, &session(), &PdfSettings::default(), |_, _| {})
        .unwrap();

    let pages = page_contents(&output);
    assert_eq!(pages.len(), 3);
    let expected = [("FAQ", "Glossar"), ("Handbuch", "Wiki"), ("Links", "Datenbank")];
    for (page, (name, label)) in pages.iter().zip(expected) {
        assert!(page.contains(name) && page.contains(label), "{name} missing: {page}");
    }
    assert!(pages[0].contains("Passwort vergessen"));
    assert!(pages[1].contains("Willkommen"));
    assert!(pages[2].contains("Eintrag: 31"));
}

#[test]
fn test_images_are_downloaded_and_embedded() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("faq.pdf");
    let items = vec![ExportItem::new(ExportKind::Glossary, 7, "FAQ")];

    ExportJob::new(items, ExportMode::Combined, &output)
        .run(&api, &session(), &PdfSettings::default(), |_, _| {})
        .unwrap();

    let downloads: Vec<_> =
        api.calls().into_iter().filter(|c| c.starts_with("download_file:")).collect();
    assert_eq!(
        downloads,
        vec![format!("download_file:{SCREENSHOT}"), format!("download_file:{MISSING_IMAGE}")]
    );

    let document = lopdf::Document::load(&output).unwrap();
    let images = document
        .objects
        .values()
        .filter_map(|o| o.as_stream().ok())
        .filter(|s| {
            s.dict.get(b"Subtype").and_then(lopdf::Object::as_name).ok() == Some(b"Image".as_slice())
        })
        .count();
    assert_eq!(images, 1);

    let page = &page_contents(&output)[0];
    assert!(page.contains("/Im1 Do"));
    assert!(page.contains("[Bild: fehlt.png]"));
}

#[test]
fn test_single_glossary_fits_on_one_page() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("glossary.pdf");
    let items = vec![ExportItem::new(ExportKind::Glossary, 7, "FAQ")];

    ExportJob::new(items, ExportMode::Combined, &output)
        .run(&api, &session(), &PdfSettings::default(), |_, _| {})
        .unwrap();

    let document = lopdf::Document::load(&output).unwrap();
    assert_eq!(document.get_pages().len(), 1);
}

#[test]
fn test_database_records_are_headed_by_id() {
    let api = FakeMoodle::new();
    let item = ExportItem::new(ExportKind::Database, 9, "Links");

    let content = fetch_content(&api, &session(), &item).unwrap();

    assert_eq!(content.heading(), "Links (Datenbank)");
    assert_eq!(content.sections.len(), 1);
    assert_eq!(content.sections[0].heading, "Eintrag: 31");
    assert!(content.sections[0].body.contains("<h4>Titel</h4><div>Moodle Docs</div>"));
}

// ============================================================================
// Refusals and failures
// ============================================================================

#[test]
fn test_empty_selection_fetches_nothing() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let job = ExportJob::new(Vec::new(), ExportMode::Combined, &output);

    let err = job.run(&api, &session(), &PdfSettings::default(), |_, _| {}).unwrap_err();

    assert!(matches!(err, ExportError::NoSelection));
    assert!(api.calls().is_empty());
    assert!(!output.exists());
}

#[test]
fn test_separate_mode_is_not_implemented() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();

    for items in [all_items(), Vec::new()] {
        let job = ExportJob::new(items, ExportMode::Separate, dir.path().join("out.pdf"));
        let err = job.run(&api, &session(), &PdfSettings::default(), |_, _| {}).unwrap_err();
        assert!(matches!(err, ExportError::NotImplemented));
    }
    assert!(api.calls().is_empty());
}

#[test]
fn test_remote_error_aborts_without_writing() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let items = vec![
        ExportItem::new(ExportKind::Glossary, 7, "FAQ"),
        ExportItem::new(ExportKind::Glossary, 99, "Missing"),
    ];

    let mut reports = Vec::new();
    let err = ExportJob::new(items, ExportMode::Combined, &output)
        .run(&api, &session(), &PdfSettings::default(), |done, overall| {
            reports.push((done, overall));
        })
        .unwrap_err();

    match err {
        ExportError::Moodle(MoodleError::Remote { errorcode, .. }) => {
            assert_eq!(errorcode, "invalidrecord");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(reports, vec![(0, 2), (1, 2)]);
    assert!(!output.exists());
}

#[test]
fn test_unwritable_output_reports_path() {
    let api = FakeMoodle::new();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("missing").join("out.pdf");
    let items = vec![ExportItem::new(ExportKind::Wiki, 8, "Handbuch")];

    let err = ExportJob::new(items, ExportMode::Combined, &output)
        .run(&api, &session(), &PdfSettings::default(), |_, _| {})
        .unwrap_err();

    assert!(matches!(err, ExportError::Write { ref path, .. } if path == &output));
}
