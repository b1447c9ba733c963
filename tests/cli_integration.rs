//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end. Nothing here talks to a
//! Moodle site: every case fails or finishes before a connection is made.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test, isolated from the user's config.
fn moodle2pdf(home: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("moodle2pdf").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env("LANG", "C")
        .env_remove("MOODLE2PDF_SITE")
        .env_remove("MOODLE2PDF_USER")
        .env_remove("MOODLE2PDF_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export glossaries, wikis and databases to PDF"));
}

#[test]
fn test_version_flag() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_export_help_lists_filters() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .args(["export", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--link"))
        .stdout(predicate::str::contains("--no-glossary"))
        .stdout(predicate::str::contains("--apart"))
        .stdout(predicate::str::contains("--open"));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_prints_defaults() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[moodle]"))
        .stdout(predicate::str::contains("[pdf]"))
        .stdout(predicate::str::contains("webservice/rest/server.php"))
        .stdout(predicate::str::contains("open_after_export = true"));
}

#[test]
fn test_local_config_is_used() {
    let home = assert_fs::TempDir::new().unwrap();
    home.child(".moodle2pdf.toml")
        .write_str("[pdf]\ntitle = \"Mein Glossar\"\n")
        .unwrap();

    moodle2pdf(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mein Glossar"));
}

#[test]
fn test_explicit_config_file() {
    let home = assert_fs::TempDir::new().unwrap();
    let file = home.child("custom.toml");
    file.write_str("[moodle]\nurl = \"https://lms.example.org/\"\n").unwrap();

    moodle2pdf(&home)
        .arg("--config")
        .arg(file.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://lms.example.org/"));
}

#[test]
fn test_broken_config_fails() {
    let home = assert_fs::TempDir::new().unwrap();
    home.child(".moodle2pdf.toml").write_str("[pdf\n").unwrap();

    moodle2pdf(&home).arg("config").assert().failure();
}

#[test]
fn test_config_path() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("moodle2pdf"));
}

// ============================================================================
// Export Argument Tests
// ============================================================================

#[test]
fn test_export_requires_link_or_id() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home).arg("export").assert().failure();
}

#[test]
fn test_export_apart_is_not_implemented() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .args(["export", "--id", "5", "--apart"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not implemented"));
}

#[test]
fn test_export_rejects_invalid_link() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .args(["export", "--link", "https://moodle.example.org/foo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Link not valid"));
}

#[test]
fn test_export_needs_at_least_one_kind() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .args(["export", "--id", "5", "--no-glossary", "--no-wiki", "--no-database"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("select some modules"));
    home.child("FAQ.pdf").assert(predicate::path::missing());
}

#[test]
fn test_link_and_id_conflict() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .args(["export", "--id", "5", "--link", "https://x/course/view.php?id=5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

// ============================================================================
// Completions Tests
// ============================================================================

#[test]
fn test_completions_bash() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("moodle2pdf"));
}

#[test]
fn test_visibility_needs_direction() {
    let home = assert_fs::TempDir::new().unwrap();
    moodle2pdf(&home).args(["visibility", "--module", "3"]).assert().failure();
}
