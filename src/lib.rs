#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::unnecessary_lazy_evaluations)]
#![allow(clippy::match_wildcard_for_single_variants)]

//! # moodle2pdf
//!
//! Export Moodle glossaries, wikis and databases to PDF and manage the
//! visibility of course modules from the terminal.
//!
//! moodle2pdf logs into a Moodle site through its REST web service, shows the
//! courses of the user as a tree and lets you toggle module visibility or
//! select activities for a combined PDF export.
//!
//! ## Features
//!
//! - **Course Editor**: Browse sections and modules, show or hide them
//! - **PDF Export**: Glossaries, wikis and databases in one document
//! - **Scriptable**: Every operation is also a CLI subcommand
//! - **Keychain**: Optionally remember passwords in the OS keychain
//! - **German and English**: Interface language follows the locale
//!
//! ## Quick Start
//!
//! ```bash
//! # Open the editor
//! moodle2pdf
//!
//! # Export everything from one course
//! moodle2pdf export --link "https://moodle.example.org/course/view.php?id=42" -o faq.pdf
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]

pub mod app;
pub mod core;
pub mod export;
pub mod moodle;
pub mod security;
pub mod tui;

// Re-export commonly used types
pub use app::App;
pub use core::Config;
pub use moodle::{MoodleApi, MoodleClient, MoodleError};

/// Application name
pub const APP_NAME: &str = "moodle2pdf";
