//! Core types and functionality for moodle2pdf.
//!
//! This module contains configuration, the message catalog and the
//! background worker that runs Moodle calls off the UI thread.

mod config;
mod i18n;
mod worker;

pub use config::{Config, MoodleConfig, PdfConfig, SystemConfig, UiConfig};
pub use i18n::{Locale, Message, Translator};
pub use worker::{load_course, login, CourseContents, Job, Worker, WorkerEvent};
