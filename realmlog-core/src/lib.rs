//! Core library for reconstructing RealmSpeak session exports.

pub mod archive;
pub mod character_page;
pub mod combat;
pub mod config;
pub mod days;
pub mod diagnostics;
pub mod error;
pub mod file_utils;
pub mod inventory;
pub mod lines;
pub mod models;
pub mod parsers;
pub mod processors;
pub mod session;
pub mod tokens;
pub mod turns;

pub use archive::{SessionArchive, SessionDocument, SessionInput};
pub use config::ParserConfig;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticKind, DiagnosticSink, NullSink, TracingSink};
pub use error::{RealmlogError, Result};
pub use models::{DayKey, DayRecord, SessionReport, SessionTimeline};
pub use parsers::{parse_character_page_file, parse_log_file, parse_log_text, parse_session_archive};
pub use session::parse_session;
