//! Session export archives.
//!
//! A session export is a zip holding one HTML page per character, an
//! aggregate turn log page and optionally a plain-text full-detail log.

use crate::config::ParserConfig;
use crate::error::{RealmlogError, Result};
use crate::file_utils::decode_text;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

lazy_static! {
    static ref DAY_MARKER: Regex = Regex::new(r"Month \d+, Day \d+").unwrap();
}

/// One named file of a session export, still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SessionDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn decode(&self) -> Result<String> {
        decode_text(&self.bytes, &self.name)
    }

    fn is_html(&self) -> bool {
        let name = self.name.to_lowercase();
        name.ends_with(".html") || name.ends_with(".htm")
    }

    fn day_marker_count(&self) -> usize {
        DAY_MARKER
            .find_iter(&String::from_utf8_lossy(&self.bytes))
            .count()
    }
}

/// The documents of one session, sorted by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInput {
    pub turn_log: Option<SessionDocument>,
    pub detail_log: Option<SessionDocument>,
    pub character_pages: Vec<SessionDocument>,
}

impl SessionInput {
    /// Sort documents by name. When no name looks like a turn log, the HTML
    /// page with the most day markers is taken as the turn log.
    pub fn from_documents(documents: Vec<SessionDocument>, config: &ParserConfig) -> Result<Self> {
        let turn_pattern = config.turn_log_regex()?;
        let detail_pattern = config.detail_log_regex()?;

        let mut input = Self::default();
        for document in documents {
            if input.detail_log.is_none() && detail_pattern.is_match(&document.name) {
                input.detail_log = Some(document);
            } else if input.turn_log.is_none() && turn_pattern.is_match(&document.name) {
                input.turn_log = Some(document);
            } else if document.is_html() {
                input.character_pages.push(document);
            } else {
                tracing::debug!(name = %document.name, "Ignoring archive entry");
            }
        }

        if input.turn_log.is_none() {
            let best = input
                .character_pages
                .iter()
                .enumerate()
                .map(|(idx, page)| (idx, page.day_marker_count()))
                .filter(|(_, markers)| *markers > 0)
                .max_by_key(|(idx, markers)| (*markers, std::cmp::Reverse(*idx)));
            if let Some((idx, markers)) = best {
                let page = input.character_pages.remove(idx);
                tracing::debug!(name = %page.name, markers, "Using page as turn log");
                input.turn_log = Some(page);
            }
        }

        Ok(input)
    }

    pub fn document_count(&self) -> usize {
        self.character_pages.len()
            + usize::from(self.turn_log.is_some())
            + usize::from(self.detail_log.is_some())
    }
}

/// All file entries of a session zip.
#[derive(Debug, Clone)]
pub struct SessionArchive {
    pub source: String,
    pub documents: Vec<SessionDocument>,
}

impl SessionArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), path.display().to_string())
    }

    /// Read every file entry. Directory entries and macOS resource forks are
    /// skipped.
    pub fn from_reader<R: Read + Seek>(reader: R, source: impl Into<String>) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut documents = Vec::with_capacity(archive.len());

        for idx in 0..archive.len() {
            let mut entry = archive.by_index(idx)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let file_name = name.rsplit('/').next().unwrap_or(&name);
            if name.starts_with("__MACOSX/") || file_name.starts_with("._") {
                continue;
            }

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            documents.push(SessionDocument::new(name, bytes));
        }

        let source = source.into();
        tracing::debug!(source = %source, entries = documents.len(), "Read session archive");
        Ok(Self { source, documents })
    }

    pub fn into_input(self, config: &ParserConfig) -> Result<SessionInput> {
        if self.documents.is_empty() {
            return Err(RealmlogError::InvalidFileFormat(format!(
                "{} contains no files",
                self.source
            )));
        }
        SessionInput::from_documents(self.documents, config)
    }
}
