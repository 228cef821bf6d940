//! File utility functions.

use crate::error::{RealmlogError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively find files with given extension in a directory.
pub fn find_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(RealmlogError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory not found: {}", dir.display()),
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            if let Some(ext) = entry.path().extension() {
                if ext.eq_ignore_ascii_case(extension) {
                    files.push(entry.path().to_path_buf());
                }
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Decode exported bytes as text.
///
/// Exports are usually UTF-8, older clients wrote Windows-1252. Bytes that
/// contain NUL are not text at all.
pub fn decode_text(bytes: &[u8], document: &str) -> Result<String> {
    if bytes.contains(&0) {
        return Err(RealmlogError::malformed(
            document,
            "content contains NUL bytes and is not text",
        ));
    }

    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
    if had_errors {
        return Err(RealmlogError::malformed(
            document,
            "failed to decode as UTF-8 or Windows-1252",
        ));
    }
    Ok(text.into_owned())
}

/// Read a file and decode it with [`decode_text`].
pub fn read_text_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    decode_text(&bytes, &path.display().to_string())
}
