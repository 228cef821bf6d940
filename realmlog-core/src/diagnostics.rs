//! Diagnostics emitted while reconstructing a session.
//!
//! Parsers never log through process-wide state directly; they report to a
//! [`DiagnosticSink`] handed in by the caller. [`TracingSink`] forwards to
//! `tracing`, [`CollectingSink`] keeps everything for later inspection.

use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// Input ended (or a new day/battle began) while a combat was still open.
    UnterminatedCombat,
    /// A table or heading the per-character parser looks for was absent.
    MissingExpectedSection,
    /// Action text that maps to no known action kind.
    UnrecognizedActionCode,
    /// Engine-prefixed line with nothing after the prefix.
    DiscardedNoise,
    /// A character showed up again later in the same day.
    TurnOverwritten,
    /// Combat-only line (group marker, round marker, end) seen outside a battle.
    OrphanCombatLine,
    /// One document of a session could not be parsed.
    DocumentFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// 1-based line number within the document, when known.
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, diagnostic: Diagnostic) {
        let line = diagnostic.line.unwrap_or(0);
        match diagnostic.kind {
            DiagnosticKind::DocumentFailed => {
                tracing::warn!(kind = ?diagnostic.kind, line, "{}", diagnostic.message)
            }
            DiagnosticKind::UnterminatedCombat | DiagnosticKind::MissingExpectedSection => {
                tracing::info!(kind = ?diagnostic.kind, line, "{}", diagnostic.message)
            }
            _ => tracing::debug!(kind = ?diagnostic.kind, line, "{}", diagnostic.message),
        }
    }
}

/// Buffers diagnostics in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries().iter().filter(|d| d.kind == kind).count()
    }
}

impl DiagnosticSink for CollectingSink {
    fn record(&self, diagnostic: Diagnostic) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _diagnostic: Diagnostic) {}
}
