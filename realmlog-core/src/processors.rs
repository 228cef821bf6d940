//! Batch processing and export of reconstructed sessions.

use crate::config::ParserConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::Result;
use crate::models::{ActionKind, SessionReport, SessionTimeline};
use crate::parsers::parse_session_archive;
use rayon::prelude::*;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// What happened to one archive of a batch.
#[derive(Debug, Clone)]
pub enum ArchiveOutcome {
    /// The archive was read. Individual documents may still have failed.
    Parsed { archive: PathBuf, report: SessionReport },
    /// The archive could not be opened or read.
    Failed { archive: PathBuf, error: String },
}

impl ArchiveOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ArchiveOutcome::Parsed { .. })
    }

    pub fn archive(&self) -> &Path {
        match self {
            ArchiveOutcome::Parsed { archive, .. } => archive.as_path(),
            ArchiveOutcome::Failed { archive, .. } => archive.as_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub total_processed: usize,
    pub parsed: usize,
    pub failed: usize,
    /// Documents that failed inside otherwise readable archives.
    pub documents_failed: usize,
    pub days: usize,
}

impl ProcessSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_outcome(&mut self, outcome: &ArchiveOutcome) {
        self.total_processed += 1;
        match outcome {
            ArchiveOutcome::Parsed { report, .. } => {
                self.parsed += 1;
                self.documents_failed += report.failures.len();
                self.days += report.timeline.len();
            }
            ArchiveOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Parse one archive, capturing failure instead of returning it.
pub fn process_archive(path: &Path, config: &ParserConfig, sink: &dyn DiagnosticSink) -> ArchiveOutcome {
    match parse_session_archive(path, config, sink) {
        Ok(report) => ArchiveOutcome::Parsed {
            archive: path.to_path_buf(),
            report,
        },
        Err(e) => ArchiveOutcome::Failed {
            archive: path.to_path_buf(),
            error: e.to_string(),
        },
    }
}

/// Parse many archives in parallel. Outcomes keep the order of `paths`;
/// `on_done` sees each outcome as soon as it is ready.
pub fn process_archives<F>(
    paths: &[PathBuf],
    config: &ParserConfig,
    sink: &dyn DiagnosticSink,
    on_done: F,
) -> (Vec<ArchiveOutcome>, ProcessSummary)
where
    F: Fn(&ArchiveOutcome) + Sync,
{
    let outcomes: Vec<ArchiveOutcome> = paths
        .par_iter()
        .map(|path| {
            let outcome = process_archive(path, config, sink);
            on_done(&outcome);
            outcome
        })
        .collect();

    let mut summary = ProcessSummary::new();
    for outcome in &outcomes {
        summary.add_outcome(outcome);
    }
    (outcomes, summary)
}

/// One CSV row per turn action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnRow {
    pub month: u32,
    pub day: u32,
    pub character: String,
    pub player: String,
    pub start_location: String,
    pub end_location: String,
    pub action: String,
    pub result: String,
    pub kind: Option<ActionKind>,
    pub blocked: bool,
}

/// Flatten turns into rows. A turn without actions still gets one row.
pub fn turn_rows(timeline: &SessionTimeline) -> Vec<TurnRow> {
    let mut rows = Vec::new();
    for record in timeline.days() {
        for turn in &record.turns {
            let row = |action: String, result: String, kind: Option<ActionKind>, blocked: bool| TurnRow {
                month: record.month,
                day: record.day,
                character: turn.character.clone(),
                player: turn.player.clone(),
                start_location: turn.start_location.clone(),
                end_location: turn.end_location.clone(),
                action,
                result,
                kind,
                blocked,
            };
            if turn.actions.is_empty() {
                rows.push(row(String::new(), String::new(), None, false));
            }
            for action in &turn.actions {
                rows.push(row(
                    action.action.clone(),
                    action.result.clone(),
                    Some(action.kind),
                    action.blocked,
                ));
            }
        }
    }
    rows
}

/// Write the turn rows as CSV with a header. Returns the number of rows.
pub fn write_turns_csv<W: Write>(timeline: &SessionTimeline, writer: W) -> Result<usize> {
    let rows = turn_rows(timeline);
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(rows.len())
}

pub fn timeline_to_json(timeline: &SessionTimeline, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(timeline)?
    } else {
        serde_json::to_string(timeline)?
    };
    Ok(json)
}

/// Per-day counts for quick inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayStats {
    pub month: u32,
    pub day: u32,
    pub monster_roll: Option<u8>,
    pub turns: usize,
    pub actions: usize,
    pub blocked: usize,
    pub combats: usize,
    pub meaningful_combats: usize,
    pub unterminated_combats: usize,
    pub spawns: usize,
}

pub fn day_stats(timeline: &SessionTimeline) -> Vec<DayStats> {
    timeline
        .days()
        .map(|record| DayStats {
            month: record.month,
            day: record.day,
            monster_roll: record.monster_roll,
            turns: record.turns.len(),
            actions: record.turns.iter().map(|t| t.actions.len()).sum(),
            blocked: record
                .turns
                .iter()
                .flat_map(|t| &t.actions)
                .filter(|a| a.blocked)
                .count(),
            combats: record.combats.len(),
            meaningful_combats: record.meaningful_combats().count(),
            unterminated_combats: record.combats.iter().filter(|c| c.unterminated).count(),
            spawns: record.spawns.len(),
        })
        .collect()
}
