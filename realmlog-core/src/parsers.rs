//! Document parsers for session exports.
//!
//! Every entry point takes the caller's [`DiagnosticSink`]; nothing here
//! touches process-wide state, so documents can be parsed in parallel.

use crate::archive::{SessionArchive, SessionDocument};
use crate::character_page::parse_character_page;
use crate::combat::CombatStateMachine;
use crate::config::ParserConfig;
use crate::days::DayTracker;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::error::Result;
use crate::file_utils::read_text_file;
use crate::lines::LogLines;
use crate::models::{CharacterLogPage, DayKey, SessionReport, SessionTimeline};
use crate::session::{assemble, parse_session};
use crate::tokens::{LineToken, Tokenizer};
use crate::turns::CharacterTurnAggregator;
use std::path::Path;

/// Reconstruct the day-indexed timeline of one log.
///
/// Each line is classified once and offered to the combat machine first,
/// then to the turn aggregator; whatever neither claims is kept as a day
/// message.
pub fn parse_log_lines(
    lines: &LogLines,
    config: &ParserConfig,
    sink: &dyn DiagnosticSink,
) -> SessionTimeline {
    let tokenizer = Tokenizer::new(config);
    let mut tracker = DayTracker::new();
    let mut combats = CombatStateMachine::new();
    let mut turns = CharacterTurnAggregator::new();
    let mut last_line = 0;

    for (idx, text) in lines.iter().enumerate() {
        let number = idx + 1;
        last_line = number;
        let token = tokenizer.classify(text);

        if let LineToken::DayMarker { month, day } = token {
            tracker.advance(DayKey::new(month, day), |closing| {
                combats.interrupt(number, sink);
                turns.flush(closing);
            });
            continue;
        }

        if token == LineToken::Noise {
            sink.record(
                Diagnostic::new(DiagnosticKind::DiscardedNoise, format!("Empty engine line: {}", text))
                    .at_line(number),
            );
            continue;
        }

        let line = tracker.tag(number, text);
        if combats.feed(&line, &token, sink) {
            continue;
        }

        match token {
            LineToken::MonsterRoll { value } => tracker.record_monster_roll(value),
            LineToken::Spawn { monster, location } => tracker.record_spawn(monster, location),
            ref other if turns.feed(&line, other, sink) => {}
            LineToken::SystemMessage { engine, text } => tracker.record_message(Some(engine), text),
            LineToken::Narrative { text } => tracker.record_message(None, text),
            _ => tracker.record_message(None, text.to_string()),
        }
    }

    let end_day = tracker.current();
    let combats = combats.finish(last_line, sink);
    let turns = turns.finish(end_day);
    let days = tracker.finish();
    tracing::debug!(
        lines = lines.len(),
        days = days.len(),
        combats = combats.len(),
        turns = turns.len(),
        "Parsed log"
    );
    assemble(days, combats, turns)
}

/// Parse a turn log or detail log, HTML or plain text.
pub fn parse_log_text(
    content: &str,
    config: &ParserConfig,
    sink: &dyn DiagnosticSink,
) -> SessionTimeline {
    parse_log_lines(&LogLines::from_document(content), config, sink)
}

/// Decode and parse one log document.
pub fn parse_log_document(
    document: &SessionDocument,
    config: &ParserConfig,
    sink: &dyn DiagnosticSink,
) -> Result<SessionTimeline> {
    let content = document.decode()?;
    Ok(parse_log_text(&content, config, sink))
}

/// Parse a log file from disk.
pub fn parse_log_file(
    file_path: &Path,
    config: &ParserConfig,
    sink: &dyn DiagnosticSink,
) -> Result<SessionTimeline> {
    let content = read_text_file(file_path)?;
    Ok(parse_log_text(&content, config, sink))
}

/// Parse one character's export page from disk.
pub fn parse_character_page_file(
    file_path: &Path,
    config: &ParserConfig,
    sink: &dyn DiagnosticSink,
) -> Result<CharacterLogPage> {
    let content = read_text_file(file_path)?;
    parse_character_page(&content, config, sink)
}

/// Open a session zip and reconstruct everything in it.
///
/// Only an unreadable archive fails; individual documents that cannot be
/// decoded end up in [`SessionReport::failures`].
pub fn parse_session_archive(
    file_path: &Path,
    config: &ParserConfig,
    sink: &dyn DiagnosticSink,
) -> Result<SessionReport> {
    let input = SessionArchive::open(file_path)?.into_input(config)?;
    tracing::info!(
        archive = %file_path.display(),
        documents = input.document_count(),
        "Parsing session archive"
    );
    Ok(parse_session(&input, config, sink))
}
