//! Session assembly.
//!
//! Merges day summaries, combats and turns into one [`SessionTimeline`],
//! folds in the full-detail log and the character pages of a session.

use crate::archive::SessionInput;
use crate::character_page::parse_character_page;
use crate::config::ParserConfig;
use crate::days::DaySummary;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::error::RealmlogError;
use crate::models::{
    CharacterLogPage, CharacterTurn, Combat, DayKey, DocumentFailure, SessionReport,
    SessionTimeline,
};
use crate::parsers::parse_log_document;
use rayon::prelude::*;
use std::collections::HashMap;

/// Build the timeline from the outputs of one parse pass.
///
/// Every day summary becomes a record even when nothing happened on it. A
/// character's second turn on the same day replaces the first in place.
pub fn assemble(
    days: Vec<DaySummary>,
    combats: Vec<(DayKey, Combat)>,
    turns: Vec<(DayKey, CharacterTurn)>,
) -> SessionTimeline {
    let mut timeline = SessionTimeline::new();

    for summary in days {
        let record = timeline.day_mut(summary.key);
        if summary.monster_roll.is_some() {
            record.monster_roll = summary.monster_roll;
        }
        record.spawns.extend(summary.spawns);
        record.messages.extend(summary.messages);
    }

    for (key, turn) in turns {
        let record = timeline.day_mut(key);
        match record
            .turns
            .iter_mut()
            .find(|existing| existing.character == turn.character)
        {
            Some(existing) => *existing = turn,
            None => record.turns.push(turn),
        }
    }

    for (key, combat) in combats {
        timeline.day_mut(key).combats.push(combat);
    }

    timeline
}

/// Fold a full-detail log timeline into the turn log timeline.
///
/// The detail log's combats win for every day where it has any. Turns, the
/// monster roll, spawns and messages from the detail log only fill gaps.
pub fn merge_detail(primary: &mut SessionTimeline, detail: SessionTimeline) {
    for record in detail.into_days() {
        let target = primary.day_mut(record.key());
        if !record.combats.is_empty() {
            target.combats = record.combats;
        }
        if target.turns.is_empty() {
            target.turns = record.turns;
        }
        if target.monster_roll.is_none() {
            target.monster_roll = record.monster_roll;
        }
        if target.spawns.is_empty() {
            target.spawns = record.spawns;
        }
        if target.messages.is_empty() {
            target.messages = record.messages;
        }
    }
}

/// Fill missing player names on turns from the character pages.
pub fn fill_players(timeline: &mut SessionTimeline, pages: &[CharacterLogPage]) {
    let players: HashMap<&str, &str> = pages
        .iter()
        .filter(|page| !page.character.is_empty() && !page.player.is_empty())
        .map(|page| (page.character.as_str(), page.player.as_str()))
        .collect();
    if players.is_empty() {
        return;
    }

    for record in timeline.days_mut() {
        for turn in record.turns.iter_mut().filter(|turn| turn.player.is_empty()) {
            if let Some(player) = players.get(turn.character.as_str()) {
                turn.player = player.to_string();
            }
        }
    }
}

/// Reconstruct a whole session.
///
/// A document that fails to decode is listed in the report's failures and
/// its siblings are still parsed. Character pages are parsed in parallel.
pub fn parse_session(
    input: &SessionInput,
    config: &ParserConfig,
    sink: &dyn DiagnosticSink,
) -> SessionReport {
    let mut failures = Vec::new();

    let primary = match &input.turn_log {
        Some(document) => match parse_log_document(document, config, sink) {
            Ok(timeline) => Some(timeline),
            Err(e) => {
                record_failure(&mut failures, &document.name, &e, sink);
                None
            }
        },
        None => {
            sink.record(Diagnostic::new(
                DiagnosticKind::MissingExpectedSection,
                "Session has no turn log",
            ));
            None
        }
    };

    let detail = input.detail_log.as_ref().and_then(|document| {
        match parse_log_document(document, config, sink) {
            Ok(timeline) => Some(timeline),
            Err(e) => {
                record_failure(&mut failures, &document.name, &e, sink);
                None
            }
        }
    });

    let mut timeline = match (primary, detail) {
        (Some(mut primary), Some(detail)) => {
            merge_detail(&mut primary, detail);
            primary
        }
        (Some(primary), None) => primary,
        (None, Some(detail)) => detail,
        (None, None) => SessionTimeline::new(),
    };

    let pages: Vec<_> = input
        .character_pages
        .par_iter()
        .map(|document| {
            let page = document
                .decode()
                .and_then(|content| parse_character_page(&content, config, sink));
            (document, page)
        })
        .collect();

    let mut characters = Vec::with_capacity(pages.len());
    for (document, page) in pages {
        match page {
            Ok(page) => characters.push(page),
            Err(e) => record_failure(&mut failures, &document.name, &e, sink),
        }
    }

    fill_players(&mut timeline, &characters);

    tracing::info!(
        days = timeline.len(),
        characters = characters.len(),
        failures = failures.len(),
        "Session assembled"
    );
    SessionReport {
        timeline,
        characters,
        failures,
    }
}

fn record_failure(
    failures: &mut Vec<DocumentFailure>,
    document: &str,
    error: &RealmlogError,
    sink: &dyn DiagnosticSink,
) {
    sink.record(Diagnostic::new(
        DiagnosticKind::DocumentFailed,
        format!("{}: {}", document, error),
    ));
    failures.push(DocumentFailure {
        document: document.to_string(),
        error: error.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::SessionDocument;
    use crate::diagnostics::CollectingSink;
    use crate::models::{ActionKind, MonsterSpawn, TurnAction};

    fn turn(character: &str, action: &str) -> CharacterTurn {
        CharacterTurn {
            character: character.to_string(),
            player: String::new(),
            start_location: String::new(),
            end_location: String::new(),
            actions: vec![TurnAction {
                action: action.to_string(),
                result: String::new(),
                kind: ActionKind::Other,
                blocked: false,
            }],
        }
    }

    #[test]
    fn test_assemble_orders_days_and_upserts_turns() {
        let day_one = DayKey::new(1, 1);
        let day_two = DayKey::new(1, 2);
        let timeline = assemble(
            Vec::new(),
            vec![(day_two, Combat::new("Cavern 2"))],
            vec![
                (day_two, turn("Tom", "first")),
                (day_one, turn("Ann", "rest")),
                (day_two, turn("Tom", "second")),
            ],
        );

        let keys: Vec<DayKey> = timeline.keys().collect();
        assert_eq!(keys, vec![day_one, day_two]);
        let second = timeline.day(day_two).unwrap();
        assert_eq!(second.turns.len(), 1);
        assert_eq!(second.turns[0].actions[0].action, "second");
        assert_eq!(second.combats.len(), 1);
    }

    #[test]
    fn test_merge_detail_prefers_detail_combats() {
        let key = DayKey::new(1, 1);
        let mut primary = SessionTimeline::new();
        primary.day_mut(key).turns.push(turn("Tom", "hide"));
        primary.day_mut(key).combats.push(Combat::new("Ruins 5"));

        let mut detail = SessionTimeline::new();
        let record = detail.day_mut(key);
        record.combats.push(Combat::new("Ruins 5"));
        record.combats.push(Combat::new("Ruins 6"));
        record.turns.push(turn("Tom", "ignored"));
        record.monster_roll = Some(2);
        record.spawns.push(MonsterSpawn {
            monster: "Giant".to_string(),
            location: "Ruins 5".to_string(),
        });
        detail.day_mut(DayKey::new(1, 2)).monster_roll = Some(6);

        merge_detail(&mut primary, detail);

        let day = primary.day(key).unwrap();
        assert_eq!(day.combats.len(), 2);
        assert_eq!(day.turns[0].actions[0].action, "hide");
        assert_eq!(day.monster_roll, Some(2));
        assert_eq!(day.spawns.len(), 1);
        assert_eq!(primary.day(DayKey::new(1, 2)).unwrap().monster_roll, Some(6));
    }

    #[test]
    fn test_fill_players_from_pages() {
        let mut timeline = SessionTimeline::new();
        timeline.day_mut(DayKey::new(1, 1)).turns.push(turn("Tom", "hide"));
        let pages = vec![CharacterLogPage {
            character: "Tom".to_string(),
            player: "Alice".to_string(),
            ..Default::default()
        }];

        fill_players(&mut timeline, &pages);
        assert_eq!(timeline.day(DayKey::new(1, 1)).unwrap().turns[0].player, "Alice");
    }

    #[test]
    fn test_failed_document_does_not_abort_session() {
        let input = SessionInput {
            turn_log: Some(SessionDocument::new(
                "game_log.html",
                "<html>Month 1, Day 1<br>Tom - Hides<br></html>",
            )),
            detail_log: Some(SessionDocument::new("detail.txt", b"\x00\x01binary".to_vec())),
            character_pages: vec![
                SessionDocument::new("Tom.html", "<h2>Tom (Alice)</h2>"),
                SessionDocument::new("Broken.html", b"\x00\x00".to_vec()),
            ],
        };
        let sink = CollectingSink::new();
        let report = parse_session(&input, &ParserConfig::default(), &sink);

        assert_eq!(report.timeline.len(), 1);
        assert_eq!(report.characters.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].document, "detail.txt");
        assert_eq!(report.failures[1].document, "Broken.html");
        assert_eq!(sink.count(DiagnosticKind::DocumentFailed), 2);

        let day = report.timeline.day(DayKey::new(1, 1)).unwrap();
        assert_eq!(day.turns[0].player, "Alice");
    }
}
