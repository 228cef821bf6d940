//! Per-character, per-day action aggregation.

use crate::days::LogLine;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::models::{ActionKind, CharacterTurn, DayKey, END_BUTTON_TEXT, TurnAction};
use crate::tokens::{LineToken, action_kind_from_code, action_kind_from_text};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref PERFORMER_WITH_PLAYER: Regex = Regex::new(r"^(.+?)\s*\(([^()]+)\)$").unwrap();
    /// `<TileName> <ClearingNumber>`, e.g. `Borderland 4` or `Bad Valley 5`.
    static ref LOCATION: Regex =
        Regex::new(r"\b([A-Z][A-Za-z']*(?: [A-Z][A-Za-z']*)*) (\d)\b").unwrap();
}

/// Split `Name (Player)` into character and player.
pub fn split_performer(performer: &str) -> (String, String) {
    match PERFORMER_WITH_PLAYER.captures(performer.trim()) {
        Some(caps) => (caps[1].trim().to_string(), caps[2].trim().to_string()),
        None => (performer.trim().to_string(), String::new()),
    }
}

/// Last `<TileName> <ClearingNumber>` mentioned in `text`.
pub fn find_location(text: &str) -> Option<String> {
    LOCATION
        .captures_iter(text)
        .last()
        .map(|caps| format!("{} {}", &caps[1], &caps[2]))
}

#[derive(Debug)]
struct PendingTurn {
    character: String,
    player: String,
    actions: Vec<TurnAction>,
    first_location: Option<String>,
    last_location: Option<String>,
}

impl PendingTurn {
    fn new(character: String, player: String) -> Self {
        Self {
            character,
            player,
            actions: Vec::new(),
            first_location: None,
            last_location: None,
        }
    }
}

/// Groups character-action lines by character for the current day.
#[derive(Debug, Default)]
pub struct CharacterTurnAggregator {
    pending: Vec<PendingTurn>,
    /// Index of the character whose lines are currently being read.
    active: Option<usize>,
    /// Where each character was at the end of its last turn.
    known_locations: HashMap<String, String>,
    finished: Vec<(DayKey, CharacterTurn)>,
}

impl CharacterTurnAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a token. Returns `true` when it was attributed to a turn.
    pub fn feed(&mut self, line: &LogLine<'_>, token: &LineToken, sink: &dyn DiagnosticSink) -> bool {
        match token {
            LineToken::CharacterAction { performer, text } => {
                let idx = self.turn_for(line, performer, sink);
                self.record_action(idx, line, text, sink);
                true
            }
            LineToken::CombatEnd {
                performer: Some(performer),
                end_button: true,
            } => {
                let idx = self.turn_for(line, performer, sink);
                self.record_action(idx, line, END_BUTTON_TEXT, sink);
                true
            }
            LineToken::Blocked {
                performer: Some(performer),
                code,
            } => {
                let idx = self.turn_for(line, performer, sink);
                self.record_blocked(idx, line, code, sink);
                true
            }
            // a bare refusal belongs to whoever is acting
            LineToken::Blocked {
                performer: None,
                code,
            } => match self.active {
                Some(idx) => {
                    self.record_blocked(idx, line, code, sink);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn turn_for(&mut self, line: &LogLine<'_>, performer: &str, sink: &dyn DiagnosticSink) -> usize {
        let (character, player) = split_performer(performer);

        if let Some(idx) = self.active {
            let turn = &mut self.pending[idx];
            if turn.character == character {
                if turn.player.is_empty() {
                    turn.player = player;
                }
                return idx;
            }
        }

        if let Some(idx) = self.pending.iter().position(|t| t.character == character) {
            sink.record(
                Diagnostic::new(
                    DiagnosticKind::TurnOverwritten,
                    format!("{} acts again on {}; keeping the later turn", character, line.day),
                )
                .at_line(line.number),
            );
            let player = if player.is_empty() {
                std::mem::take(&mut self.pending[idx].player)
            } else {
                player
            };
            self.pending[idx] = PendingTurn::new(character, player);
            self.active = Some(idx);
            return idx;
        }

        self.pending.push(PendingTurn::new(character, player));
        let idx = self.pending.len() - 1;
        self.active = Some(idx);
        idx
    }

    fn record_action(&mut self, idx: usize, line: &LogLine<'_>, text: &str, sink: &dyn DiagnosticSink) {
        let (action, result) = match text.split_once(": ") {
            Some((action, result)) => (action.trim(), result.trim()),
            None => (text.trim(), ""),
        };
        let kind = action_kind_from_text(action).unwrap_or_else(|| {
            sink.record(
                Diagnostic::new(
                    DiagnosticKind::UnrecognizedActionCode,
                    format!("Unrecognized action: {}", action),
                )
                .at_line(line.number),
            );
            ActionKind::Other
        });

        let turn = &mut self.pending[idx];
        if let Some(location) = find_location(action) {
            if turn.first_location.is_none() {
                turn.first_location = Some(location.clone());
            }
            turn.last_location = Some(location);
        }
        turn.actions.push(TurnAction {
            action: action.to_string(),
            result: result.to_string(),
            kind,
            blocked: false,
        });
    }

    fn record_blocked(&mut self, idx: usize, line: &LogLine<'_>, code: &str, sink: &dyn DiagnosticSink) {
        let kind = action_kind_from_code(code).unwrap_or_else(|| {
            sink.record(
                Diagnostic::new(
                    DiagnosticKind::UnrecognizedActionCode,
                    format!("Unrecognized blocked action code: {}", code),
                )
                .at_line(line.number),
            );
            ActionKind::Other
        });
        self.pending[idx].actions.push(TurnAction {
            action: "BLOCKED".to_string(),
            result: code.to_string(),
            kind,
            blocked: true,
        });
    }

    /// Emit one turn per character for `day`, in encounter order, and reset.
    pub fn flush(&mut self, day: DayKey) {
        self.active = None;
        for turn in self.pending.drain(..) {
            let start_location = self
                .known_locations
                .get(&turn.character)
                .cloned()
                .or_else(|| turn.first_location.clone())
                .unwrap_or_default();
            let end_location = turn
                .last_location
                .clone()
                .unwrap_or_else(|| start_location.clone());
            if !end_location.is_empty() {
                self.known_locations
                    .insert(turn.character.clone(), end_location.clone());
            }
            self.finished.push((
                day,
                CharacterTurn {
                    character: turn.character,
                    player: turn.player,
                    start_location,
                    end_location,
                    actions: turn.actions,
                },
            ));
        }
    }

    pub fn finish(mut self, day: DayKey) -> Vec<(DayKey, CharacterTurn)> {
        self.flush(day);
        self.finished
    }
}
