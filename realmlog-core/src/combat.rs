//! Combat state machine.
//!
//! The machine is either idle or inside one battle:
//! - Idle: waiting for a `Battle resolving at` line
//! - InBattle: accumulating rosters and round content
//!
//! A battle closes on `Combat has ended.` or an END-button press. A day
//! marker, a new battle start or the end of the document closes it as
//! unterminated instead; an open combat is never dropped.

use crate::days::LogLine;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::models::{Combat, CombatRound, DayKey, PerformerText, END_BUTTON_TEXT};
use crate::tokens::LineToken;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref DEATH: Regex = Regex::new(r"\bwas killed\b").unwrap();
    static ref VICTIM: Regex = Regex::new(r"^(?:.+? - )?(.+?) was killed\b").unwrap();
    static ref ARMOR: Regex = Regex::new(
        r"(?i)\b(?:armor|armour|shield|helmet|breastplate)\b.*\b(?:destroyed|destroys|broken)\b|\bdestroy(?:s|ed)?\b.*\b(?:armor|armour|shield|helmet|breastplate)\b"
    )
    .unwrap();
    static ref FAME: Regex = Regex::new(r"(?i)\b(?:fame|notoriety)\b").unwrap();
    static ref SPELL: Regex = Regex::new(r"(?i)\bcasts?\b|\bspell\b").unwrap();
    static ref FATIGUE: Regex = Regex::new(r"(?i)\bfatigue[sd]?\b").unwrap();
    static ref DISENGAGE: Regex =
        Regex::new(r"(?i)\bdisengag(?:e|es|ed|ing)\b|\bruns? away\b|\bflees?\b|\bfled\b").unwrap();
    static ref DAMAGE: Regex =
        Regex::new(r"(?i)\bdamage[sd]?\b|\bwounds?\b|\bwounded\b|\bharm\b").unwrap();
    static ref ATTACK: Regex = Regex::new(
        r"(?i)\battack roll\b|\bto hit\b|\bhits\b|\bmisse[sd]\b|\bintercepts?\b|\bundercuts?\b"
    )
    .unwrap();
}

/// Sub-event category of an in-battle line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatCategory {
    Death,
    ArmorDestroyed,
    Fame,
    Spell,
    Fatigue,
    Disengagement,
    Damage,
    Attack,
    Action,
}

/// Sort a line body into a category. First match wins.
pub fn categorize(text: &str) -> CombatCategory {
    if DEATH.is_match(text) {
        CombatCategory::Death
    } else if ARMOR.is_match(text) {
        CombatCategory::ArmorDestroyed
    } else if FAME.is_match(text) {
        CombatCategory::Fame
    } else if SPELL.is_match(text) {
        CombatCategory::Spell
    } else if FATIGUE.is_match(text) {
        CombatCategory::Fatigue
    } else if DISENGAGE.is_match(text) {
        CombatCategory::Disengagement
    } else if DAMAGE.is_match(text) {
        CombatCategory::Damage
    } else if ATTACK.is_match(text) {
        CombatCategory::Attack
    } else {
        CombatCategory::Action
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RosterMode {
    Off,
    /// After GROUP 1: the next line names the acting character.
    AwaitingCharacter,
    /// After GROUP n (n > 1): engine lines name monsters.
    CollectingMonsters(u32),
}

#[derive(Debug)]
struct OpenCombat {
    day: DayKey,
    started_at: usize,
    combat: Combat,
    /// Members per announced group number, collapsed into `groups` on close.
    rosters: BTreeMap<u32, Vec<String>>,
    roster: RosterMode,
    seen_round_marker: bool,
}

impl OpenCombat {
    fn new(day: DayKey, started_at: usize, location: &str) -> Self {
        let mut combat = Combat::new(location);
        combat.rounds.push(CombatRound::new(1));
        Self {
            day,
            started_at,
            combat,
            rosters: BTreeMap::new(),
            roster: RosterMode::Off,
            seen_round_marker: false,
        }
    }

    fn round_mut(&mut self) -> &mut CombatRound {
        if self.combat.rounds.is_empty() {
            self.combat.rounds.push(CombatRound::new(1));
        }
        let last = self.combat.rounds.len() - 1;
        &mut self.combat.rounds[last]
    }

    fn group_mut(&mut self, group: u32) -> &mut Vec<String> {
        self.rosters.entry(group).or_default()
    }

    fn add_member(&mut self, group: u32, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let members = self.group_mut(group);
        if !members.iter().any(|m| m == name) {
            members.push(name.to_string());
        }
    }

    /// The first explicit marker names the implicit round 1; later markers
    /// open the next round.
    fn start_round(&mut self, phase: Option<String>) {
        let first_marker = !self.seen_round_marker && self.combat.rounds.len() == 1;
        self.seen_round_marker = true;
        if first_marker {
            self.combat.rounds[0].phase = phase;
            return;
        }
        let number = self.combat.rounds.len() as u32 + 1;
        let mut round = CombatRound::new(number);
        round.phase = phase;
        self.combat.rounds.push(round);
    }

    fn record(&mut self, performer: &str, body: &str) {
        let category = categorize(body);
        if category == CombatCategory::Death {
            if let Some(caps) = VICTIM.captures(body) {
                let victim = caps[1].trim().to_string();
                if !self.combat.killed.contains(&victim) {
                    self.combat.killed.push(victim);
                }
            }
        }

        let round = self.round_mut();
        let entry = PerformerText::new(performer, body);
        match category {
            CombatCategory::Death => round.deaths.push(body.to_string()),
            CombatCategory::ArmorDestroyed => round.armor_destroyed.push(body.to_string()),
            CombatCategory::Damage => round.damage.push(body.to_string()),
            CombatCategory::Attack => round.attacks.push(body.to_string()),
            CombatCategory::Fame => round.fame.push(entry),
            CombatCategory::Spell => round.spells.push(entry),
            CombatCategory::Fatigue => round.fatigue.push(entry),
            CombatCategory::Disengagement => round.disengagement.push(entry),
            CombatCategory::Action => round.actions.push(entry),
        }
    }

    /// Fill the derived roster fields and hand the combat over.
    fn close(mut self, unterminated: bool) -> Combat {
        self.combat.unterminated = unterminated;
        self.combat.character = self
            .rosters
            .get(&1)
            .and_then(|members| members.first())
            .cloned();
        self.combat.monsters = self
            .rosters
            .range(2..)
            .flat_map(|(_, members)| members.iter().cloned())
            .collect();
        self.combat.groups = self.rosters.into_values().collect();
        self.combat
    }
}

#[derive(Debug, Default)]
enum MachineState {
    #[default]
    Idle,
    InBattle(Box<OpenCombat>),
}

/// Turns battle tokens into [`Combat`] records, tagged with their day.
#[derive(Debug, Default)]
pub struct CombatStateMachine {
    state: MachineState,
    finished: Vec<(DayKey, Combat)>,
}

impl CombatStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_battle(&self) -> bool {
        matches!(self.state, MachineState::InBattle(_))
    }

    /// Offer a token to the machine. Returns `true` when the line belongs to
    /// combat and must not be attributed anywhere else.
    pub fn feed(&mut self, line: &LogLine<'_>, token: &LineToken, sink: &dyn DiagnosticSink) -> bool {
        if let LineToken::BattleStart { location } = token {
            if self.in_battle() {
                self.interrupt(line.number, sink);
            }
            tracing::debug!(line = line.number, location = %location, "Battle started");
            self.state =
                MachineState::InBattle(Box::new(OpenCombat::new(line.day, line.number, location)));
            return true;
        }

        let open = match &mut self.state {
            MachineState::InBattle(open) => open,
            MachineState::Idle => return Self::feed_idle(line, token, sink),
        };

        match token {
            LineToken::DayMarker { .. } | LineToken::MonsterRoll { .. } | LineToken::Spawn { .. } => {
                return false;
            }
            LineToken::Noise => return true,
            _ => {}
        }

        if let LineToken::RoundMarker { phase, .. } = token {
            open.roster = RosterMode::Off;
            open.start_round(phase.clone());
            open.round_mut().raw.push(line.text.to_string());
            return true;
        }

        open.round_mut().raw.push(line.text.to_string());

        match token {
            LineToken::GroupMarker { group } => {
                let group = (*group).max(1);
                open.group_mut(group);
                open.roster = if group == 1 {
                    RosterMode::AwaitingCharacter
                } else {
                    RosterMode::CollectingMonsters(group)
                };
            }
            LineToken::CombatEnd {
                performer,
                end_button,
            } => {
                if *end_button {
                    let performer = performer.clone().unwrap_or_default();
                    open.round_mut()
                        .actions
                        .push(PerformerText::new(performer, END_BUTTON_TEXT));
                }
                self.close(false);
            }
            LineToken::SystemMessage { text, .. }
                if matches!(open.roster, RosterMode::CollectingMonsters(_)) =>
            {
                if let RosterMode::CollectingMonsters(group) = open.roster {
                    open.add_member(group, text);
                }
            }
            LineToken::Narrative { text } if open.roster == RosterMode::AwaitingCharacter => {
                let name = text.split(" - ").next().unwrap_or(text);
                open.add_member(1, name);
                open.roster = RosterMode::Off;
            }
            other => {
                if open.roster == RosterMode::AwaitingCharacter {
                    if let Some(name) = other.performer() {
                        open.add_member(1, name);
                    }
                }
                open.roster = RosterMode::Off;
                let (performer, body) = performer_and_body(other, line.text);
                open.record(&performer, &body);
            }
        }
        true
    }

    fn feed_idle(line: &LogLine<'_>, token: &LineToken, sink: &dyn DiagnosticSink) -> bool {
        match token {
            LineToken::GroupMarker { .. } | LineToken::RoundMarker { .. } => {
                sink.record(
                    Diagnostic::new(
                        DiagnosticKind::OrphanCombatLine,
                        format!("Combat marker outside a battle: {}", line.text),
                    )
                    .at_line(line.number),
                );
                true
            }
            LineToken::CombatEnd { performer, .. } => {
                sink.record(
                    Diagnostic::new(
                        DiagnosticKind::OrphanCombatLine,
                        format!("Combat end outside a battle: {}", line.text),
                    )
                    .at_line(line.number),
                );
                // attributed lines still belong to the performer's turn
                performer.is_none()
            }
            _ => false,
        }
    }

    fn close(&mut self, unterminated: bool) {
        if let MachineState::InBattle(open) = std::mem::take(&mut self.state) {
            let day = open.day;
            let keep = unterminated
                || !open.rosters.is_empty()
                || open.combat.rounds.iter().any(CombatRound::is_meaningful);
            let combat = (*open).close(unterminated);
            if keep {
                tracing::debug!(location = %combat.location, rounds = combat.rounds.len(), "Battle closed");
                self.finished.push((day, combat));
            } else {
                tracing::debug!(location = %combat.location, "Discarding empty battle");
            }
        }
    }

    /// Close an open combat without a terminating line.
    pub fn interrupt(&mut self, at_line: usize, sink: &dyn DiagnosticSink) {
        if let MachineState::InBattle(open) = &self.state {
            sink.record(
                Diagnostic::new(
                    DiagnosticKind::UnterminatedCombat,
                    format!(
                        "Battle at {} (started line {}) was never ended",
                        open.combat.location, open.started_at
                    ),
                )
                .at_line(at_line),
            );
            self.close(true);
        }
    }

    /// Finalize any open combat and return everything collected.
    pub fn finish(mut self, at_line: usize, sink: &dyn DiagnosticSink) -> Vec<(DayKey, Combat)> {
        self.interrupt(at_line, sink);
        self.finished
    }
}

/// Performer and display text of an in-battle line.
fn performer_and_body(token: &LineToken, line: &str) -> (String, String) {
    match token {
        LineToken::CharacterAction { performer, text } => {
            (performer.clone(), format!("{} - {}", performer, text))
        }
        LineToken::SystemMessage { engine, text } => (engine.clone(), text.clone()),
        LineToken::Blocked { performer, code } => (
            performer.clone().unwrap_or_default(),
            format!("Cannot perform action {}", code),
        ),
        LineToken::Narrative { text } => {
            let performer = VICTIM
                .captures(text)
                .map(|caps| caps[1].trim().to_string())
                .unwrap_or_default();
            (performer, text.clone())
        }
        _ => (String::new(), line.to_string()),
    }
}
