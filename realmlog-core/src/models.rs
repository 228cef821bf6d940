//! Data models for reconstructed RealmSpeak sessions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text of the line a player produces when ending combat by hand.
pub const END_BUTTON_TEXT: &str = "Presses the END combat button.";

/// In-game date. Ordering is month-major, day-minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayKey {
    pub month: u32,
    pub day: u32,
}

impl DayKey {
    pub fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }
}

impl Default for DayKey {
    /// Lines seen before the first day marker belong to Month 1, Day 1.
    fn default() -> Self {
        Self { month: 1, day: 1 }
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Month {}, Day {}", self.month, self.day)
    }
}

/// Broad category of a character action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Move,
    Hide,
    Search,
    Trade,
    Rest,
    Alert,
    Peer,
    Enchant,
    Fly,
    Follow,
    Spell,
    Hire,
    Other,
}

/// One attempted action and what came of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAction {
    /// Raw action text, or `BLOCKED` for refused actions.
    pub action: String,
    /// Result text; for blocked actions the refused action code.
    pub result: String,
    pub kind: ActionKind,
    pub blocked: bool,
}

/// One character's activity for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterTurn {
    pub character: String,
    pub player: String,
    pub start_location: String,
    pub end_location: String,
    pub actions: Vec<TurnAction>,
}

/// A line attributed to whoever performed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformerText {
    pub performer: String,
    pub text: String,
}

impl PerformerText {
    pub fn new(performer: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            performer: performer.into(),
            text: text.into(),
        }
    }

    pub fn is_end_button(&self) -> bool {
        self.text.ends_with(END_BUTTON_TEXT)
    }
}

/// One pass of a combat, with its sub-events sorted into categories.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CombatRound {
    pub number: u32,
    pub phase: Option<String>,
    pub actions: Vec<PerformerText>,
    pub attacks: Vec<String>,
    pub damage: Vec<String>,
    pub armor_destroyed: Vec<String>,
    pub deaths: Vec<String>,
    pub fame: Vec<PerformerText>,
    pub spells: Vec<PerformerText>,
    pub fatigue: Vec<PerformerText>,
    pub disengagement: Vec<PerformerText>,
    /// Every line seen during the round, in order.
    pub raw: Vec<String>,
}

impl CombatRound {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    /// True when no category holds anything.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.has_no_events()
    }

    /// True when the round holds something besides END-button presses.
    pub fn is_meaningful(&self) -> bool {
        !self.has_no_events() || self.actions.iter().any(|a| !a.is_end_button())
    }

    fn has_no_events(&self) -> bool {
        self.attacks.is_empty()
            && self.damage.is_empty()
            && self.armor_destroyed.is_empty()
            && self.deaths.is_empty()
            && self.fame.is_empty()
            && self.spells.is_empty()
            && self.fatigue.is_empty()
            && self.disengagement.is_empty()
    }
}

/// One resolved fight at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combat {
    pub location: String,
    /// Announced rosters in ascending group number; unannounced numbers are
    /// not padded.
    pub groups: Vec<Vec<String>>,
    /// First member of the first group.
    pub character: Option<String>,
    /// Members of every group after the first.
    pub monsters: Vec<String>,
    /// Victims of `was killed` lines, for skull markers.
    pub killed: Vec<String>,
    pub rounds: Vec<CombatRound>,
    /// Closed without a terminating line.
    pub unterminated: bool,
}

impl Combat {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            groups: Vec::new(),
            character: None,
            monsters: Vec::new(),
            killed: Vec::new(),
            rounds: Vec::new(),
            unterminated: false,
        }
    }

    pub fn is_meaningful(&self) -> bool {
        self.rounds.iter().any(CombatRound::is_meaningful)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterSpawn {
    pub monster: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub engine: Option<String>,
    pub text: String,
}

/// Everything that happened on one in-game day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub month: u32,
    pub day: u32,
    pub monster_roll: Option<u8>,
    pub turns: Vec<CharacterTurn>,
    pub combats: Vec<Combat>,
    pub spawns: Vec<MonsterSpawn>,
    pub messages: Vec<SystemMessage>,
}

impl DayRecord {
    pub fn new(key: DayKey) -> Self {
        Self {
            month: key.month,
            day: key.day,
            monster_roll: None,
            turns: Vec::new(),
            combats: Vec::new(),
            spawns: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn key(&self) -> DayKey {
        DayKey::new(self.month, self.day)
    }

    pub fn meaningful_combats(&self) -> impl Iterator<Item = &Combat> {
        self.combats.iter().filter(|c| c.is_meaningful())
    }
}

/// Day-indexed session timeline. Serializes as an ordered array of days.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<DayRecord>", into = "Vec<DayRecord>")]
pub struct SessionTimeline {
    days: BTreeMap<DayKey, DayRecord>,
}

impl SessionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `key`, created empty on first use.
    pub fn day_mut(&mut self, key: DayKey) -> &mut DayRecord {
        self.days.entry(key).or_insert_with(|| DayRecord::new(key))
    }

    pub fn day(&self, key: DayKey) -> Option<&DayRecord> {
        self.days.get(&key)
    }

    pub fn days(&self) -> impl Iterator<Item = &DayRecord> {
        self.days.values()
    }

    pub fn days_mut(&mut self) -> impl Iterator<Item = &mut DayRecord> {
        self.days.values_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = DayKey> + '_ {
        self.days.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn into_days(self) -> Vec<DayRecord> {
        self.days.into_values().collect()
    }
}

impl From<Vec<DayRecord>> for SessionTimeline {
    fn from(records: Vec<DayRecord>) -> Self {
        let mut days = BTreeMap::new();
        for record in records {
            days.insert(record.key(), record);
        }
        Self { days }
    }
}

impl From<SessionTimeline> for Vec<DayRecord> {
    fn from(timeline: SessionTimeline) -> Self {
        timeline.into_days()
    }
}

/// An image-backed entry (inventory item, hireling, kill).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetItem {
    pub name: String,
    pub asset: String,
}

/// One row of a character's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterLogEvent {
    pub month: u32,
    pub day: u32,
    pub monster_roll: Option<u8>,
    pub action: String,
    pub summary: String,
    pub kills: Vec<AssetItem>,
}

/// Parsed contents of one character's export page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharacterLogPage {
    pub character: String,
    pub player: String,
    /// Human-readable elapsed game length, e.g. `1 month, 13 days`.
    pub game_length: String,
    pub game_days: Option<u32>,
    pub portrait: Option<String>,
    pub chit: Option<String>,
    /// Only `Fame`, `Notoriety` and `Curses`.
    pub stats: BTreeMap<String, String>,
    pub active_inventory: Vec<AssetItem>,
    pub inactive_inventory: Vec<AssetItem>,
    pub hirelings: Vec<AssetItem>,
    pub events: Vec<CharacterLogEvent>,
}

/// A document of a session that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document: String,
    pub error: String,
}

/// Everything reconstructed from one session export.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionReport {
    pub timeline: SessionTimeline,
    pub characters: Vec<CharacterLogPage>,
    pub failures: Vec<DocumentFailure>,
}
