//! Line classification.
//!
//! Every normalized log line becomes exactly one [`LineToken`]. All knowledge
//! of the export's textual conventions lives here; the day tracker, combat
//! machine and turn aggregator only ever look at tokens.

use crate::config::ParserConfig;
use crate::models::{ActionKind, END_BUTTON_TEXT};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DAY_MARKER: Regex = Regex::new(r"^Month (\d+), Day (\d+)$").unwrap();
    static ref BATTLE_START: Regex = Regex::new(r"^Battle resolving at (.+?)[.:]?$").unwrap();
    static ref GROUP_MARKER: Regex = Regex::new(r"^GROUP (\d+)$").unwrap();
    static ref ROUND_MARKER: Regex = Regex::new(
        r"^[=*\-\s]*Round (\d+)(?:\s*[-:]\s*([A-Za-z][A-Za-z ]*?)|\s*\(([^)]+)\))?[=*\-\s]*$"
    )
    .unwrap();
    static ref BLOCKED: Regex =
        Regex::new(r"^(?:(.+?) - )?Cannot perform action (\S+?)\.?$").unwrap();
    static ref MONSTER_ROLL: Regex = Regex::new(
        r"(?i)^(?:the )?monster (?:die )?roll(?:ed)?(?: is| was|:| =)?\s*([1-6])\b"
    )
    .unwrap();
    static ref SPAWN: Regex = Regex::new(
        r"^(?:An? |The )?(.+?) (?:was |is |has )?(?:spawned|spawns|summoned|appears|appeared)(?: (?:at|in|into|to))? (.+?)\.?$"
    )
    .unwrap();
    static ref ACTION_CODE: Regex = Regex::new(r"^([A-Z]{1,2})(?:-[A-Za-z0-9]+|\d*)$").unwrap();
}

/// One classified log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineToken {
    /// `Month m, Day d`.
    DayMarker { month: u32, day: u32 },
    /// `<battle engine> - Battle resolving at <location>`.
    BattleStart { location: String },
    /// `<Engine> - GROUP n`.
    GroupMarker { group: u32 },
    /// `Combat has ended.` or an END-button press. `performer` is only set
    /// for a character's END-button press.
    CombatEnd {
        performer: Option<String>,
        end_button: bool,
    },
    /// Explicit round delimiter.
    RoundMarker { round: u32, phase: Option<String> },
    /// `Cannot perform action <code>`.
    Blocked {
        performer: Option<String>,
        code: String,
    },
    MonsterRoll { value: u8 },
    Spawn { monster: String, location: String },
    /// Engine-prefixed line that is none of the above.
    SystemMessage { engine: String, text: String },
    /// `<performer> - <text>`.
    CharacterAction { performer: String, text: String },
    /// Unprefixed text without a separator.
    Narrative { text: String },
    /// Engine prefix with nothing after it.
    Noise,
}

impl LineToken {
    /// The performer this line is attributed to, if any.
    pub fn performer(&self) -> Option<&str> {
        match self {
            LineToken::CharacterAction { performer, .. } => Some(performer),
            LineToken::SystemMessage { engine, .. } => Some(engine),
            LineToken::Blocked { performer, .. } | LineToken::CombatEnd { performer, .. } => {
                performer.as_deref()
            }
            _ => None,
        }
    }
}

/// Classifies lines against a configuration's engine names.
pub struct Tokenizer<'a> {
    config: &'a ParserConfig,
}

impl<'a> Tokenizer<'a> {
    pub fn new(config: &'a ParserConfig) -> Self {
        Self { config }
    }

    /// Split `<Engine> - body` into the engine and the body.
    fn split_engine<'l>(&self, line: &'l str) -> (Option<&'l str>, &'l str) {
        if self.config.is_engine(line.trim_end_matches(" -").trim_end_matches('-').trim()) {
            return (Some(line.trim_end_matches('-').trim()), "");
        }
        if let Some((left, right)) = line.split_once(" - ") {
            let left = left.trim();
            if self.config.is_engine(left) {
                return (Some(left), right.trim());
            }
        }
        (None, line)
    }

    pub fn classify(&self, line: &str) -> LineToken {
        let line = line.trim();
        let (engine, body) = self.split_engine(line);

        if body.is_empty() {
            return LineToken::Noise;
        }

        // a marker whose numbers do not fit falls through to the rules below
        if let Some(caps) = DAY_MARKER.captures(body) {
            if let (Ok(month), Ok(day)) = (caps[1].parse(), caps[2].parse()) {
                return LineToken::DayMarker { month, day };
            }
        }

        if engine == Some(self.config.battle_engine.as_str()) {
            if let Some(caps) = BATTLE_START.captures(body) {
                return LineToken::BattleStart {
                    location: caps[1].trim().to_string(),
                };
            }
        }

        if let Some(caps) = GROUP_MARKER.captures(body) {
            if let Ok(group) = caps[1].parse() {
                return LineToken::GroupMarker { group };
            }
        }

        // engines never own an end line; only a named character does
        if body == "Combat has ended." {
            return LineToken::CombatEnd {
                performer: None,
                end_button: false,
            };
        }

        if body.ends_with(END_BUTTON_TEXT) {
            let performer = body
                .split_once(" - ")
                .map(|(left, _)| left.trim().to_string())
                .filter(|p| !p.is_empty() && !self.config.is_engine(p));
            return LineToken::CombatEnd {
                performer,
                end_button: true,
            };
        }

        if let Some(caps) = ROUND_MARKER.captures(body) {
            if let Ok(round) = caps[1].parse() {
                let phase = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|p| !p.is_empty());
                return LineToken::RoundMarker { round, phase };
            }
        }

        if let Some(caps) = BLOCKED.captures(body) {
            let performer = caps
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .filter(|p| !self.config.is_engine(p));
            return LineToken::Blocked {
                performer,
                code: caps[2].to_string(),
            };
        }

        if let Some(caps) = MONSTER_ROLL.captures(body) {
            if let Ok(value) = caps[1].parse() {
                return LineToken::MonsterRoll { value };
            }
        }

        if engine.is_some() || !body.contains(" - ") {
            if let Some(caps) = SPAWN.captures(body) {
                return LineToken::Spawn {
                    monster: caps[1].trim().to_string(),
                    location: caps[2].trim().to_string(),
                };
            }
        }

        if let Some(engine) = engine {
            return LineToken::SystemMessage {
                engine: engine.to_string(),
                text: body.to_string(),
            };
        }

        if let Some((left, right)) = body.split_once(" - ") {
            let (left, right) = (left.trim(), right.trim());
            if !left.is_empty() && !right.is_empty() {
                return LineToken::CharacterAction {
                    performer: left.to_string(),
                    text: right.to_string(),
                };
            }
        }

        LineToken::Narrative {
            text: body.to_string(),
        }
    }
}

/// Decode an engine action code such as `M-CV2` (move to Cavern 2).
///
/// Letter prefixes: `M` move, `H` hide, `S` search, `T` trade, `R` rest,
/// `A` alert, `P` peer, `E` enchant, `F` follow, `FL` fly, `SP` spell,
/// `HR` hire.
pub fn action_kind_from_code(code: &str) -> Option<ActionKind> {
    let caps = ACTION_CODE.captures(code.trim())?;
    let kind = match &caps[1] {
        "M" => ActionKind::Move,
        "H" => ActionKind::Hide,
        "S" => ActionKind::Search,
        "T" => ActionKind::Trade,
        "R" => ActionKind::Rest,
        "A" => ActionKind::Alert,
        "P" => ActionKind::Peer,
        "E" => ActionKind::Enchant,
        "F" => ActionKind::Follow,
        "FL" => ActionKind::Fly,
        "SP" => ActionKind::Spell,
        "HR" => ActionKind::Hire,
        _ => return None,
    };
    Some(kind)
}

/// Infer the kind of a prose action from its leading verb, falling back to
/// the action-code convention.
pub fn action_kind_from_text(text: &str) -> Option<ActionKind> {
    let first = text.split_whitespace().next()?;
    let verb = first
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    let kind = match verb.as_str() {
        "move" | "moves" | "moved" | "moving" | "walks" | "walked" => ActionKind::Move,
        "hide" | "hides" | "hid" | "hidden" => ActionKind::Hide,
        "search" | "searches" | "searched" | "locate" | "loot" | "loots" | "looted" => {
            ActionKind::Search
        }
        "trade" | "trades" | "traded" | "buys" | "bought" | "sells" | "sold" => ActionKind::Trade,
        "rest" | "rests" | "rested" => ActionKind::Rest,
        "alert" | "alerts" | "alerted" => ActionKind::Alert,
        "peer" | "peers" | "peered" => ActionKind::Peer,
        "enchant" | "enchants" | "enchanted" => ActionKind::Enchant,
        "fly" | "flies" | "flew" => ActionKind::Fly,
        "follow" | "follows" | "followed" => ActionKind::Follow,
        "cast" | "casts" | "spell" | "prepares" => ActionKind::Spell,
        "hire" | "hires" | "hired" => ActionKind::Hire,
        _ => return action_kind_from_code(first),
    };
    Some(kind)
}
