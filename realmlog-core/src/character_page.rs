//! Per-character export page parsing.
//!
//! A character page carries a `Name (Player)` heading, a `Month m, Day d`
//! title, portrait and chit images, a small stats table, the inventory
//! columns and a day-by-day event table. Every section is optional; a
//! missing one is reported to the sink and left empty.

use crate::config::ParserConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::error::Result;
use crate::inventory::{InventorySection, images_in};
use crate::lines::{element_text, row_cells, rows_after};
use crate::models::{CharacterLogEvent, CharacterLogPage};
use crate::turns::split_performer;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

/// Stat rows kept from the stats table.
pub const STAT_KEYS: &[&str] = &["Fame", "Notoriety", "Curses"];

lazy_static! {
    static ref HEADING: Selector = Selector::parse("h1, h2, h3, h4").unwrap();
    static ref TITLE: Selector = Selector::parse("title").unwrap();
    static ref ROW: Selector = Selector::parse("tr").unwrap();
    static ref IMG: Selector = Selector::parse("img").unwrap();
    static ref GAME_DATE: Regex = Regex::new(r"Month (\d+), Day (\d+)").unwrap();
    static ref DIE_FACE: Regex = Regex::new(r"(?i)([1-6])\D*\.(?:gif|png|jpe?g|bmp)$").unwrap();
}

/// Event table columns, by position.
#[derive(Debug, Clone, Copy)]
struct EventColumns {
    month: usize,
    day: usize,
    monster_roll: usize,
    action: usize,
    summary: usize,
    kills: usize,
}

impl Default for EventColumns {
    fn default() -> Self {
        Self {
            month: 0,
            day: 1,
            monster_roll: 2,
            action: 3,
            summary: 4,
            kills: 5,
        }
    }
}

impl EventColumns {
    /// Columns from a header row, or `None` if it is not the event header.
    fn from_header(cells: &[ElementRef<'_>]) -> Option<Self> {
        let headers: Vec<String> = cells
            .iter()
            .map(|cell| element_text(*cell).to_lowercase())
            .collect();
        let month = headers.iter().position(|h| h == "month")?;
        let day = headers.iter().position(|h| h == "day")?;

        let mut columns = Self {
            month,
            day,
            ..Self::default()
        };
        for (idx, header) in headers.iter().enumerate() {
            if header.contains("monster") || header.contains("roll") {
                columns.monster_roll = idx;
            } else if header.contains("kill") {
                columns.kills = idx;
            } else if header.contains("summary") || header.contains("result") {
                columns.summary = idx;
            } else if header.contains("action") {
                columns.action = idx;
            }
        }
        Some(columns)
    }
}

/// Parse one character's export page.
///
/// Only configuration errors fail; absent sections degrade to empty values.
pub fn parse_character_page(
    markup: &str,
    config: &ParserConfig,
    sink: &dyn DiagnosticSink,
) -> Result<CharacterLogPage> {
    let document = Html::parse_document(markup);
    let mut page = CharacterLogPage::default();

    match character_heading(&document) {
        Some(heading) => {
            let (character, player) = split_performer(&heading);
            page.character = character;
            page.player = player;
        }
        None => sink.record(Diagnostic::new(
            DiagnosticKind::MissingExpectedSection,
            "No character heading",
        )),
    }

    if let Some((month, day)) = game_date(&document) {
        let (length, days) = game_length(month, day, config.days_per_month);
        page.game_length = length;
        page.game_days = Some(days);
    }

    page.portrait = find_image(&document, "portrait");
    page.chit = find_image(&document, "chit");

    page.stats = parse_stats(&document);
    if page.stats.is_empty() {
        sink.record(Diagnostic::new(
            DiagnosticKind::MissingExpectedSection,
            "No stats table",
        ));
    }

    let inventory = InventorySection::parse(&document, config, sink)?;
    page.active_inventory = inventory.active;
    page.inactive_inventory = inventory.inactive;
    page.hirelings = inventory.hirelings;

    page.events = parse_events(&document, sink);

    tracing::debug!(
        character = %page.character,
        events = page.events.len(),
        "Parsed character page"
    );
    Ok(page)
}

/// First heading that is not a date.
fn character_heading(document: &Html) -> Option<String> {
    document
        .select(&HEADING)
        .map(element_text)
        .find(|text| !text.is_empty() && !GAME_DATE.is_match(text))
}

/// `Month m, Day d` from the title, else from any heading.
fn game_date(document: &Html) -> Option<(u32, u32)> {
    document
        .select(&TITLE)
        .chain(document.select(&HEADING))
        .map(element_text)
        .find_map(|text| {
            let caps = GAME_DATE.captures(&text)?;
            Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
        })
}

/// Elapsed time at `Month m, Day d`.
///
/// Month 1, Day 1 is the first day of play, so neither counts as elapsed:
/// `Month 2, Day 14` is one month and 13 days in.
pub fn game_length(month: u32, day: u32, days_per_month: u32) -> (String, u32) {
    let months = month.saturating_sub(1);
    let days = day.saturating_sub(1);
    let total = months.saturating_mul(days_per_month).saturating_add(days);

    let mut parts = Vec::new();
    if months > 0 {
        parts.push(plural(months, "month"));
    }
    if days > 0 || months == 0 {
        parts.push(plural(days, "day"));
    }
    (parts.join(", "), total)
}

fn plural(count: u32, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

fn find_image(document: &Html, needle: &str) -> Option<String> {
    document.select(&IMG).find_map(|image| {
        let attrs = image.value();
        let src = attrs.attr("src")?;
        let alt = attrs.attr("alt").unwrap_or_default();
        (src.to_lowercase().contains(needle) || alt.to_lowercase().contains(needle))
            .then(|| src.to_string())
    })
}

fn parse_stats(document: &Html) -> BTreeMap<String, String> {
    let mut stats = BTreeMap::new();
    for row in document.select(&ROW) {
        let cells = row_cells(row);
        if cells.len() < 2 {
            continue;
        }
        let key = element_text(cells[0]);
        let key = key.trim_end_matches(':').trim();
        if let Some(stat) = STAT_KEYS.iter().find(|stat| stat.eq_ignore_ascii_case(key)) {
            stats.insert(stat.to_string(), element_text(cells[1]));
        }
    }
    stats
}

fn parse_events(document: &Html, sink: &dyn DiagnosticSink) -> Vec<CharacterLogEvent> {
    let header = document
        .select(&ROW)
        .find_map(|row| EventColumns::from_header(&row_cells(row)).map(|columns| (row, columns)));
    let Some((header_row, columns)) = header else {
        sink.record(Diagnostic::new(
            DiagnosticKind::MissingExpectedSection,
            "No event log table",
        ));
        return Vec::new();
    };

    rows_after(header_row)
        .into_iter()
        .filter_map(|row| parse_event_row(&row_cells(row), &columns))
        .collect()
}

fn parse_event_row(cells: &[ElementRef<'_>], columns: &EventColumns) -> Option<CharacterLogEvent> {
    let text_at = |idx: usize| cells.get(idx).map(|cell| element_text(*cell)).unwrap_or_default();

    // rows without a numeric date are separators or repeated headers
    let month = text_at(columns.month).parse().ok()?;
    let day = text_at(columns.day).parse().ok()?;

    let monster_roll = cells.get(columns.monster_roll).and_then(|cell| die_face(*cell));
    let kills = cells
        .get(columns.kills)
        .map(|cell| images_in(*cell))
        .unwrap_or_default();

    Some(CharacterLogEvent {
        month,
        day,
        monster_roll,
        action: text_at(columns.action),
        summary: text_at(columns.summary),
        kills,
    })
}

/// Die value from a die-face image such as `dice/red3.gif`, else from the
/// cell text.
fn die_face(cell: ElementRef<'_>) -> Option<u8> {
    let from_image = cell.select(&IMG).find_map(|image| {
        let src = image.value().attr("src")?;
        DIE_FACE.captures(src)?[1].parse().ok()
    });
    from_image.or_else(|| {
        element_text(cell)
            .parse()
            .ok()
            .filter(|value| (1..=6).contains(value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    const PAGE: &str = r#"<html>
<head><title>Amazon - Month 2, Day 14</title></head>
<body>
<h2>Amazon (Bob)</h2>
<img src="images/portrait_amazon.png" alt="Amazon">
<img src="images/chits/amazon_chit.gif" alt="chit">
<table>
  <tr><td>Fame:</td><td>12</td></tr>
  <tr><td>Notoriety:</td><td>4</td></tr>
  <tr><td>Gold:</td><td>30</td></tr>
  <tr><td>Curses:</td><td>None</td></tr>
</table>
<table>
  <tr><th>Active Inventory</th><th>Inactive Inventory</th><th>Hirelings</th></tr>
  <tr><td><img src="items/sword.gif" alt="Short Sword"></td><td></td><td></td></tr>
</table>
<table>
  <tr><th>Month</th><th>Day</th><th>Monster Roll</th><th>Actions</th><th>Summary</th><th>Kills</th></tr>
  <tr><td>1</td><td>1</td><td><img src="dice/red4.gif"></td><td>M-BL4,H</td><td>Moved and hid</td><td></td></tr>
  <tr><td>1</td><td>2</td><td>2</td><td>S</td><td>Fought a goblin</td><td><img src="monsters/goblin.gif" alt="Goblin"></td></tr>
  <tr><td colspan="6">---</td></tr>
</table>
</body></html>"#;

    #[test]
    fn test_full_page() {
        let sink = CollectingSink::new();
        let page = parse_character_page(PAGE, &ParserConfig::default(), &sink).unwrap();

        assert_eq!(page.character, "Amazon");
        assert_eq!(page.player, "Bob");
        assert_eq!(page.game_length, "1 month, 13 days");
        assert_eq!(page.game_days, Some(41));
        assert_eq!(page.portrait.as_deref(), Some("images/portrait_amazon.png"));
        assert_eq!(page.chit.as_deref(), Some("images/chits/amazon_chit.gif"));

        assert_eq!(page.stats.len(), 3);
        assert_eq!(page.stats["Fame"], "12");
        assert_eq!(page.stats["Curses"], "None");
        assert!(!page.stats.contains_key("Gold"));

        assert_eq!(page.active_inventory.len(), 1);
        assert_eq!(page.active_inventory[0].name, "Short Sword");

        assert_eq!(page.events.len(), 2);
        assert_eq!(page.events[0].monster_roll, Some(4));
        assert_eq!(page.events[0].action, "M-BL4,H");
        assert_eq!(page.events[1].monster_roll, Some(2));
        assert_eq!(page.events[1].summary, "Fought a goblin");
        assert_eq!(page.events[1].kills[0].name, "Goblin");

        assert_eq!(sink.count(DiagnosticKind::MissingExpectedSection), 0);
    }

    #[test]
    fn test_heading_without_player() {
        let sink = CollectingSink::new();
        let page = parse_character_page(
            "<html><body><h1>Month 1, Day 1</h1><h2>Wizard</h2></body></html>",
            &ParserConfig::default(),
            &sink,
        )
        .unwrap();
        assert_eq!(page.character, "Wizard");
        assert_eq!(page.player, "");
        assert_eq!(page.game_length, "0 days");
        assert_eq!(page.game_days, Some(0));
    }

    #[test]
    fn test_bare_page_degrades_gracefully() {
        let sink = CollectingSink::new();
        let page =
            parse_character_page("<p>nothing</p>", &ParserConfig::default(), &sink).unwrap();
        assert!(page.character.is_empty());
        assert!(page.stats.is_empty());
        assert!(page.events.is_empty());
        assert!(page.active_inventory.is_empty());
        // heading, stats, inventory, events
        assert_eq!(sink.count(DiagnosticKind::MissingExpectedSection), 4);
    }

    #[test]
    fn test_game_length() {
        assert_eq!(game_length(1, 1, 28), ("0 days".to_string(), 0));
        assert_eq!(game_length(1, 2, 28), ("1 day".to_string(), 1));
        assert_eq!(game_length(2, 1, 28), ("1 month".to_string(), 28));
        assert_eq!(game_length(3, 5, 28), ("2 months, 4 days".to_string(), 60));
        assert_eq!(
            game_length(200_000_000, 1, 28),
            ("199999999 months".to_string(), u32::MAX)
        );
    }

    #[test]
    fn test_huge_title_date_saturates() {
        let page = parse_character_page(
            "<html><head><title>Wizard - Month 200000000, Day 9</title></head>\
             <body><h2>Wizard</h2></body></html>",
            &ParserConfig::default(),
            &CollectingSink::new(),
        )
        .unwrap();
        assert_eq!(page.game_days, Some(u32::MAX));
        assert_eq!(page.game_length, "199999999 months, 8 days");
    }
}
