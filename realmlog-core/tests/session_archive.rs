use realmlog_core::models::ActionKind;
use realmlog_core::{
    CollectingSink, DayKey, DiagnosticKind, ParserConfig, RealmlogError, parse_session_archive,
};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

const TURN_LOG: &str = r#"<html><head><title>Game Log</title></head><body>
<font color="blue">Month 1, Day 1</font><br>
RealmSpeak - Monster die roll is 3.<br>
Amazon - Moved to Borderland 4<br>
Amazon - Hides: Succeeded<br>
Wizard - Moved to Cavern 2<br>
Cannot perform action M-CV3<br>
RealmBattle - Battle resolving at Borderland 4<br>
RealmBattle - GROUP 1<br>
Amazon - Attacks<br>
RealmBattle - GROUP 2<br>
RealmBattle - Giant<br>
Giant hits Amazon<br>
Giant was killed!<br>
Combat has ended.<br>
Month 1, Day 2<br>
RealmSpeak - Heavy Troll spawned at Cavern 2<br>
Month 1, Day 3<br>
Wizard - Rests<br>
RealmBattle - Battle resolving at Cavern 2<br>
Heavy Troll misses Wizard<br>
</body></html>"#;

const DETAIL_LOG: &str = "Month 1, Day 1\n\
RealmBattle - Battle resolving at Borderland 4\n\
Round 1 - Encounter\n\
Amazon - Alerts Short Sword\n\
Round 2 - Melee\n\
Giant hits Amazon\n\
Giant was killed!\n\
Combat has ended.\n\
Month 1, Day 4\n\
RealmSpeak - Game over\n";

const AMAZON_PAGE: &str = r#"<html><head><title>Amazon - Month 1, Day 4</title></head><body>
<h2>Amazon (Alice)</h2>
<table><tr><td>Fame:</td><td>10</td></tr></table>
<table>
<tr><th>Month</th><th>Day</th><th>Monster Roll</th><th>Actions</th><th>Summary</th><th>Kills</th></tr>
<tr><td>1</td><td>1</td><td><img src="dice/white3.gif"></td><td>M-BL4,H</td><td>Killed a giant</td><td><img src="monsters/giant.gif" alt="Giant"></td></tr>
</table>
</body></html>"#;

fn write_archive(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (entry, content) in entries {
        writer.start_file(*entry, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn full_session(dir: &Path) -> PathBuf {
    write_archive(
        dir,
        "session.zip",
        &[
            ("export/game_log.html", TURN_LOG.as_bytes()),
            ("export/full_detail.txt", DETAIL_LOG.as_bytes()),
            ("export/Amazon.html", AMAZON_PAGE.as_bytes()),
            ("export/Wizard.html", b"<html><h2>Wizard (Bob)</h2></html>"),
        ],
    )
}

#[test]
fn test_full_session_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = full_session(dir.path());
    let sink = CollectingSink::new();
    let report = parse_session_archive(&path, &ParserConfig::default(), &sink).unwrap();

    assert!(report.failures.is_empty());
    let keys: Vec<DayKey> = report.timeline.keys().collect();
    assert_eq!(
        keys,
        vec![
            DayKey::new(1, 1),
            DayKey::new(1, 2),
            DayKey::new(1, 3),
            DayKey::new(1, 4)
        ]
    );

    let first = report.timeline.day(DayKey::new(1, 1)).unwrap();
    assert_eq!(first.monster_roll, Some(3));
    assert_eq!(first.turns.len(), 2);

    let amazon = &first.turns[0];
    assert_eq!(amazon.character, "Amazon");
    assert_eq!(amazon.player, "Alice");
    assert_eq!(amazon.end_location, "Borderland 4");
    assert_eq!(amazon.actions[1].action, "Hides");
    assert_eq!(amazon.actions[1].result, "Succeeded");

    let wizard = &first.turns[1];
    assert_eq!(wizard.player, "Bob");
    assert!(wizard.actions[1].blocked);
    assert_eq!(wizard.actions[1].kind, ActionKind::Move);

    // the detail log's combat replaces the turn log's single-round version
    assert_eq!(first.combats.len(), 1);
    let combat = &first.combats[0];
    assert_eq!(combat.rounds.len(), 2);
    assert_eq!(combat.rounds[0].phase.as_deref(), Some("Encounter"));
    assert_eq!(combat.killed, vec!["Giant".to_string()]);

    let second = report.timeline.day(DayKey::new(1, 2)).unwrap();
    assert_eq!(second.spawns[0].monster, "Heavy Troll");

    let fourth = report.timeline.day(DayKey::new(1, 4)).unwrap();
    assert_eq!(fourth.messages[0].text, "Game over");

    assert_eq!(report.characters.len(), 2);
    let page = &report.characters[0];
    assert_eq!(page.character, "Amazon");
    assert_eq!(page.game_length, "3 days");
    assert_eq!(page.events[0].monster_roll, Some(3));
    assert_eq!(page.events[0].kills[0].name, "Giant");
}

#[test]
fn test_truncated_combat_survives() {
    let dir = tempfile::tempdir().unwrap();
    let path = full_session(dir.path());
    let sink = CollectingSink::new();
    let report = parse_session_archive(&path, &ParserConfig::default(), &sink).unwrap();

    let third = report.timeline.day(DayKey::new(1, 3)).unwrap();
    assert_eq!(third.turns[0].character, "Wizard");
    assert_eq!(third.combats.len(), 1);
    assert!(third.combats[0].unterminated);
    assert_eq!(
        third.combats[0].rounds[0].attacks,
        vec!["Heavy Troll misses Wizard".to_string()]
    );
    assert!(sink.count(DiagnosticKind::UnterminatedCombat) >= 1);
}

#[test]
fn test_round_numbers_contiguous_and_keys_unique() {
    let dir = tempfile::tempdir().unwrap();
    let path = full_session(dir.path());
    let report =
        parse_session_archive(&path, &ParserConfig::default(), &CollectingSink::new()).unwrap();

    let mut seen = HashSet::new();
    for record in report.timeline.days() {
        assert!(seen.insert(record.key()));
        for combat in &record.combats {
            let numbers: Vec<u32> = combat.rounds.iter().map(|r| r.number).collect();
            let expected: Vec<u32> = (1..=combat.rounds.len() as u32).collect();
            assert_eq!(numbers, expected);
        }
    }
}

#[test]
fn test_parsing_twice_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = full_session(dir.path());
    let config = ParserConfig::default();

    let first = parse_session_archive(&path, &config, &CollectingSink::new()).unwrap();
    let second = parse_session_archive(&path, &config, &CollectingSink::new()).unwrap();
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[test]
fn test_undecodable_page_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        "broken.zip",
        &[
            ("game_log.html", TURN_LOG.as_bytes()),
            ("Ghost.html", b"\x00\x00\x00\x00"),
            ("Amazon.html", AMAZON_PAGE.as_bytes()),
        ],
    );
    let sink = CollectingSink::new();
    let report = parse_session_archive(&path, &ParserConfig::default(), &sink).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].document, "Ghost.html");
    assert_eq!(report.characters.len(), 1);
    assert_eq!(report.timeline.len(), 3);
    assert_eq!(sink.count(DiagnosticKind::DocumentFailed), 1);
}

#[test]
fn test_missing_archive_is_io_error() {
    let err = parse_session_archive(
        Path::new("/definitely/not/here.zip"),
        &ParserConfig::default(),
        &CollectingSink::new(),
    )
    .unwrap_err();
    assert!(matches!(err, RealmlogError::Io(_)));
}
