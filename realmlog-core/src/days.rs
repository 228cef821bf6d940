//! Day boundary tracking.

use crate::models::{DayKey, MonsterSpawn, SystemMessage};
use std::collections::HashMap;

/// A log line tagged with its position and the day it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLine<'a> {
    /// 1-based position in the document.
    pub number: usize,
    pub day: DayKey,
    pub text: &'a str,
}

/// Day-level facts that are not turns or combats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub key: DayKey,
    pub monster_roll: Option<u8>,
    pub spawns: Vec<MonsterSpawn>,
    pub messages: Vec<SystemMessage>,
}

impl DaySummary {
    fn new(key: DayKey) -> Self {
        Self {
            key,
            monster_roll: None,
            spawns: Vec::new(),
            messages: Vec::new(),
        }
    }
}

/// Tracks the current in-game day and the days seen so far.
///
/// Lines before the first `Month m, Day d` marker belong to Month 1, Day 1.
#[derive(Debug, Default)]
pub struct DayTracker {
    current: DayKey,
    days: Vec<DaySummary>,
    index: HashMap<DayKey, usize>,
}

impl DayTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> DayKey {
        self.current
    }

    pub fn tag<'a>(&self, number: usize, text: &'a str) -> LogLine<'a> {
        LogLine {
            number,
            day: self.current,
            text,
        }
    }

    /// Move to `next`. `flush` runs first with the day being closed so that
    /// day-scoped state is finalized before anything is tagged with `next`.
    pub fn advance<F>(&mut self, next: DayKey, flush: F)
    where
        F: FnOnce(DayKey),
    {
        flush(self.current);
        self.current = next;
        self.summary_mut();
    }

    /// Summary of the current day, created on first use. A repeated marker
    /// for a day already seen reuses its summary.
    pub fn summary_mut(&mut self) -> &mut DaySummary {
        let key = self.current;
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.days.push(DaySummary::new(key));
                self.index.insert(key, self.days.len() - 1);
                self.days.len() - 1
            }
        };
        &mut self.days[idx]
    }

    pub fn record_monster_roll(&mut self, value: u8) {
        self.summary_mut().monster_roll = Some(value);
    }

    pub fn record_spawn(&mut self, monster: String, location: String) {
        self.summary_mut()
            .spawns
            .push(MonsterSpawn { monster, location });
    }

    pub fn record_message(&mut self, engine: Option<String>, text: String) {
        self.summary_mut()
            .messages
            .push(SystemMessage { engine, text });
    }

    /// Days in the order their markers were first seen.
    pub fn finish(self) -> Vec<DaySummary> {
        self.days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_day_before_first_marker() {
        let tracker = DayTracker::new();
        let line = tracker.tag(1, "Tom - Hides");
        assert_eq!(line.day, DayKey::new(1, 1));
    }

    #[test]
    fn test_advance_flushes_closing_day() {
        let mut tracker = DayTracker::new();
        let mut flushed = Vec::new();
        tracker.advance(DayKey::new(1, 1), |day| flushed.push(day));
        tracker.advance(DayKey::new(1, 2), |day| flushed.push(day));

        assert_eq!(flushed, vec![DayKey::new(1, 1), DayKey::new(1, 1)]);
        assert_eq!(tracker.current(), DayKey::new(1, 2));
        assert_eq!(tracker.tag(5, "x").day, DayKey::new(1, 2));
    }

    #[test]
    fn test_empty_days_are_kept() {
        let mut tracker = DayTracker::new();
        tracker.advance(DayKey::new(1, 1), |_| {});
        tracker.advance(DayKey::new(1, 2), |_| {});
        let days = tracker.finish();
        assert_eq!(days.len(), 2);
        assert!(days[0].messages.is_empty());
    }

    #[test]
    fn test_repeated_marker_reuses_summary() {
        let mut tracker = DayTracker::new();
        tracker.advance(DayKey::new(1, 1), |_| {});
        tracker.record_monster_roll(3);
        tracker.advance(DayKey::new(1, 2), |_| {});
        tracker.advance(DayKey::new(1, 1), |_| {});
        tracker.record_spawn("Giant".to_string(), "Borderland 4".to_string());

        let days = tracker.finish();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].monster_roll, Some(3));
        assert_eq!(days[0].spawns.len(), 1);
    }
}
