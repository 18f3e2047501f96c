//! Verse of the day
//!
//! A sequential verse pointer that moves forward once per calendar day and
//! wraps around after the last verse of the corpus.

use crate::clock::{Clock, system_clock};
use crate::corpus::{Corpus, VerseData};
use crate::error::{ReaderError, ReaderResult};
use crate::storage::KeyValueStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

pub const VERSE_NUMBER_KEY: &str = "currentVerseNumber";
pub const LAST_UPDATE_KEY: &str = "lastVerseUpdate";

#[derive(Debug, Clone, PartialEq)]
pub struct DailyVerse {
    /// 1-based position across the whole corpus
    pub number: u32,
    pub verse: VerseData,
}

pub struct DailyVerseTracker {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl DailyVerseTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, system_clock())
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// The stored verse number, without advancing it
    pub fn current_number(&self) -> u32 {
        self.stored_number().unwrap_or(1)
    }

    fn stored_number(&self) -> Option<u32> {
        match self.store.get(VERSE_NUMBER_KEY) {
            Ok(raw) => raw
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .filter(|n| *n > 0),
            Err(e) => {
                warn!(error = %e, "error reading daily verse number");
                None
            }
        }
    }

    fn last_update(&self) -> Option<NaiveDate> {
        match self.store.get(LAST_UPDATE_KEY) {
            Ok(raw) => raw.and_then(|raw| raw.trim().parse().ok()),
            Err(e) => {
                warn!(error = %e, "error reading daily verse date");
                None
            }
        }
    }

    /// Move to the next verse if today has not been counted yet
    ///
    /// The first ever query starts at verse 1. Numbers beyond `total` wrap
    /// back to 1.
    pub fn advance_for_today(&self, total: u32) -> u32 {
        let today = (self.clock)().date_naive();
        let stored = self.stored_number();
        let last = self.last_update();

        let number = match (stored, last) {
            (Some(n), Some(day)) if day == today => n,
            (Some(n), Some(_)) => n + 1,
            _ => stored.unwrap_or(1),
        };
        let number = if total == 0 || number > total { 1 } else { number };

        if stored != Some(number) || last != Some(today) {
            debug!(number, %today, "daily verse updated");
            self.save(number, today);
        }
        number
    }

    fn save(&self, number: u32, today: NaiveDate) {
        let result = self
            .store
            .set(VERSE_NUMBER_KEY, &number.to_string())
            .and_then(|_| self.store.set(LAST_UPDATE_KEY, &today.to_string()));
        if let Err(e) = result {
            warn!(error = %e, "error saving daily verse");
        }
    }

    /// Today's verse from `corpus`
    pub fn todays_verse(&self, corpus: &Corpus) -> ReaderResult<DailyVerse> {
        let number = self.advance_for_today(corpus.total_verse_count());
        let verse = corpus
            .verse_by_sequential_index(number as usize)
            .ok_or_else(|| ReaderError::Corpus(format!("no verse at position {}", number)))?;
        Ok(DailyVerse { number, verse })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::{Duration, Local, TimeZone};

    fn setup() -> (DailyVerseTracker, ManualClock, Arc<MemoryStore>) {
        let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 1, 15, 7, 30, 0).unwrap());
        let store = Arc::new(MemoryStore::new());
        (
            DailyVerseTracker::with_clock(store.clone(), clock.clock()),
            clock,
            store,
        )
    }

    #[test]
    fn test_first_day_starts_at_one() {
        let (tracker, _, store) = setup();
        assert_eq!(tracker.advance_for_today(22), 1);
        assert_eq!(store.get(VERSE_NUMBER_KEY).unwrap().as_deref(), Some("1"));
        assert_eq!(
            store.get(LAST_UPDATE_KEY).unwrap().as_deref(),
            Some("2024-01-15")
        );
    }

    #[test]
    fn test_advances_once_per_day() {
        let (tracker, clock, _) = setup();
        assert_eq!(tracker.advance_for_today(22), 1);
        clock.advance(Duration::hours(10));
        assert_eq!(tracker.advance_for_today(22), 1);

        clock.advance(Duration::days(1));
        assert_eq!(tracker.advance_for_today(22), 2);
        assert_eq!(tracker.advance_for_today(22), 2);

        // Several missed days still move by one
        clock.advance(Duration::days(5));
        assert_eq!(tracker.advance_for_today(22), 3);
        assert_eq!(tracker.current_number(), 3);
    }

    #[test]
    fn test_wraps_after_last_verse() {
        let (tracker, _, store) = setup();
        store.set(VERSE_NUMBER_KEY, "22").unwrap();
        store.set(LAST_UPDATE_KEY, "2024-01-14").unwrap();
        assert_eq!(tracker.advance_for_today(22), 1);
    }

    #[test]
    fn test_garbage_values_reset() {
        let (tracker, _, store) = setup();
        store.set(VERSE_NUMBER_KEY, "abc").unwrap();
        store.set(LAST_UPDATE_KEY, "Mon Jan 15 2024").unwrap();
        assert_eq!(tracker.advance_for_today(22), 1);
    }

    #[test]
    fn test_todays_verse_from_corpus() {
        let (tracker, clock, _) = setup();
        let corpus = Corpus::sample().unwrap();

        let today = tracker.todays_verse(&corpus).unwrap();
        assert_eq!(today.number, 1);
        assert_eq!(today.verse.chapter_number, 1);
        assert_eq!(today.verse.verse_index, 1);

        for _ in 0..7 {
            clock.advance(Duration::days(1));
            tracker.advance_for_today(corpus.total_verse_count());
        }
        let today = tracker.todays_verse(&corpus).unwrap();
        assert_eq!(today.number, 8);
        assert_eq!(today.verse.chapter_number, 112);
        assert_eq!(today.verse.verse_index, 1);
    }
}
