//! Reading progress, sessions and bookmarks
//!
//! Everything is stored as JSON through the [`KeyValueStore`] port and read
//! back on every call, so the store itself holds no state beyond the session
//! in progress. Writes are last-write-wins; storage failures are logged and
//! otherwise ignored.

use crate::clock::{Clock, system_clock};
use crate::storage::KeyValueStore;
use crate::translation::VerseKey;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

pub const PROGRESS_KEY: &str = "quran_reading_progress";
pub const BOOKMARKS_KEY: &str = "quran_bookmarks";
pub const SESSION_KEY: &str = "current_reading_session";

/// Verse count of the complete text, used for completion percentages
pub const TOTAL_QURAN_VERSES: u32 = 6236;

const MAX_HISTORY: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub current_chapter: u32,
    pub current_verse: u32,
    pub last_read_at: DateTime<Utc>,
    pub total_verses_read: u32,
    pub completed_chapters: Vec<u32>,
    pub reading_history: Vec<ReadingSession>,
    pub daily_streak: u32,
    pub last_streak_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingSession {
    pub chapter_id: u32,
    pub chapter_name: String,
    pub verses_read: Vec<VerseKey>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub chapter_id: u32,
    pub verse_id: u32,
    pub chapter_name: String,
    pub verse_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingStats {
    pub total_verses_read: u32,
    pub completed_chapters: usize,
    pub daily_streak: u32,
    pub percentage_complete: f64,
    pub average_verses_per_day: f64,
    /// Minutes across recorded sessions
    pub total_reading_time: i64,
}

#[derive(Serialize, Deserialize)]
struct ProgressExport {
    progress: Option<ReadingProgress>,
    #[serde(default)]
    bookmarks: Option<Vec<Bookmark>>,
    #[serde(default)]
    exported_at: Option<DateTime<Utc>>,
}

/// Persisted reading position, streak, history and bookmarks
pub struct ReadingProgressStore {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
    total_verses: u32,
    session: Mutex<Option<ReadingSession>>,
}

impl ReadingProgressStore {
    /// Open the store, creating default progress and a fresh session
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_options(store, system_clock(), TOTAL_QURAN_VERSES)
    }

    pub fn with_options(store: Arc<dyn KeyValueStore>, clock: Clock, total_verses: u32) -> Self {
        let progress_store = Self {
            store,
            clock,
            total_verses: total_verses.max(1),
            session: Mutex::new(None),
        };
        progress_store.initialize_progress();
        progress_store.start_new_session();
        progress_store
    }

    fn now(&self) -> DateTime<Local> {
        (self.clock)()
    }

    fn session(&self) -> MutexGuard<'_, Option<ReadingSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "discarding unreadable stored value");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "error reading stored value");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(crate::error::ReaderError::from)
            .and_then(|raw| self.store.set(key, &raw));
        if let Err(e) = result {
            warn!(key, error = %e, "error saving value");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key, error = %e, "error removing value");
        }
    }

    fn initialize_progress(&self) {
        if self.get_progress().is_none() {
            let progress = ReadingProgress {
                current_chapter: 1,
                current_verse: 1,
                last_read_at: self.now().with_timezone(&Utc),
                total_verses_read: 0,
                completed_chapters: Vec::new(),
                reading_history: Vec::new(),
                daily_streak: 0,
                last_streak_date: None,
            };
            self.write(PROGRESS_KEY, &progress);
        }
    }

    pub fn get_progress(&self) -> Option<ReadingProgress> {
        self.read(PROGRESS_KEY)
    }

    /// Record the reader's position, updating streak and session counts
    pub fn update_reading_position(&self, chapter: u32, verse: u32) {
        let Some(mut progress) = self.get_progress() else {
            return;
        };
        let now = self.now();

        progress.current_chapter = chapter;
        progress.current_verse = verse;
        progress.last_read_at = now.with_timezone(&Utc);
        update_daily_streak(&mut progress, now.date_naive());

        {
            let mut session = self.session();
            if let (Some(session), Ok(key)) = (session.as_mut(), VerseKey::new(chapter, verse)) {
                if !session.verses_read.contains(&key) {
                    session.verses_read.push(key);
                    progress.total_verses_read += 1;
                }
            }
        }

        self.write(PROGRESS_KEY, &progress);
        self.save_current_session();
    }

    pub fn mark_chapter_completed(&self, chapter: u32) {
        let Some(mut progress) = self.get_progress() else {
            return;
        };
        if !progress.completed_chapters.contains(&chapter) {
            progress.completed_chapters.push(chapter);
            self.write(PROGRESS_KEY, &progress);
        }
    }

    pub fn get_reading_stats(&self) -> ReadingStats {
        let Some(progress) = self.get_progress() else {
            return ReadingStats {
                total_verses_read: 0,
                completed_chapters: 0,
                daily_streak: 0,
                percentage_complete: 0.0,
                average_verses_per_day: 0.0,
                total_reading_time: 0,
            };
        };

        let total_reading_time = progress
            .reading_history
            .iter()
            .map(|s| s.duration_minutes)
            .sum();
        let days_active = progress.reading_history.len().max(1) as f64;
        let average = f64::from(progress.total_verses_read) / days_active;

        ReadingStats {
            total_verses_read: progress.total_verses_read,
            completed_chapters: progress.completed_chapters.len(),
            daily_streak: progress.daily_streak,
            percentage_complete: f64::from(progress.total_verses_read)
                / f64::from(self.total_verses)
                * 100.0,
            average_verses_per_day: (average * 10.0).round() / 10.0,
            total_reading_time,
        }
    }

    pub fn start_new_session(&self) {
        let Some(progress) = self.get_progress() else {
            return;
        };
        *self.session() = Some(ReadingSession {
            chapter_id: progress.current_chapter,
            chapter_name: String::new(),
            verses_read: Vec::new(),
            start_time: self.now().with_timezone(&Utc),
            end_time: None,
            duration_minutes: 0,
        });
        self.save_current_session();
    }

    /// Close the running session; sessions over a minute go to history
    pub fn end_current_session(&self) -> Option<ReadingSession> {
        let mut session = self.session().take()?;
        let now = self.now().with_timezone(&Utc);

        session.end_time = Some(now);
        session.duration_minutes =
            ((now - session.start_time).num_seconds() as f64 / 60.0).round() as i64;

        if session.duration_minutes > 1 {
            if let Some(mut progress) = self.get_progress() {
                progress.reading_history.push(session.clone());
                if progress.reading_history.len() > MAX_HISTORY {
                    let excess = progress.reading_history.len() - MAX_HISTORY;
                    progress.reading_history.drain(..excess);
                }
                self.write(PROGRESS_KEY, &progress);
            }
        }

        self.remove(SESSION_KEY);
        Some(session)
    }

    pub fn current_session(&self) -> Option<ReadingSession> {
        self.session().clone()
    }

    fn save_current_session(&self) {
        if let Some(session) = self.session().as_ref() {
            self.write(SESSION_KEY, session);
        }
    }

    /// Newest sessions first
    pub fn recent_sessions(&self, limit: usize) -> Vec<ReadingSession> {
        let Some(mut progress) = self.get_progress() else {
            return Vec::new();
        };
        progress
            .reading_history
            .sort_by(|a, b| b.start_time.cmp(&a.start_time));
        progress.reading_history.truncate(limit);
        progress.reading_history
    }

    pub fn add_bookmark(
        &self,
        chapter: u32,
        verse: u32,
        chapter_name: &str,
        verse_text: &str,
        note: Option<&str>,
    ) -> Bookmark {
        let now = self.now().with_timezone(&Utc);
        let bookmark = Bookmark {
            id: format!("{}_{}_{}", chapter, verse, now.timestamp_millis()),
            chapter_id: chapter,
            verse_id: verse,
            chapter_name: chapter_name.to_string(),
            verse_text: verse_text.to_string(),
            note: note.map(str::to_string),
            created_at: now,
        };

        let mut bookmarks = self.get_bookmarks();
        bookmarks.push(bookmark.clone());
        self.write(BOOKMARKS_KEY, &bookmarks);
        bookmark
    }

    /// Remove the bookmark with `id`, returning whether one was removed
    pub fn remove_bookmark(&self, id: &str) -> bool {
        let mut bookmarks = self.get_bookmarks();
        let before = bookmarks.len();
        bookmarks.retain(|b| b.id != id);
        let removed = bookmarks.len() != before;
        self.write(BOOKMARKS_KEY, &bookmarks);
        removed
    }

    pub fn get_bookmarks(&self) -> Vec<Bookmark> {
        self.read(BOOKMARKS_KEY).unwrap_or_default()
    }

    /// Forget progress, bookmarks and the running session
    pub fn reset_progress(&self) {
        self.remove(PROGRESS_KEY);
        self.remove(BOOKMARKS_KEY);
        self.remove(SESSION_KEY);
        *self.session() = None;
        self.initialize_progress();
    }

    pub fn export_progress(&self) -> String {
        let export = ProgressExport {
            progress: self.get_progress(),
            bookmarks: Some(self.get_bookmarks()),
            exported_at: Some(self.now().with_timezone(&Utc)),
        };
        serde_json::to_string_pretty(&export).unwrap_or_else(|e| {
            warn!(error = %e, "error exporting progress");
            String::from("{}")
        })
    }

    /// Restore data produced by [`export_progress`](Self::export_progress)
    pub fn import_progress(&self, data: &str) -> bool {
        match serde_json::from_str::<ProgressExport>(data) {
            Ok(export) => {
                if let Some(progress) = export.progress {
                    self.write(PROGRESS_KEY, &progress);
                }
                if let Some(bookmarks) = export.bookmarks {
                    self.write(BOOKMARKS_KEY, &bookmarks);
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "error importing progress");
                false
            }
        }
    }
}

fn update_daily_streak(progress: &mut ReadingProgress, today: NaiveDate) {
    if progress.last_streak_date == Some(today) {
        return;
    }
    progress.daily_streak = match progress.last_streak_date {
        Some(last) if last.succ_opt() == Some(today) => progress.daily_streak + 1,
        _ => 1,
    };
    progress.last_streak_date = Some(today);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn setup() -> (ReadingProgressStore, ManualClock, Arc<MemoryStore>) {
        let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new());
        let progress =
            ReadingProgressStore::with_options(store.clone(), clock.clock(), TOTAL_QURAN_VERSES);
        (progress, clock, store)
    }

    #[test]
    fn test_default_progress_created() {
        let (progress, _, store) = setup();
        let current = progress.get_progress().unwrap();
        assert_eq!((current.current_chapter, current.current_verse), (1, 1));
        assert_eq!(current.total_verses_read, 0);
        assert!(store.get(PROGRESS_KEY).unwrap().is_some());
        assert!(store.get(SESSION_KEY).unwrap().is_some());
    }

    #[test]
    fn test_position_counts_each_verse_once_per_session() {
        let (progress, _, _) = setup();
        progress.update_reading_position(1, 1);
        progress.update_reading_position(1, 2);
        progress.update_reading_position(1, 2);

        let current = progress.get_progress().unwrap();
        assert_eq!((current.current_chapter, current.current_verse), (1, 2));
        assert_eq!(current.total_verses_read, 2);
        assert_eq!(progress.current_session().unwrap().verses_read.len(), 2);
    }

    #[test]
    fn test_daily_streak() {
        let (progress, clock, _) = setup();
        progress.update_reading_position(1, 1);
        assert_eq!(progress.get_progress().unwrap().daily_streak, 1);

        // Same day does not change the streak
        clock.advance(Duration::hours(2));
        progress.update_reading_position(1, 2);
        assert_eq!(progress.get_progress().unwrap().daily_streak, 1);

        clock.advance(Duration::days(1));
        progress.update_reading_position(1, 3);
        assert_eq!(progress.get_progress().unwrap().daily_streak, 2);

        // Skipping a day resets
        clock.advance(Duration::days(2));
        progress.update_reading_position(1, 4);
        assert_eq!(progress.get_progress().unwrap().daily_streak, 1);
    }

    #[test]
    fn test_mark_chapter_completed_is_idempotent() {
        let (progress, _, _) = setup();
        progress.mark_chapter_completed(1);
        progress.mark_chapter_completed(1);
        progress.mark_chapter_completed(114);
        assert_eq!(progress.get_progress().unwrap().completed_chapters, vec![1, 114]);
        assert_eq!(progress.get_reading_stats().completed_chapters, 2);
    }

    #[test]
    fn test_short_sessions_are_not_kept() {
        let (progress, clock, store) = setup();
        clock.advance(Duration::seconds(50));
        let ended = progress.end_current_session().unwrap();
        assert_eq!(ended.duration_minutes, 1);
        assert!(progress.get_progress().unwrap().reading_history.is_empty());
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
        assert!(progress.end_current_session().is_none());
    }

    #[test]
    fn test_history_is_capped_and_sorted() {
        let (progress, clock, _) = setup();
        for _ in 0..35 {
            progress.start_new_session();
            clock.advance(Duration::minutes(5));
            progress.end_current_session();
        }

        let history = progress.get_progress().unwrap().reading_history;
        assert_eq!(history.len(), 30);

        let recent = progress.recent_sessions(3);
        assert_eq!(recent.len(), 3);
        assert!(recent[0].start_time > recent[1].start_time);
        assert_eq!(progress.get_reading_stats().total_reading_time, 150);
    }

    #[test]
    fn test_reading_stats() {
        let (progress, clock, _) = setup();
        for verse in 1..=7 {
            progress.update_reading_position(1, verse);
        }
        clock.advance(Duration::minutes(10));
        progress.end_current_session();

        let stats = progress.get_reading_stats();
        assert_eq!(stats.total_verses_read, 7);
        assert_eq!(stats.daily_streak, 1);
        assert_eq!(stats.average_verses_per_day, 7.0);
        assert_eq!(stats.total_reading_time, 10);
        assert!((stats.percentage_complete - 7.0 / 6236.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_bookmarks() {
        let (progress, clock, _) = setup();
        let first = progress.add_bookmark(1, 1, "Al-Fatihah", "بِسْمِ", Some("start"));
        clock.advance(Duration::seconds(1));
        let second = progress.add_bookmark(112, 1, "Al-Ikhlas", "قُلْ", None);

        assert!(first.id.starts_with("1_1_"));
        assert_ne!(first.id, second.id);
        assert_eq!(progress.get_bookmarks().len(), 2);

        assert!(progress.remove_bookmark(&first.id));
        assert!(!progress.remove_bookmark(&first.id));
        assert_eq!(progress.get_bookmarks(), vec![second]);
    }

    #[test]
    fn test_corrupt_bookmarks_read_as_empty() {
        let (progress, _, store) = setup();
        store.set(BOOKMARKS_KEY, "not json").unwrap();
        assert!(progress.get_bookmarks().is_empty());
    }

    #[test]
    fn test_export_import_roundtrip() {
        let (progress, _, _) = setup();
        progress.update_reading_position(113, 2);
        progress.add_bookmark(113, 2, "Al-Falaq", "مِن شَرِّ", None);
        let exported = progress.export_progress();
        assert!(exported.contains("exported_at"));

        let (other, _, _) = setup();
        assert!(other.import_progress(&exported));
        assert_eq!(other.get_progress().unwrap().current_chapter, 113);
        assert_eq!(other.get_bookmarks().len(), 1);

        assert!(!other.import_progress("{broken"));
    }

    #[test]
    fn test_reset_progress() {
        let (progress, _, _) = setup();
        progress.update_reading_position(2, 5);
        progress.add_bookmark(2, 5, "x", "y", None);

        progress.reset_progress();

        let current = progress.get_progress().unwrap();
        assert_eq!((current.current_chapter, current.current_verse), (1, 1));
        assert!(progress.get_bookmarks().is_empty());
        assert!(progress.current_session().is_none());
    }
}
