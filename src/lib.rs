//! Verse reader core
//!
//! - [`corpus`]: immutable chapter and verse data
//! - [`translation`]: lazily fetched, cached and observable per-verse translations
//! - [`progress`]: reading position, streaks, sessions and bookmarks
//! - [`daily`]: the verse of the day
//! - [`notifications`]: daily reminder scheduling
//! - [`storage`]: the key/value port everything persists through

pub mod clock;
pub mod config;
pub mod corpus;
pub mod daily;
pub mod error;
pub mod notifications;
pub mod progress;
pub mod storage;
pub mod translation;

pub use config::ReaderConfig;
pub use corpus::{Chapter, Corpus, Verse, VerseData};
pub use daily::{DailyVerse, DailyVerseTracker};
pub use error::{ReaderError, ReaderResult};
pub use notifications::{
    LogSink, Notification, NotificationScheduler, NotificationSink, Permission,
};
pub use progress::{Bookmark, ReadingProgress, ReadingProgressStore, ReadingStats};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use translation::{
    Subscription, TranslationService, TranslationSource, TranslationState, VerseKey,
};
