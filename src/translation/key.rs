//! Verse identifiers
//!
//! A [`VerseKey`] names one verse across the whole corpus. Its string form
//! `"<chapter>:<verse>"` is used both in the remote source URL and as the key
//! of the persisted translation cache.

use crate::error::{ReaderError, ReaderResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Composite `(chapter, verse)` identifier, both 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerseKey {
    chapter: u32,
    verse: u32,
}

impl VerseKey {
    /// Create a key, rejecting zero chapter or verse numbers
    pub fn new(chapter: u32, verse: u32) -> ReaderResult<Self> {
        if chapter == 0 || verse == 0 {
            return Err(ReaderError::InvalidKey(format!(
                "{}:{} (chapter and verse numbers start at 1)",
                chapter, verse
            )));
        }
        Ok(Self { chapter, verse })
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn verse(&self) -> u32 {
        self.verse
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

impl FromStr for VerseKey {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chapter, verse) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| ReaderError::InvalidKey(format!("'{}' is not <chapter>:<verse>", s)))?;

        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| ReaderError::InvalidKey(format!("'{}' is not a positive number", part)))
        };

        Self::new(parse(chapter)?, parse(verse)?)
    }
}

impl Serialize for VerseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VerseKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
