//! Verse data provider
//!
//! An immutable, in-memory corpus of chapters and verses. The corpus is
//! loaded once (from the bundled sample or a `quran-json` style file) and
//! only read afterwards.
//!
//! The JSON layout is an array of chapters:
//!
//! ```json
//! [
//!     {
//!         "id": 1,
//!         "name": "الفاتحة",
//!         "transliteration": "Al-Fatihah",
//!         "translation": "The Opener",
//!         "type": "meccan",
//!         "total_verses": 7,
//!         "verses": [{ "id": 1, "text": "..." }]
//!     }
//! ]
//! ```

use crate::error::{ReaderError, ReaderResult};
use crate::translation::VerseKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const SAMPLE_CORPUS: &str = include_str!("../data/corpus.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Revelation {
    Meccan,
    Medinan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub id: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: u32,
    /// Name in the original script
    pub name: String,
    pub transliteration: String,
    /// Meaning of the name
    pub translation: String,
    #[serde(rename = "type")]
    pub revelation: Revelation,
    pub total_verses: u32,
    #[serde(default)]
    pub verses: Vec<Verse>,
}

/// A single verse with the context needed to display it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerseData {
    pub text: String,
    pub chapter_name: String,
    pub chapter_name_original: String,
    pub chapter_number: u32,
    /// 1-based position of the verse inside its chapter
    pub verse_index: u32,
}

impl VerseData {
    pub fn key(&self) -> ReaderResult<VerseKey> {
        VerseKey::new(self.chapter_number, self.verse_index)
    }
}

/// Result of [`Corpus::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusReport {
    pub total_chapters: usize,
    pub missing_fields: Vec<String>,
    pub chapters_with_issues: Vec<u32>,
}

impl CorpusReport {
    pub fn is_clean(&self) -> bool {
        self.chapters_with_issues.is_empty()
    }
}

/// Immutable chapter/verse dataset
#[derive(Debug, Clone)]
pub struct Corpus {
    chapters: Vec<Chapter>,
    by_id: HashMap<u32, usize>,
    // Running count of verses before each chapter, for sequential lookups
    offsets: Vec<usize>,
}

impl Corpus {
    pub fn new(mut chapters: Vec<Chapter>) -> ReaderResult<Self> {
        chapters.sort_by_key(|c| c.id);

        let mut by_id = HashMap::with_capacity(chapters.len());
        let mut offsets = Vec::with_capacity(chapters.len());
        let mut running = 0usize;
        for (index, chapter) in chapters.iter().enumerate() {
            if chapter.id == 0 {
                return Err(ReaderError::Corpus("chapter id 0 is not allowed".to_string()));
            }
            if by_id.insert(chapter.id, index).is_some() {
                return Err(ReaderError::Corpus(format!(
                    "duplicate chapter id {}",
                    chapter.id
                )));
            }
            offsets.push(running);
            running += chapter.verses.len();
        }

        Ok(Self {
            chapters,
            by_id,
            offsets,
        })
    }

    pub fn from_json_str(json: &str) -> ReaderResult<Self> {
        let chapters: Vec<Chapter> = serde_json::from_str(json)
            .map_err(|e| ReaderError::Corpus(format!("Failed to parse corpus: {}", e)))?;
        Self::new(chapters)
    }

    pub fn from_file(path: &Path) -> ReaderResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReaderError::Corpus(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    /// The small corpus bundled with the crate
    pub fn sample() -> ReaderResult<Self> {
        Self::from_json_str(SAMPLE_CORPUS)
    }

    pub fn all_chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter_by_id(&self, id: u32) -> Option<&Chapter> {
        self.by_id.get(&id).map(|&index| &self.chapters[index])
    }

    /// Declared verse total across all chapters
    pub fn total_verse_count(&self) -> u32 {
        self.chapters.iter().map(|c| c.total_verses).sum()
    }

    /// Verse at 1-based position `n` counting through the whole corpus
    pub fn verse_by_sequential_index(&self, n: usize) -> Option<VerseData> {
        if n == 0 {
            return None;
        }
        let position = n - 1;
        let chapter_index = self.offsets.partition_point(|&offset| offset <= position);
        let chapter_index = chapter_index.checked_sub(1)?;
        let chapter = &self.chapters[chapter_index];
        let within = position - self.offsets[chapter_index];
        chapter
            .verses
            .get(within)
            .map(|verse| Self::verse_data(chapter, verse, within as u32 + 1))
    }

    pub fn verse(&self, chapter: u32, verse: u32) -> Option<VerseData> {
        let found = self.chapter_by_id(chapter)?;
        let index = verse.checked_sub(1)? as usize;
        found
            .verses
            .get(index)
            .map(|v| Self::verse_data(found, v, verse))
    }

    /// `(verse number, text)` pairs of a chapter, empty if unknown
    pub fn chapter_verses(&self, chapter: u32) -> Vec<(u32, &str)> {
        self.chapter_by_id(chapter)
            .map(|c| {
                c.verses
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i as u32 + 1, v.text.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Keys of every verse present in a chapter
    pub fn chapter_keys(&self, chapter: u32) -> Vec<VerseKey> {
        self.chapter_verses(chapter)
            .into_iter()
            .filter_map(|(verse, _)| VerseKey::new(chapter, verse).ok())
            .collect()
    }

    /// Chapters whose names, meaning or number match `query`
    pub fn search_chapters(&self, query: &str) -> Vec<&Chapter> {
        let term = query.trim().to_lowercase();
        if term.is_empty() {
            return self.chapters.iter().collect();
        }
        let number = term.parse::<u32>().ok();

        self.chapters
            .iter()
            .filter(|c| {
                c.transliteration.to_lowercase().contains(&term)
                    || c.translation.to_lowercase().contains(&term)
                    || c.name.contains(&term)
                    || number == Some(c.id)
            })
            .collect()
    }

    pub fn chapter_suggestions(&self, query: &str, limit: usize) -> Vec<&Chapter> {
        let mut found = self.search_chapters(query);
        found.truncate(limit);
        found
    }

    /// Report chapters with missing names or verses
    pub fn validate(&self) -> CorpusReport {
        let mut report = CorpusReport {
            total_chapters: self.chapters.len(),
            ..CorpusReport::default()
        };

        for chapter in &self.chapters {
            let mut issues = Vec::new();
            if chapter.name.trim().is_empty() {
                issues.push("name");
            }
            if chapter.transliteration.trim().is_empty() {
                issues.push("transliteration");
            }
            if chapter.translation.trim().is_empty() {
                issues.push("translation");
            }
            if chapter.verses.is_empty() {
                issues.push("verses");
            } else if chapter.verses.len() != chapter.total_verses as usize {
                issues.push("total_verses");
            }

            if !issues.is_empty() {
                report.chapters_with_issues.push(chapter.id);
                for issue in issues {
                    if !report.missing_fields.iter().any(|f| f == issue) {
                        report.missing_fields.push(issue.to_string());
                    }
                }
            }
        }
        report
    }

    fn verse_data(chapter: &Chapter, verse: &Verse, verse_index: u32) -> VerseData {
        VerseData {
            text: verse.text.clone(),
            chapter_name: if chapter.transliteration.is_empty() {
                format!("Surah {}", chapter.id)
            } else {
                chapter.transliteration.clone()
            },
            chapter_name_original: chapter.name.clone(),
            chapter_number: chapter.id,
            verse_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Corpus {
        Corpus::sample().unwrap()
    }

    #[test]
    fn test_sample_loads() {
        let corpus = sample();
        assert_eq!(corpus.all_chapters().len(), 4);
        assert_eq!(corpus.total_verse_count(), 22);
        assert!(corpus.validate().is_clean());
    }

    #[test]
    fn test_chapter_by_id() {
        let corpus = sample();
        assert_eq!(corpus.chapter_by_id(1).unwrap().transliteration, "Al-Fatihah");
        assert_eq!(corpus.chapter_by_id(114).unwrap().total_verses, 6);
        assert!(corpus.chapter_by_id(2).is_none());
    }

    #[test]
    fn test_sequential_index_crosses_chapters() {
        let corpus = sample();
        let first = corpus.verse_by_sequential_index(1).unwrap();
        assert_eq!((first.chapter_number, first.verse_index), (1, 1));

        let seventh = corpus.verse_by_sequential_index(7).unwrap();
        assert_eq!((seventh.chapter_number, seventh.verse_index), (1, 7));

        let eighth = corpus.verse_by_sequential_index(8).unwrap();
        assert_eq!((eighth.chapter_number, eighth.verse_index), (112, 1));

        let last = corpus.verse_by_sequential_index(22).unwrap();
        assert_eq!((last.chapter_number, last.verse_index), (114, 6));

        assert!(corpus.verse_by_sequential_index(0).is_none());
        assert!(corpus.verse_by_sequential_index(23).is_none());
    }

    #[test]
    fn test_verse_lookup() {
        let corpus = sample();
        let verse = corpus.verse(112, 1).unwrap();
        assert_eq!(verse.text, "قُلْ هُوَ اللَّهُ أَحَدٌ");
        assert_eq!(verse.chapter_name, "Al-Ikhlas");
        assert_eq!(verse.key().unwrap().to_string(), "112:1");
        assert!(corpus.verse(112, 0).is_none());
        assert!(corpus.verse(112, 5).is_none());
    }

    #[test]
    fn test_chapter_verses_and_keys() {
        let corpus = sample();
        let verses = corpus.chapter_verses(113);
        assert_eq!(verses.len(), 5);
        assert_eq!(verses[0].0, 1);
        assert_eq!(corpus.chapter_keys(113).last().unwrap().to_string(), "113:5");
        assert!(corpus.chapter_verses(50).is_empty());
    }

    #[test]
    fn test_search() {
        let corpus = sample();
        assert_eq!(corpus.search_chapters("").len(), 4);
        assert_eq!(corpus.search_chapters("  falaq ")[0].id, 113);
        assert_eq!(corpus.search_chapters("mankind")[0].id, 114);
        assert_eq!(corpus.search_chapters("112")[0].id, 112);
        assert_eq!(corpus.search_chapters("الناس")[0].id, 114);
        assert!(corpus.search_chapters("zzz").is_empty());
        assert_eq!(corpus.chapter_suggestions("a", 2).len(), 2);
    }

    #[test]
    fn test_validate_reports_issues() {
        let corpus = Corpus::from_json_str(
            r#"[{"id": 3, "name": "", "transliteration": "X", "translation": "Y",
                 "type": "medinan", "total_verses": 2, "verses": [{"id": 1, "text": "a"}]}]"#,
        )
        .unwrap();
        let report = corpus.validate();
        assert_eq!(report.chapters_with_issues, vec![3]);
        assert_eq!(report.missing_fields, vec!["name", "total_verses"]);
    }

    #[test]
    fn test_rejects_duplicates_and_garbage() {
        let dup = r#"[
            {"id": 1, "name": "a", "transliteration": "a", "translation": "a", "type": "meccan", "total_verses": 0},
            {"id": 1, "name": "b", "transliteration": "b", "translation": "b", "type": "meccan", "total_verses": 0}
        ]"#;
        assert!(matches!(
            Corpus::from_json_str(dup),
            Err(ReaderError::Corpus(_))
        ));
        assert!(Corpus::from_json_str("{}").is_err());
    }
}
