//! Static fallback translations
//!
//! When a fetch fails and nothing is cached, the cache shows a locally known
//! translation instead. Only a handful of early verses have one; every other
//! verse gets the generic placeholder.

use crate::error::{ReaderError, ReaderResult};
use crate::translation::key::VerseKey;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Placeholder shown for verses without a known fallback ("Urdu translation is loading...")
pub const DEFAULT_PLACEHOLDER: &str = "اردو ترجمہ لوڈ ہو رہا ہے...";

const BUILTIN: &[(u32, u32, &str)] = &[
    (1, 1, "شروع اللہ کے نام سے جو بڑا مہربان اور نہایت رحم والا ہے"),
    (1, 2, "تمام تعریفیں اللہ کے لیے ہیں جو تمام جہانوں کا پروردگار ہے"),
    (1, 3, "بڑا مہربان اور نہایت رحم والا"),
    (1, 4, "روز جزا کا مالک"),
    (1, 5, "ہم صرف تیری عبادت کرتے ہیں اور صرف تجھ سے مدد مانگتے ہیں"),
    (1, 6, "ہمیں سیدھا راستہ دکھا"),
    (
        1,
        7,
        "ان لوگوں کا راستہ جن پر تو نے انعام کیا ہے، نہ کہ ان کا جن پر غضب ہوا اور نہ گمراہوں کا",
    ),
    (2, 1, "الف لام میم"),
    (2, 2, "یہ وہ کتاب ہے جس میں کوئی شک نہیں، پرہیزگاروں کے لیے ہدایت ہے"),
    (
        2,
        3,
        "جو غیب پر ایمان لاتے ہیں اور نماز قائم کرتے ہیں اور جو کچھ ہم نے انہیں دیا ہے اس میں سے خرچ کرتے ہیں",
    ),
];

/// Lookup table of fallback texts plus a generic placeholder
#[derive(Debug, Clone)]
pub struct FallbackTable {
    entries: HashMap<VerseKey, String>,
    placeholder: String,
}

impl FallbackTable {
    /// An empty table that answers every verse with `placeholder`
    pub fn new(placeholder: &str) -> Self {
        Self {
            entries: HashMap::new(),
            placeholder: placeholder.to_string(),
        }
    }

    /// The built-in Urdu table for the opening verses
    pub fn builtin() -> Self {
        let mut table = Self::new(DEFAULT_PLACEHOLDER);
        for &(chapter, verse, text) in BUILTIN {
            if let Ok(key) = VerseKey::new(chapter, verse) {
                table.entries.insert(key, text.to_string());
            }
        }
        table
    }

    pub fn with_entry(mut self, key: VerseKey, text: &str) -> Self {
        self.entries.insert(key, text.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = placeholder.to_string();
        self
    }

    /// Merge entries from a JSON object of `"<chapter>:<verse>": "<text>"`
    ///
    /// The special key `"*"` replaces the placeholder.
    pub fn merge_json(mut self, json: &str) -> ReaderResult<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| ReaderError::Config(format!("Invalid fallback table: {}", e)))?;

        for (key, text) in raw {
            if key == "*" {
                self.placeholder = text;
            } else {
                self.entries.insert(key.parse()?, text);
            }
        }
        Ok(self)
    }

    /// Built-in table overridden by the entries in `path`
    pub fn from_file(path: &Path) -> ReaderResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReaderError::Config(format!(
                "Failed to read fallback table '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::builtin().merge_json(&content)
    }

    /// Fallback text for `key`, never empty unless the placeholder is
    pub fn text_for(&self, key: VerseKey) -> &str {
        self.entries
            .get(&key)
            .map(String::as_str)
            .unwrap_or(&self.placeholder)
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::builtin()
    }
}
