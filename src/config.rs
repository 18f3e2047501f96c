//! Runtime configuration
//!
//! Settings come from, in increasing priority: built-in defaults, an optional
//! JSON file, `QURAN_READER_*` environment variables, and finally command
//! line flags applied by the binaries.

use crate::corpus::Corpus;
use crate::error::{ReaderError, ReaderResult};
use crate::storage::FileStore;
use crate::translation::alquran::{DEFAULT_EDITION, DEFAULT_ENDPOINT};
use crate::translation::service::{DEFAULT_FETCH_TIMEOUT, DEFAULT_PRELOAD_STAGGER};
use crate::translation::{AlQuranCloudSource, CacheOptions, FallbackTable};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_PREFIX: &str = "QURAN_READER_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub translation_endpoint: String,
    pub translation_edition: String,
    pub fetch_timeout_ms: u64,
    pub preload_stagger_ms: u64,
    /// Directory holding the persisted key/value files
    pub data_dir: PathBuf,
    /// Corpus JSON; the bundled sample is used when unset
    pub corpus_path: Option<PathBuf>,
    /// JSON object overriding the built-in fallback translations
    pub fallbacks_path: Option<PathBuf>,
    /// Local time of the daily reminder, `HH:MM`
    pub notification_time: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            translation_endpoint: DEFAULT_ENDPOINT.to_string(),
            translation_edition: DEFAULT_EDITION.to_string(),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            preload_stagger_ms: DEFAULT_PRELOAD_STAGGER.as_millis() as u64,
            data_dir: PathBuf::from(".quran-reader"),
            corpus_path: None,
            fallbacks_path: None,
            notification_time: "08:00".to_string(),
        }
    }
}

impl ReaderConfig {
    pub fn from_file(path: &Path) -> ReaderResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReaderError::Config(format!(
                "Failed to read config '{}': {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| ReaderError::Config(format!("Invalid config '{}': {}", path.display(), e)))
    }

    /// Defaults or `path`, then the process environment
    pub fn load(path: Option<&Path>) -> ReaderResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env(|name| std::env::var(name).ok())
    }

    /// Apply overrides found through `lookup`, keyed by full variable name
    pub fn with_env<F>(mut self, lookup: F) -> ReaderResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{}{}", ENV_PREFIX, suffix);
            lookup(&name).map(|value| (name, value))
        };

        if let Some((_, value)) = var("ENDPOINT") {
            self.translation_endpoint = value;
        }
        if let Some((_, value)) = var("EDITION") {
            self.translation_edition = value;
        }
        if let Some((name, value)) = var("FETCH_TIMEOUT_MS") {
            self.fetch_timeout_ms = parse_number(&name, &value)?;
        }
        if let Some((name, value)) = var("PRELOAD_STAGGER_MS") {
            self.preload_stagger_ms = parse_number(&name, &value)?;
        }
        if let Some((_, value)) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }
        if let Some((_, value)) = var("CORPUS") {
            self.corpus_path = Some(PathBuf::from(value));
        }
        if let Some((_, value)) = var("FALLBACKS") {
            self.fallbacks_path = Some(PathBuf::from(value));
        }
        if let Some((_, value)) = var("NOTIFICATION_TIME") {
            self.notification_time = value;
        }

        debug!(config = ?self, "configuration loaded");
        Ok(self)
    }

    pub fn notification_time(&self) -> ReaderResult<NaiveTime> {
        NaiveTime::parse_from_str(self.notification_time.trim(), "%H:%M").map_err(|e| {
            ReaderError::Config(format!(
                "Invalid notification time '{}': {}",
                self.notification_time, e
            ))
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn cache_options(&self) -> ReaderResult<CacheOptions> {
        if self.fetch_timeout_ms == 0 {
            return Err(ReaderError::Config(
                "fetch_timeout_ms must be positive".to_string(),
            ));
        }
        let fallbacks = match &self.fallbacks_path {
            Some(path) => FallbackTable::from_file(path)?,
            None => FallbackTable::builtin(),
        };
        Ok(CacheOptions {
            fetch_timeout: self.fetch_timeout(),
            preload_stagger: Duration::from_millis(self.preload_stagger_ms),
            fallbacks,
            ..CacheOptions::default()
        })
    }

    pub fn translation_source(&self) -> ReaderResult<AlQuranCloudSource> {
        AlQuranCloudSource::new(
            &self.translation_endpoint,
            &self.translation_edition,
            self.fetch_timeout(),
        )
    }

    pub fn open_store(&self) -> ReaderResult<FileStore> {
        FileStore::open(&self.data_dir)
    }

    pub fn load_corpus(&self) -> ReaderResult<Corpus> {
        match &self.corpus_path {
            Some(path) => Corpus::from_file(path),
            None => Corpus::sample(),
        }
    }
}

fn parse_number(name: &str, value: &str) -> ReaderResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| ReaderError::Config(format!("{} must be a number, got '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.translation_endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.translation_edition, "ur.jalandhry");
        assert_eq!(config.fetch_timeout_ms, 10_000);
        assert_eq!(config.preload_stagger_ms, 200);
        assert_eq!(
            config.notification_time().unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"translation_edition": "ur.maududi", "fetch_timeout_ms": 5000}"#)
            .unwrap();

        let config = ReaderConfig::from_file(&path).unwrap();
        assert_eq!(config.translation_edition, "ur.maududi");
        assert_eq!(config.fetch_timeout_ms, 5000);
        assert_eq!(config.preload_stagger_ms, 200);
        assert_eq!(config.data_dir, PathBuf::from(".quran-reader"));
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            ReaderConfig::from_file(&path),
            Err(ReaderError::Config(_))
        ));
        assert!(ReaderConfig::from_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = ReaderConfig::default()
            .with_env(env(&[
                ("QURAN_READER_EDITION", "ur.junagarhi"),
                ("QURAN_READER_FETCH_TIMEOUT_MS", "2500"),
                ("QURAN_READER_DATA_DIR", "/tmp/reader"),
                ("QURAN_READER_NOTIFICATION_TIME", "06:45"),
                ("UNRELATED", "x"),
            ]))
            .unwrap();

        assert_eq!(config.translation_edition, "ur.junagarhi");
        assert_eq!(config.fetch_timeout(), Duration::from_millis(2500));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/reader"));
        assert_eq!(
            config.notification_time().unwrap(),
            NaiveTime::from_hms_opt(6, 45, 0).unwrap()
        );
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let result =
            ReaderConfig::default().with_env(env(&[("QURAN_READER_PRELOAD_STAGGER_MS", "soon")]));
        match result {
            Err(ReaderError::Config(msg)) => assert!(msg.contains("QURAN_READER_PRELOAD_STAGGER_MS")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_notification_time() {
        let config = ReaderConfig {
            notification_time: "25:99".to_string(),
            ..ReaderConfig::default()
        };
        assert!(config.notification_time().is_err());
    }

    #[test]
    fn test_cache_options() {
        let dir = tempfile::tempdir().unwrap();
        let fallbacks = dir.path().join("fallbacks.json");
        fs::write(&fallbacks, r#"{"*": "loading", "2:255": "ayat ul kursi"}"#).unwrap();

        let config = ReaderConfig {
            fetch_timeout_ms: 300,
            preload_stagger_ms: 0,
            fallbacks_path: Some(fallbacks),
            ..ReaderConfig::default()
        };
        let options = config.cache_options().unwrap();
        assert_eq!(options.fetch_timeout, Duration::from_millis(300));
        assert_eq!(options.preload_stagger, Duration::ZERO);
        assert_eq!(options.fallbacks.placeholder(), "loading");

        let zero = ReaderConfig {
            fetch_timeout_ms: 0,
            ..ReaderConfig::default()
        };
        assert!(zero.cache_options().is_err());
    }

    #[test]
    fn test_sample_corpus_and_source() {
        let config = ReaderConfig::default();
        assert!(config.load_corpus().unwrap().total_verse_count() > 0);
        assert_eq!(config.translation_source().unwrap().edition(), DEFAULT_EDITION);
    }
}
