//! Mock translation source for testing
//!
//! This module provides a deterministic, network-free source for exercising
//! the translation cache: fixed answers, simulated failures, simulated
//! latency, and a record of every fetch it served.
//!
//! # Example
//!
//! ```ignore
//! use quran_reader::translation::{MockMode, MockSource, TranslationSource, VerseKey};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockSource::new(MockMode::Echo);
//!     let result = mock.fetch(VerseKey::new(1, 1).unwrap()).await.unwrap();
//!     assert_eq!(result, "translation of 1:1");
//! }
//! ```

use crate::error::{ReaderError, ReaderResult};
use crate::translation::key::VerseKey;
use crate::translation::source::TranslationSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Mock answer modes
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Answer "translation of <chapter>:<verse>"
    Echo,

    /// Answer from predefined mappings; unknown keys fail with HTTP 404
    Mappings(HashMap<VerseKey, String>),

    /// Always fail with the given reason
    Error(String),

    /// Succeed at the transport level but return an unusable payload
    Malformed,
}

/// One fetch served by the mock
#[derive(Debug, Clone, Copy)]
pub struct FetchRecord {
    pub key: VerseKey,
    pub started_at: Instant,
}

/// Mock source that simulates the remote translation API
///
/// Clones share their call log, so a test can keep one handle while the
/// cache owns another.
#[derive(Debug, Clone)]
pub struct MockSource {
    mode: MockMode,
    /// Simulated network delay (in milliseconds)
    delay_ms: u64,
    /// Number of initial calls that fail before `mode` applies
    fail_first: usize,
    calls: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<FetchRecord>>>,
}

impl MockSource {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay_ms: 0,
            fail_first: 0,
            calls: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a MockSource whose every fetch takes `delay_ms`
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Make the first `count` fetches fail with a network error
    pub fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    /// Total number of fetches served
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of fetches served for `key`
    pub fn calls_for(&self, key: VerseKey) -> usize {
        self.records().iter().filter(|r| r.key == key).count()
    }

    /// Every fetch served so far, in start order
    pub fn records(&self) -> Vec<FetchRecord> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn apply_mode(&self, key: VerseKey) -> ReaderResult<String> {
        match &self.mode {
            MockMode::Echo => Ok(format!("translation of {}", key)),
            MockMode::Mappings(map) => map.get(&key).cloned().ok_or(ReaderError::Http(404)),
            MockMode::Error(msg) => Err(ReaderError::Network(msg.clone())),
            MockMode::Malformed => Err(ReaderError::InvalidResponse(
                "missing 'data.text' field".to_string(),
            )),
        }
    }
}

#[async_trait]
impl TranslationSource for MockSource {
    async fn fetch(&self, key: VerseKey) -> ReaderResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FetchRecord {
                key,
                started_at: Instant::now(),
            });

        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        if call < self.fail_first {
            return Err(ReaderError::Network(format!(
                "simulated failure {} of {}",
                call + 1,
                self.fail_first
            )));
        }
        self.apply_mode(key)
    }

    fn source_name(&self) -> &str {
        "Mock Source"
    }
}
