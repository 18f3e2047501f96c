//! Translation source trait
//!
//! The `TranslationSource` trait abstracts over where per-verse translations
//! come from, so the cache can be driven by the HTTP provider in production
//! and by a deterministic mock in tests.
//!
//! # Example
//!
//! ```ignore
//! use quran_reader::translation::{AlQuranCloudSource, TranslationSource, VerseKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = AlQuranCloudSource::with_defaults()?;
//!     let text = source.fetch(VerseKey::new(1, 1)?).await?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```

use crate::error::ReaderResult;
use crate::translation::key::VerseKey;
use async_trait::async_trait;

/// Generic trait for per-verse translation providers
///
/// Implementations perform a single lookup and report every failure
/// (transport, status, malformed payload) as an error. Timeouts, caching and
/// request deduplication are the caller's concern.
#[async_trait]
pub trait TranslationSource: Send + Sync {
    /// Fetch the translation text of one verse
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The non-empty translation text
    /// * `Err(ReaderError)` - If the lookup failed for any reason
    async fn fetch(&self, key: VerseKey) -> ReaderResult<String>;

    /// Name of this source, used in logs
    fn source_name(&self) -> &str;
}
