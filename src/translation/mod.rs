/// Lazy translation module
///
/// This module fetches per-verse translations on demand, caches them
/// persistently, and lets any number of observers follow each verse's
/// progress from idle through loading to loaded (or failed with a fallback).
///
/// # Overview
///
/// 1. **Verse keys** - `<chapter>:<verse>` identifiers used in URLs and cache keys
/// 2. **Source trait & providers** - `TranslationSource` with an HTTP and a mock provider
/// 3. **Topic** - typed keyed publish/subscribe registry
/// 4. **Fallback table** - static texts shown when a fetch fails
/// 5. **Service** - the cache itself: deduplicated fetches, persistence, fan-out
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use quran_reader::storage::FileStore;
/// use quran_reader::translation::{AlQuranCloudSource, TranslationService, VerseKey};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = TranslationService::new(
///         Arc::new(AlQuranCloudSource::with_defaults()?),
///         Arc::new(FileStore::open(".quran-reader")?),
///     );
///
///     let key = VerseKey::new(1, 1)?;
///     let _sub = service.subscribe(key, |state| println!("{:?}", state.status()));
///     println!("{}", service.load_translation(key).await);
///     Ok(())
/// }
/// ```
pub mod alquran;
pub mod fallback;
pub mod key;
pub mod mock;
pub mod service;
pub mod source;
pub mod state;
pub mod topic;


pub use alquran::AlQuranCloudSource;
pub use fallback::FallbackTable;
pub use key::VerseKey;
pub use mock::{MockMode, MockSource};
pub use service::{CacheOptions, CacheStats, TranslationService};
pub use source::TranslationSource;
pub use state::{TranslationState, TranslationStatus};
pub use topic::{Subscription, Topic};
