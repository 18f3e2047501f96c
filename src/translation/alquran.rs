//! HTTP translation source backed by the alquran.cloud API
//!
//! Each verse is fetched individually:
//!
//! ```text
//! GET <endpoint>/<chapter>:<verse>/<edition>
//! {"code": 200, "status": "OK", "data": {"text": "..."}}
//! ```
//!
//! Anything other than a success HTTP status, `code == 200` and a non-empty
//! `data.text` string is reported as an error.

use crate::error::{ReaderError, ReaderResult};
use crate::translation::key::VerseKey;
use crate::translation::source::TranslationSource;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Default API root for single-verse lookups
pub const DEFAULT_ENDPOINT: &str = "https://api.alquran.cloud/v1/ayah";

/// Default edition: Urdu, Fateh Muhammad Jalandhry
pub const DEFAULT_EDITION: &str = "ur.jalandhry";

/// Per-verse HTTP translation provider
#[derive(Clone)]
pub struct AlQuranCloudSource {
    client: reqwest::Client,
    endpoint: String,
    edition: String,
}

impl AlQuranCloudSource {
    /// Create a source for `edition` served under `endpoint`
    ///
    /// `timeout` bounds the whole request on the client side; the cache
    /// applies its own timeout on top of this.
    pub fn new(endpoint: &str, edition: &str, timeout: Duration) -> ReaderResult<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(ReaderError::Config(
                "Translation endpoint cannot be empty".to_string(),
            ));
        }
        if edition.trim().is_empty() || edition.contains('/') {
            return Err(ReaderError::Config(format!(
                "Invalid translation edition: '{}'",
                edition
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReaderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            edition: edition.trim().to_string(),
        })
    }

    /// Create a source using the public endpoint and default edition
    pub fn with_defaults() -> ReaderResult<Self> {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_EDITION, Duration::from_secs(10))
    }

    pub fn edition(&self) -> &str {
        &self.edition
    }

    /// URL of the single-verse lookup for `key`
    pub fn verse_url(&self, key: VerseKey) -> String {
        format!("{}/{}/{}", self.endpoint, key, self.edition)
    }

    /// Extract the translation text from a decoded response body
    fn parse_payload(json: &Value) -> ReaderResult<String> {
        let code = json["code"].as_i64().ok_or_else(|| {
            ReaderError::InvalidResponse("missing numeric 'code' field".to_string())
        })?;
        if code != 200 {
            return Err(ReaderError::InvalidResponse(format!(
                "response code {}",
                code
            )));
        }

        match json["data"]["text"].as_str() {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            Some(_) => Err(ReaderError::InvalidResponse(
                "empty 'data.text' field".to_string(),
            )),
            None => Err(ReaderError::InvalidResponse(
                "missing 'data.text' field".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for AlQuranCloudSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlQuranCloudSource")
            .field("endpoint", &self.endpoint)
            .field("edition", &self.edition)
            .finish()
    }
}

#[async_trait]
impl TranslationSource for AlQuranCloudSource {
    async fn fetch(&self, key: VerseKey) -> ReaderResult<String> {
        let url = self.verse_url(key);
        tracing::debug!(%key, %url, "fetching translation");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ReaderError::Network(format!("request for {} timed out", key))
            } else {
                ReaderError::from(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReaderError::Http(status.as_u16()));
        }

        let json: Value = response.json().await.map_err(|e| {
            ReaderError::InvalidResponse(format!("Failed to parse API response: {}", e))
        })?;

        Self::parse_payload(&json)
    }

    fn source_name(&self) -> &str {
        "alquran.cloud"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========== Initialization Tests ==========

    #[test]
    fn test_with_defaults() {
        let source = AlQuranCloudSource::with_defaults().unwrap();
        assert_eq!(source.edition(), DEFAULT_EDITION);
        assert_eq!(source.source_name(), "alquran.cloud");
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let result = AlQuranCloudSource::new("  ", "ur.jalandhry", Duration::from_secs(1));
        match result {
            Err(ReaderError::Config(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_invalid_edition_rejected() {
        assert!(AlQuranCloudSource::new(DEFAULT_ENDPOINT, "", Duration::from_secs(1)).is_err());
        assert!(
            AlQuranCloudSource::new(DEFAULT_ENDPOINT, "ur/x", Duration::from_secs(1)).is_err()
        );
    }

    // ========== URL Tests ==========

    #[test]
    fn test_verse_url() {
        let source = AlQuranCloudSource::with_defaults().unwrap();
        let key = VerseKey::new(2, 255).unwrap();
        assert_eq!(
            source.verse_url(key),
            "https://api.alquran.cloud/v1/ayah/2:255/ur.jalandhry"
        );
    }

    #[test]
    fn test_verse_url_strips_trailing_slash() {
        let source =
            AlQuranCloudSource::new("http://localhost:9/v1/ayah/", "en.sahih", Duration::from_secs(1))
                .unwrap();
        let key = VerseKey::new(1, 1).unwrap();
        assert_eq!(source.verse_url(key), "http://localhost:9/v1/ayah/1:1/en.sahih");
    }

    // ========== Payload Tests ==========

    #[test]
    fn test_parse_valid_payload() {
        let body = json!({"code": 200, "status": "OK", "data": {"text": "ترجمہ"}});
        assert_eq!(AlQuranCloudSource::parse_payload(&body).unwrap(), "ترجمہ");
    }

    #[test]
    fn test_parse_non_200_code() {
        let body = json!({"code": 404, "status": "Not Found", "data": "not found"});
        assert!(matches!(
            AlQuranCloudSource::parse_payload(&body),
            Err(ReaderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_missing_text() {
        let body = json!({"code": 200, "data": {}});
        match AlQuranCloudSource::parse_payload(&body) {
            Err(ReaderError::InvalidResponse(msg)) => assert!(msg.contains("missing")),
            _ => panic!("Expected InvalidResponse"),
        }
    }

    #[test]
    fn test_parse_empty_text() {
        let body = json!({"code": 200, "data": {"text": "  "}});
        assert!(AlQuranCloudSource::parse_payload(&body).is_err());
    }

    #[test]
    fn test_parse_missing_code() {
        let body = json!({"data": {"text": "x"}});
        assert!(AlQuranCloudSource::parse_payload(&body).is_err());
    }

    #[test]
    fn test_debug_output() {
        let source = AlQuranCloudSource::with_defaults().unwrap();
        let debug_str = format!("{:?}", source);
        assert!(debug_str.contains("ur.jalandhry"));
    }

    // ========== Integration Tests (require network) ==========

    #[tokio::test]
    #[ignore] // Run with: cargo test --ignored
    async fn test_real_api_first_verse() {
        let source = AlQuranCloudSource::with_defaults().unwrap();
        let key = VerseKey::new(1, 1).unwrap();
        let result = source.fetch(key).await.unwrap();
        println!("Translation: {} → {}", key, result);
        assert!(!result.is_empty());
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --ignored
    async fn test_real_api_unknown_verse() {
        let source = AlQuranCloudSource::with_defaults().unwrap();
        let key = VerseKey::new(1, 999).unwrap();
        assert!(source.fetch(key).await.is_err());
    }
}
