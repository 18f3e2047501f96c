//! Observable translation state for a single verse

use serde::{Deserialize, Serialize};

/// What is currently known about a verse's translation
///
/// The variants make `loading` and `loaded` mutually exclusive: a verse is
/// either untouched, being fetched, cached, or failed with a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TranslationState {
    /// Never requested (or reset by a cache clear)
    #[default]
    Idle,
    /// A fetch is in flight
    Loading,
    /// A successful result is cached
    Loaded(String),
    /// The most recent fetch failed and nothing is cached
    Failed { reason: String, fallback: String },
}

impl TranslationState {
    pub fn is_loading(&self) -> bool {
        matches!(self, TranslationState::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, TranslationState::Loaded(_))
    }

    /// A fetch cycle has ended, successfully or not
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            TranslationState::Loaded(_) | TranslationState::Failed { .. }
        )
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TranslationState::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Best available display text: cached translation, fallback, or empty
    pub fn text(&self) -> &str {
        match self {
            TranslationState::Loaded(text) => text,
            TranslationState::Failed { fallback, .. } => fallback,
            TranslationState::Idle | TranslationState::Loading => "",
        }
    }

    /// Flatten into the `{loading, loaded, error, text}` view
    pub fn status(&self) -> TranslationStatus {
        TranslationStatus::from(self)
    }
}

/// Flat view of [`TranslationState`] for rendering and JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationStatus {
    pub loading: bool,
    pub loaded: bool,
    pub error: Option<String>,
    pub text: String,
}

impl From<&TranslationState> for TranslationStatus {
    fn from(state: &TranslationState) -> Self {
        Self {
            loading: state.is_loading(),
            loaded: state.is_loaded(),
            error: state.error().map(str::to_string),
            text: state.text().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_status() {
        let status = TranslationState::Idle.status();
        assert_eq!(
            status,
            TranslationStatus {
                loading: false,
                loaded: false,
                error: None,
                text: String::new(),
            }
        );
    }

    #[test]
    fn test_loading_is_not_loaded() {
        let state = TranslationState::Loading;
        assert!(state.is_loading());
        assert!(!state.is_loaded());
        assert!(!state.is_settled());
        assert_eq!(state.text(), "");
    }

    #[test]
    fn test_loaded_has_no_error() {
        let status = TranslationState::Loaded("text".to_string()).status();
        assert!(status.loaded);
        assert!(!status.loading);
        assert_eq!(status.error, None);
        assert_eq!(status.text, "text");
    }

    #[test]
    fn test_failed_exposes_reason_and_fallback() {
        let state = TranslationState::Failed {
            reason: "HTTP error! status: 500".to_string(),
            fallback: "placeholder".to_string(),
        };
        assert!(state.is_settled());
        assert_eq!(state.error(), Some("HTTP error! status: 500"));
        assert_eq!(state.text(), "placeholder");

        let json = serde_json::to_value(state.status()).unwrap();
        assert_eq!(json["loading"], false);
        assert_eq!(json["loaded"], false);
        assert_eq!(json["error"], "HTTP error! status: 500");
        assert_eq!(json["text"], "placeholder");
    }
}
