/// Error types for the reader library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// A verse key could not be parsed or was out of range
    InvalidKey(String),
    /// Transport-level failure talking to the translation source
    Network(String),
    /// The translation source did not answer within the allotted time
    Timeout(u64),
    /// The translation source answered with a non-success status
    Http(u16),
    /// The translation source answered, but the payload was unusable
    InvalidResponse(String),
    /// Persistent storage could not be read or written
    Storage(String),
    /// Invalid or missing configuration
    Config(String),
    /// The verse corpus is missing or malformed
    Corpus(String),
    /// Notification delivery failed
    Notification(String),
}

impl std::fmt::Display for ReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderError::InvalidKey(msg) => write!(f, "Invalid verse key: {}", msg),
            ReaderError::Network(msg) => write!(f, "Network error: {}", msg),
            ReaderError::Timeout(ms) => write!(f, "Request timed out after {}ms", ms),
            ReaderError::Http(status) => write!(f, "HTTP error! status: {}", status),
            ReaderError::InvalidResponse(msg) => write!(f, "Invalid response data: {}", msg),
            ReaderError::Storage(msg) => write!(f, "Storage error: {}", msg),
            ReaderError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ReaderError::Corpus(msg) => write!(f, "Corpus error: {}", msg),
            ReaderError::Notification(msg) => write!(f, "Notification error: {}", msg),
        }
    }
}

impl std::error::Error for ReaderError {}

impl From<reqwest::Error> for ReaderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ReaderError::InvalidResponse(err.to_string())
        } else {
            ReaderError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for ReaderError {
    fn from(err: std::io::Error) -> Self {
        ReaderError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ReaderError {
    fn from(err: serde_json::Error) -> Self {
        ReaderError::Storage(format!("JSON: {}", err))
    }
}

/// Result type for reader operations
pub type ReaderResult<T> = Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ReaderError::Http(404).to_string(),
            "HTTP error! status: 404"
        );
        assert_eq!(
            ReaderError::Timeout(10000).to_string(),
            "Request timed out after 10000ms"
        );
        assert!(
            ReaderError::InvalidKey("0:1".to_string())
                .to_string()
                .contains("0:1")
        );
    }

    #[test]
    fn test_json_error_maps_to_storage() {
        let err: ReaderError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, ReaderError::Storage(_)));
    }
}
