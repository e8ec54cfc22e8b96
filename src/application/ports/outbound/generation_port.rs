use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::value_objects::CreditAction;

/// Raw reply from the generation endpoint
#[derive(Debug, Clone)]
pub struct EndpointReply {
    /// The `data` payload, not yet parsed into an artifact
    pub data: serde_json::Value,
    /// Server-side completion time
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Endpoint unavailable: HTTP {status}")]
    Unavailable { status: u16 },
    #[error("Generation rejected: {message}")]
    Rejected { message: String },
    #[error("Malformed endpoint response: {0}")]
    Malformed(String),
}

impl EndpointError {
    /// Whether a retry could plausibly succeed
    ///
    /// Timeouts, connection failures and 5xx/429 answers are transient.
    /// An explicit rejection or a response we cannot parse is not; retrying
    /// those would re-run the same failing generation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EndpointError::Timeout | EndpointError::Network(_) | EndpointError::Unavailable { .. }
        )
    }
}

/// The remote AI generation endpoint
#[async_trait]
pub trait GenerationEndpointPort: Send + Sync {
    /// Submit one generation request. One call is one network attempt;
    /// retry policy lives in the caller.
    async fn submit(
        &self,
        action: CreditAction,
        payload: &serde_json::Value,
    ) -> Result<EndpointReply, EndpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(EndpointError::Timeout.is_transient());
        assert!(EndpointError::Network("connection reset".to_string()).is_transient());
        assert!(EndpointError::Unavailable { status: 503 }.is_transient());
        assert!(EndpointError::Unavailable { status: 429 }.is_transient());

        assert!(!EndpointError::Rejected {
            message: "prompt blocked".to_string()
        }
        .is_transient());
        assert!(!EndpointError::Malformed("not json".to_string()).is_transient());
    }
}
