//! Prediction gateway.
//!
//! Text is handed to a [`Predictor`] exactly once, bounded by a timeout. The
//! predictor's JSON payload is relayed unmodified and, on success only, an
//! audit entry is written to the configured [`AuditSink`].

mod audit;
mod http;

pub use audit::{
    truncate_for_audit, AuditSink, MemoryAuditSink, PredictionAudit, TracingAuditSink,
    MAX_AUDIT_TEXT_CHARS,
};
pub use http::HttpPredictor;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::db::UserId;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("text is required")]
    InvalidInput,
    #[error("predictor did not answer within {0:?}")]
    Timeout(Duration),
    #[error("predictor returned status {0}")]
    UpstreamStatus(u16),
    #[error("predictor request failed: {0}")]
    Transport(String),
    #[error("predictor returned an unreadable body: {0}")]
    InvalidResponse(String),
}

impl PredictError {
    /// True for every failure of the predictor itself, as opposed to bad input
    pub fn is_prediction_failure(&self) -> bool {
        !matches!(self, PredictError::InvalidInput)
    }
}

/// The external model service
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, text: &str) -> Result<serde_json::Value, PredictError>;
}

pub struct PredictionGateway {
    predictor: Arc<dyn Predictor>,
    audit: Arc<dyn AuditSink>,
    timeout: Duration,
}

impl PredictionGateway {
    pub fn new(predictor: Arc<dyn Predictor>, audit: Arc<dyn AuditSink>, timeout: Duration) -> Self {
        Self {
            predictor,
            audit,
            timeout,
        }
    }

    pub async fn predict(
        &self,
        text: &str,
        user_id: Option<UserId>,
    ) -> Result<serde_json::Value, PredictError> {
        if text.is_empty() {
            return Err(PredictError::InvalidInput);
        }

        let outcome = match tokio::time::timeout(self.timeout, self.predictor.predict(text)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PredictError::Timeout(self.timeout)),
        };

        let prediction = match outcome {
            Ok(prediction) => prediction,
            Err(e) => {
                tracing::error!(user_id = ?user_id, error = %e, "Prediction failed");
                return Err(e);
            }
        };

        self.audit
            .record(&PredictionAudit::new(user_id, text, prediction.clone()));
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPredictor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Predictor for FixedPredictor {
        async fn predict(&self, _text: &str) -> Result<serde_json::Value, PredictError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"prediction": "Normal", "confidence": 0.9731}))
        }
    }

    struct SlowPredictor;

    #[async_trait]
    impl Predictor for SlowPredictor {
        async fn predict(&self, _text: &str) -> Result<serde_json::Value, PredictError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({"prediction": "late"}))
        }
    }

    struct BrokenPredictor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Predictor for BrokenPredictor {
        async fn predict(&self, _text: &str) -> Result<serde_json::Value, PredictError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PredictError::UpstreamStatus(503))
        }
    }

    fn gateway(predictor: Arc<dyn Predictor>, timeout: Duration) -> (PredictionGateway, Arc<MemoryAuditSink>) {
        let audit = Arc::new(MemoryAuditSink::new());
        (PredictionGateway::new(predictor, audit.clone(), timeout), audit)
    }

    #[tokio::test]
    async fn test_success_relays_payload_and_audits() {
        let predictor = Arc::new(FixedPredictor {
            calls: AtomicUsize::new(0),
        });
        let (gateway, audit) = gateway(predictor.clone(), Duration::from_secs(30));

        let result = gateway.predict("I can't sleep", Some(2)).await.unwrap();
        assert_eq!(result, json!({"prediction": "Normal", "confidence": 0.9731}));
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, Some(2));
        assert_eq!(entries[0].text, "I can't sleep");
        assert_eq!(entries[0].prediction, result);
    }

    #[tokio::test]
    async fn test_anonymous_prediction_audits_null_user() {
        let predictor = Arc::new(FixedPredictor {
            calls: AtomicUsize::new(0),
        });
        let (gateway, audit) = gateway(predictor, Duration::from_secs(30));

        gateway.predict("hello", None).await.unwrap();
        assert_eq!(audit.entries()[0].user_id, None);
    }

    #[tokio::test]
    async fn test_empty_text_never_reaches_predictor() {
        let predictor = Arc::new(FixedPredictor {
            calls: AtomicUsize::new(0),
        });
        let (gateway, audit) = gateway(predictor.clone(), Duration::from_secs(30));

        let err = gateway.predict("", Some(1)).await.unwrap_err();
        assert!(matches!(err, PredictError::InvalidInput));
        assert!(!err.is_prediction_failure());
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_fails_without_audit() {
        let (gateway, audit) = gateway(Arc::new(SlowPredictor), Duration::from_millis(20));

        let err = gateway.predict("hello", None).await.unwrap_err();
        assert!(matches!(err, PredictError::Timeout(_)));
        assert!(err.is_prediction_failure());
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_retried() {
        let predictor = Arc::new(BrokenPredictor {
            calls: AtomicUsize::new(0),
        });
        let (gateway, audit) = gateway(predictor.clone(), Duration::from_secs(30));

        let err = gateway.predict("hello", Some(1)).await.unwrap_err();
        assert!(matches!(err, PredictError::UpstreamStatus(503)));
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);
        assert!(audit.is_empty());
    }
}
