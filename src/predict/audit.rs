//! Audit records for successful predictions.

use parking_lot::Mutex;
use serde::Serialize;

use crate::db::UserId;

/// Longest prefix of the input text kept in an audit entry
pub const MAX_AUDIT_TEXT_CHARS: usize = 1000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionAudit {
    pub timestamp: String,
    pub user_id: Option<UserId>,
    pub text: String,
    pub prediction: serde_json::Value,
}

impl PredictionAudit {
    pub fn new(user_id: Option<UserId>, text: &str, prediction: serde_json::Value) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_id,
            text: truncate_for_audit(text),
            prediction,
        }
    }
}

/// Keep the first 1000 characters, marking the cut with `...`
pub fn truncate_for_audit(text: &str) -> String {
    match text.char_indices().nth(MAX_AUDIT_TEXT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &PredictionAudit);
}

/// Emits each entry as a structured event on the `audit` target
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &PredictionAudit) {
        let json = serde_json::to_string(entry).unwrap_or_default();
        tracing::info!(target: "audit", user_id = ?entry.user_id, entry = %json, "Prediction served");
    }
}

/// Keeps entries in memory
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<PredictionAudit>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<PredictionAudit> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &PredictionAudit) {
        self.entries.lock().push(entry.clone());
    }
}
