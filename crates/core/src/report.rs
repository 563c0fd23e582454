//! Outcome of one dispatch run.

use serde::{Deserialize, Serialize};

use crate::id::PinId;

/// Result for a single queue entry within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub entry_id: PinId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_pin_id: Option<String>,
    #[serde(rename = "errorText", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResult {
    pub fn posted(entry_id: PinId, external_pin_id: impl Into<String>) -> Self {
        Self {
            entry_id,
            success: true,
            external_pin_id: Some(external_pin_id.into()),
            error: None,
        }
    }

    pub fn failed(entry_id: PinId, error: impl Into<String>) -> Self {
        Self {
            entry_id,
            success: false,
            external_pin_id: None,
            error: Some(error.into()),
        }
    }
}

/// Batch summary returned to whatever triggered the run.
///
/// `results` keeps the processing order (oldest due first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub processed_count: usize,
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    pub fn push(&mut self, result: DispatchResult) {
        self.results.push(result);
        self.processed_count = self.results.len();
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.processed_count - self.succeeded()
    }
}
