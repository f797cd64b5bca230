use serde::{Deserialize, Serialize};

use crate::analytics::Period;
use crate::sms::{RawMessage, Transaction};

// ============================================================
// Request bodies
// ============================================================

#[derive(Debug, Deserialize)]
pub struct SmsBatchRequest {
    pub user_id: String,
    #[serde(default)]
    pub data: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsRequest {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub period: Period,
}

// ============================================================
// Response types
// ============================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub model_version: u64,
    pub users_tracked: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
