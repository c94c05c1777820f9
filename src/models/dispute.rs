//! Dispute (reclamation) models

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Staff-managed vocabulary of dispute outcomes
#[derive(Debug, Clone, FromRow)]
pub struct DisputeChoice {
    pub id: i64,
    pub choice: String,
}

/// Complaint attached to exactly one order
#[derive(Debug, Clone, FromRow)]
pub struct Dispute {
    pub id: i64,
    pub order_id: i64,
    /// Owner of the underlying order
    pub customer_id: i64,
    pub created_at: DateTime<Utc>,
    pub dispute_text: String,
    pub decision_id: Option<i64>,
    /// Name of the chosen decision
    pub decision: Option<String>,
    pub decision_text: Option<String>,
    pub decision_date: Option<DateTime<Utc>>,
}

impl Dispute {
    pub fn url(&self) -> String {
        format!("/dispute/{}/", self.id)
    }

    pub fn status(&self) -> &str {
        self.decision.as_deref().unwrap_or("pending")
    }
}
