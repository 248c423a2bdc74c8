//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable so the grading flow and the engine can evolve independently.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{BadgeId, Submission};

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterIn {
    /// Generated when absent.
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

/// Sent by the grading flow when a submission transitions to approved.
#[derive(Debug, Deserialize)]
pub struct ApprovalIn {
    pub submission: Submission,
    #[serde(default, rename = "grantedBadges")]
    pub granted_badges: Vec<BadgeId>,
    /// Defaults to the time the request is handled.
    #[serde(default, rename = "approvedAt", with = "time::serde::rfc3339::option")]
    pub approved_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct MilestoneIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub milestone: String,
    #[serde(default, rename = "completedAt", with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub error: String,
}
