//! HTTP endpoint handlers. These are thin wrappers that forward to the engine.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}, Json};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::engine::ApprovalRequest;
use crate::error::EngineError;
use crate::protocol::*;
use crate::state::AppState;

/// Engine errors mapped onto status codes.
pub struct ApiError(StatusCode, String);

impl From<EngineError> for ApiError {
  fn from(e: EngineError) -> Self {
    let status = match &e {
      EngineError::UnknownUser(_) => StatusCode::NOT_FOUND,
      EngineError::UserExists(_) => StatusCode::CONFLICT,
      EngineError::SubmissionNotApproved(_) | EngineError::SubmissionUserMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
      EngineError::ConflictRetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
      EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError(status, e.to_string())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.0, Json(ErrorOut { error: self.1 })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_badges(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.engine.catalog().clone())
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_user(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RegisterIn>,
) -> Result<impl IntoResponse, ApiError> {
  let user_id = body.user_id.unwrap_or_else(|| Uuid::new_v4().to_string());
  let progress = state.engine.register_user(&user_id).await?;
  Ok((StatusCode::CREATED, Json(progress)))
}

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(state.engine.progress(&user_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(submission = %body.submission.id, user_id = %body.submission.user_id))]
pub async fn http_post_approval(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ApprovalIn>,
) -> Result<impl IntoResponse, ApiError> {
  let Some(challenge) = state.get_challenge(&body.submission.challenge_id).await else {
    warn!(target: "tradecraft", challenge = %body.submission.challenge_id, "Approval for unknown challenge");
    return Err(ApiError(StatusCode::NOT_FOUND, format!("Unknown challengeId: {}", body.submission.challenge_id)));
  };
  let user_id = body.submission.user_id.clone();
  let req = ApprovalRequest {
    challenge,
    submission: body.submission,
    granted_badges: body.granted_badges,
    approved_at: body.approved_at.unwrap_or_else(OffsetDateTime::now_utc),
  };
  let topics = state.topics().await;
  let outcome = state.engine.apply_approval(&user_id, &req, &topics).await?;
  info!(target: "tradecraft", %user_id, status = ?outcome.status, xp = outcome.cumulative_xp, "HTTP approval handled");
  Ok(Json(outcome))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, milestone = %body.milestone))]
pub async fn http_post_milestone(
  State(state): State<Arc<AppState>>,
  Json(body): Json<MilestoneIn>,
) -> Result<impl IntoResponse, ApiError> {
  let at = body.completed_at.unwrap_or_else(OffsetDateTime::now_utc);
  let topics = state.topics().await;
  let outcome = state.engine.award_milestone(&body.user_id, &body.milestone, at, &topics).await?;
  Ok(Json(outcome))
}
