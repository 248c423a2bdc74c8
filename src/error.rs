//! Error types for the engine and its storage seam.

use thiserror::Error;

use crate::domain::{SubmissionId, UserId};

/// Storage failures. A lost compare-and-swap is not an error; see
/// [`crate::store::WriteOutcome`].
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("progress store io error: {0}")]
  Io(String),
  #[error("progress store corruption: {0}")]
  Corrupt(String),
  #[error("progress store unavailable: {0}")]
  Unavailable(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("unknown user: {0}")]
  UnknownUser(UserId),
  #[error("user already registered: {0}")]
  UserExists(UserId),
  #[error("submission {0} is not approved")]
  SubmissionNotApproved(SubmissionId),
  #[error("submission {submission_id} belongs to {owner}, not {user_id}")]
  SubmissionUserMismatch { submission_id: SubmissionId, owner: UserId, user_id: UserId },
  /// The award was not applied; callers must surface this.
  #[error("gave up on user {user_id} after {attempts} conflicting writes")]
  ConflictRetriesExhausted { user_id: UserId, attempts: u32 },
  #[error(transparent)]
  Store(#[from] StoreError),
}
