//! Error types for `gradebook-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::workflow::ResultStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("student {student_id} has no active subjects in class {class_id}")]
  EmptyRegistration { student_id: Uuid, class_id: Uuid },

  #[error("invalid grade band table: {0}")]
  InvalidGradeBand(String),

  #[error("result is incomplete: {}", describe_incomplete(.missing_subjects, .attendance_missing))]
  IncompleteResult {
    /// Names of registered subjects that have no score record yet.
    missing_subjects:   Vec<String>,
    attendance_missing: bool,
  },

  #[error("concurrent modification: {0}")]
  ConcurrentModification(String),

  #[error("user {user_id} may not approve results for class {class_id}")]
  ApprovalNotAuthorized { user_id: Uuid, class_id: Uuid },

  #[error("rating must be between 1 and 5, got {0}")]
  InvalidRating(u8),

  #[error("score record is locked")]
  ScoreLocked,

  #[error("result {0} is pending approval; its scores cannot change")]
  ResultUnderReview(Uuid),

  #[error("result {0} is approved and can no longer be edited")]
  ResultFrozen(Uuid),

  #[error("rejecting a result requires a comment")]
  RejectionCommentRequired,

  #[error("illegal transition from {from} to {to}")]
  IllegalTransition { from: ResultStatus, to: ResultStatus },

  #[error("{0} not found")]
  NotFound(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a collaborator's error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

fn describe_incomplete(missing: &[String], attendance_missing: &bool) -> String {
  let mut parts = Vec::new();
  if !missing.is_empty() {
    parts.push(format!("missing scores for {}", missing.join(", ")));
  }
  if *attendance_missing {
    parts.push("attendance not recorded".to_owned());
  }
  parts.join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
