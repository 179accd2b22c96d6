//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape
//! `{"error": "<kind>", "message": "<text>", "details": <kind-specific>}`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use gradebook_core::Error;
use serde_json::{Value, json};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Domain(#[from] Error),

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl ApiError {
  fn parts(&self) -> (StatusCode, &'static str, Value) {
    let Self::Domain(e) = self else {
      return (StatusCode::BAD_REQUEST, "bad_request", Value::Null);
    };
    match e {
      Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", Value::Null),
      Error::EmptyRegistration { student_id, class_id } => (
        StatusCode::BAD_REQUEST,
        "empty_registration",
        json!({ "student_id": student_id, "class_id": class_id }),
      ),
      Error::InvalidRating(v) => {
        (StatusCode::BAD_REQUEST, "invalid_rating", json!({ "rating": v }))
      }
      Error::RejectionCommentRequired => {
        (StatusCode::BAD_REQUEST, "rejection_comment_required", Value::Null)
      }
      Error::ApprovalNotAuthorized { user_id, class_id } => (
        StatusCode::FORBIDDEN,
        "approval_not_authorized",
        json!({ "user_id": user_id, "class_id": class_id }),
      ),
      Error::IncompleteResult { missing_subjects, attendance_missing } => (
        StatusCode::CONFLICT,
        "incomplete_result",
        json!({
          "missing_subjects":   missing_subjects,
          "attendance_missing": attendance_missing,
        }),
      ),
      Error::IllegalTransition { from, to } => (
        StatusCode::CONFLICT,
        "illegal_transition",
        json!({ "from": from, "to": to }),
      ),
      Error::ScoreLocked => (StatusCode::CONFLICT, "score_locked", Value::Null),
      Error::ResultUnderReview(id) => {
        (StatusCode::CONFLICT, "result_under_review", json!({ "result_id": id }))
      }
      Error::ResultFrozen(id) => {
        (StatusCode::CONFLICT, "result_frozen", json!({ "result_id": id }))
      }
      Error::ConcurrentModification(_) => {
        (StatusCode::PRECONDITION_FAILED, "concurrent_modification", Value::Null)
      }
      Error::InvalidGradeBand(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, "invalid_grade_band", Value::Null)
      }
      Error::Serialization(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, "serialization", Value::Null)
      }
      Error::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store", Value::Null),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, kind, details) = self.parts();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = json!({ "error": kind, "message": self.to_string(), "details": details });
    (status, Json(body)).into_response()
  }
}
