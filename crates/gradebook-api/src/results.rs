//! Handlers for `/results`.
//!
//! Every response carrying a single result sets `ETag` to the fingerprint of
//! its snapshot. `approve` honours `If-Match` against that fingerprint and
//! answers `412 Precondition Failed` when the figures moved on.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use gradebook_core::{
  etag::compute_etag,
  result::{CompiledResult, Narrative},
  store::ResultStore,
  term::{AcademicTerm, Term},
};
use gradebook_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

fn with_etag(result: CompiledResult) -> Result<Response, ApiError> {
  let etag = compute_etag(&result.snapshot)?;
  Ok(([(header::ETAG, etag)], Json(result)).into_response())
}

/// `If-Match` value, ignoring the `*` wildcard.
fn if_match(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
  let Some(value) = headers.get(header::IF_MATCH) else {
    return Ok(None);
  };
  let value = value
    .to_str()
    .map_err(|_| ApiError::BadRequest("If-Match is not valid ASCII".to_owned()))?
    .trim();
  Ok((value != "*").then(|| value.to_owned()))
}

// ─── Compile and read ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompileBody {
  pub student_id:    Uuid,
  pub class_id:      Uuid,
  pub term:          Term,
  pub academic_year: u16,
}

/// `POST /results/compile`
pub async fn compile<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Json(body): Json<CompileBody>,
) -> Result<Response, ApiError> {
  let term = AcademicTerm::new(body.term, body.academic_year);
  with_etag(engine.compile(body.student_id, body.class_id, term).await?)
}

/// `GET /results/{id}`
pub async fn get_one<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
  with_etag(engine.get_result(id).await?)
}

/// `DELETE /results/{id}`: administrative purge.
pub async fn purge<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  engine.purge(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Workflow ────────────────────────────────────────────────────────────────

/// `POST /results/{id}/submit`
pub async fn submit<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
  with_etag(engine.submit_for_approval(id).await?)
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
  pub approver_id: Uuid,
}

/// `POST /results/{id}/approve`
pub async fn approve<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<ApproveBody>,
) -> Result<Response, ApiError> {
  let expected = if_match(&headers)?;
  with_etag(engine.approve(id, body.approver_id, expected).await?)
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
  pub approver_id: Uuid,
  #[serde(default)]
  pub comment:     String,
}

/// `POST /results/{id}/reject`
pub async fn reject<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RejectBody>,
) -> Result<Response, ApiError> {
  with_etag(engine.reject(id, body.approver_id, body.comment).await?)
}

/// `POST /results/{id}/reopen`
pub async fn reopen<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
  with_etag(engine.reopen(id).await?)
}

/// `PUT /results/{id}/narrative`. Body is the full narrative (camelCase).
pub async fn set_narrative<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(id): Path<Uuid>,
  Json(narrative): Json<Narrative>,
) -> Result<Response, ApiError> {
  with_etag(engine.set_narrative(id, narrative).await?)
}
