//! Handlers for class and student scoped listings.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/classes/{class_id}/subjects/{subject_assignment_id}/stats` | Subject cohort statistics |
//! | `GET`  | `/classes/{class_id}/results` | Stored results, best position first |
//! | `POST` | `/classes/{class_id}/results/compile` | Compile every member |
//! | `GET`  | `/students/{student_id}/results` | One student's results across classes |
//!
//! All take `?term&academic_year`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use gradebook_core::{
  aggregate::SubjectCohortStats, result::CompiledResult, store::ResultStore,
};
use gradebook_engine::Engine;
use uuid::Uuid;

use crate::{TermQuery, error::ApiError};

/// `GET /classes/{class_id}/subjects/{subject_assignment_id}/stats`
pub async fn subject_stats<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path((class_id, subject_assignment_id)): Path<(Uuid, Uuid)>,
  Query(term): Query<TermQuery>,
) -> Result<Json<SubjectCohortStats>, ApiError> {
  let stats = engine
    .subject_cohort_stats(class_id, subject_assignment_id, term.into())
    .await?;
  Ok(Json(stats))
}

/// `GET /classes/{class_id}/results`
pub async fn list_class<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(class_id): Path<Uuid>,
  Query(term): Query<TermQuery>,
) -> Result<Json<Vec<CompiledResult>>, ApiError> {
  Ok(Json(engine.list_cohort_results(class_id, term.into()).await?))
}

/// `POST /classes/{class_id}/results/compile`
pub async fn compile_class<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(class_id): Path<Uuid>,
  Query(term): Query<TermQuery>,
) -> Result<Json<Vec<CompiledResult>>, ApiError> {
  Ok(Json(engine.compile_cohort(class_id, term.into()).await?))
}

/// `GET /students/{student_id}/results`
pub async fn list_student<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Path(student_id): Path<Uuid>,
  Query(term): Query<TermQuery>,
) -> Result<Json<Vec<CompiledResult>>, ApiError> {
  Ok(Json(engine.student_results(student_id, term.into()).await?))
}
