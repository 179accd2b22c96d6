//! Handlers for `/scores`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/scores` | `?subject_assignment_id&term&academic_year` |
//! | `PUT`  | `/scores` | Body: [`ScoreBody`]; recompiles the class cohort |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use gradebook_core::{
  score::{ScoreKey, ScoreRecord, ScoreStatus},
  store::ResultStore,
  term::{AcademicTerm, Term},
};
use gradebook_engine::Engine;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub subject_assignment_id: Uuid,
  pub term:                  Term,
  pub academic_year:         u16,
}

/// `GET /scores?subject_assignment_id=<id>&term=first&academic_year=2025`
pub async fn list<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ScoreRecord>>, ApiError> {
  let scores = engine
    .subject_scores(
      params.subject_assignment_id,
      AcademicTerm::new(params.term, params.academic_year),
    )
    .await?;
  Ok(Json(scores))
}

/// JSON body accepted by `PUT /scores`.
#[derive(Debug, Deserialize)]
pub struct ScoreBody {
  pub student_id:            Uuid,
  pub subject_assignment_id: Uuid,
  pub term:                  Term,
  pub academic_year:         u16,
  pub ca1:                   Decimal,
  pub ca2:                   Decimal,
  pub exam:                  Decimal,
  /// Defaults to `draft`.
  #[serde(default)]
  pub status:                ScoreStatus,
}

impl From<ScoreBody> for ScoreRecord {
  fn from(b: ScoreBody) -> Self {
    ScoreRecord {
      key:    ScoreKey {
        student_id:            b.student_id,
        subject_assignment_id: b.subject_assignment_id,
        term:                  AcademicTerm::new(b.term, b.academic_year),
      },
      ca1:    b.ca1,
      ca2:    b.ca2,
      exam:   b.exam,
      status: b.status,
    }
  }
}

/// `PUT /scores`, returning the stored record.
pub async fn upsert<S: ResultStore + 'static>(
  State(engine): State<Arc<Engine<S>>>,
  Json(body): Json<ScoreBody>,
) -> Result<Json<ScoreRecord>, ApiError> {
  let saved = engine.record_score(body.into()).await?;
  Ok(Json(saved))
}
