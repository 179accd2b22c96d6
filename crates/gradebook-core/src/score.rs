//! Score records, one row per (student, subject assignment, term).
//!
//! Raw components are kept exactly as entered. The total is always derived by
//! clamping each component into its band, so an out-of-range entry can never
//! push a total above 100 or below 0.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::term::AcademicTerm;

pub const CA1_MAX: Decimal = Decimal::from_parts(20, 0, 0, false, 0);
pub const CA2_MAX: Decimal = Decimal::from_parts(20, 0, 0, false, 0);
pub const EXAM_MAX: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Ownership state of a score record.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScoreStatus {
  /// Still being entered by the subject teacher.
  #[default]
  Draft,
  Submitted,
  /// No further edits are accepted.
  Locked,
}

/// Unique key of a [`ScoreRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreKey {
  pub student_id:            Uuid,
  pub subject_assignment_id: Uuid,
  pub term:                  AcademicTerm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
  pub key:    ScoreKey,
  pub ca1:    Decimal,
  pub ca2:    Decimal,
  pub exam:   Decimal,
  pub status: ScoreStatus,
}

impl ScoreRecord {
  pub fn new(key: ScoreKey, ca1: Decimal, ca2: Decimal, exam: Decimal) -> Self {
    Self { key, ca1, ca2, exam, status: ScoreStatus::Draft }
  }

  /// `clamp(ca1, 0, 20) + clamp(ca2, 0, 20) + clamp(exam, 0, 60)`.
  pub fn total(&self) -> Decimal { clamped_total(self.ca1, self.ca2, self.exam) }
}

pub fn clamped_total(ca1: Decimal, ca2: Decimal, exam: Decimal) -> Decimal {
  ca1.clamp(Decimal::ZERO, CA1_MAX)
    + ca2.clamp(Decimal::ZERO, CA2_MAX)
    + exam.clamp(Decimal::ZERO, EXAM_MAX)
}
