//! Aggregation: per-student totals and per-subject cohort statistics.
//!
//! Everything here is a pure function of the score records handed in. Cohort
//! statistics are always recomputed from the full cohort, never patched.
//!
//! A registered subject with no score record produces a line with no score.
//! Such a line is excluded from sums and denominators and marks the totals as
//! incomplete; it is never treated as a zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  score::{CA1_MAX, CA2_MAX, EXAM_MAX, ScoreRecord},
  term::AcademicTerm,
};

/// Round half-up to two decimal places.
pub fn round_2dp(value: Decimal) -> Decimal {
  value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Mean of `values` rounded to two places; `None` for an empty slice.
pub fn mean_2dp(values: &[Decimal]) -> Option<Decimal> {
  if values.is_empty() {
    return None;
  }
  let sum: Decimal = values.iter().copied().sum();
  Some(round_2dp(sum / Decimal::from(values.len())))
}

// ─── Subject cohort ──────────────────────────────────────────────────────────

/// Class statistics for one subject assignment in one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCohortStats {
  pub subject_assignment_id: Uuid,
  pub term:                  AcademicTerm,
  pub class_average:         Option<Decimal>,
  pub class_min:             Option<Decimal>,
  pub class_max:             Option<Decimal>,
  pub sample_size:           usize,
}

/// Compute statistics over the totals of `records`.
///
/// Callers are responsible for restricting `records` to the cohort (roster
/// members registered for the subject).
pub fn cohort_stats<'a>(
  subject_assignment_id: Uuid,
  term: AcademicTerm,
  records: impl IntoIterator<Item = &'a ScoreRecord>,
) -> SubjectCohortStats {
  let totals: Vec<Decimal> = records.into_iter().map(ScoreRecord::total).collect();
  SubjectCohortStats {
    subject_assignment_id,
    term,
    class_average: mean_2dp(&totals),
    class_min: totals.iter().min().copied(),
    class_max: totals.iter().max().copied(),
    sample_size: totals.len(),
  }
}

// ─── Student totals ──────────────────────────────────────────────────────────

/// Clamped score components for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectScore {
  pub ca1:   Decimal,
  pub ca2:   Decimal,
  pub exam:  Decimal,
  pub total: Decimal,
}

impl From<&ScoreRecord> for SubjectScore {
  fn from(r: &ScoreRecord) -> Self {
    Self {
      ca1:   r.ca1.clamp(Decimal::ZERO, CA1_MAX),
      ca2:   r.ca2.clamp(Decimal::ZERO, CA2_MAX),
      exam:  r.exam.clamp(Decimal::ZERO, EXAM_MAX),
      total: r.total(),
    }
  }
}

/// A registered subject and its score, if one has been entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreLine {
  pub subject_assignment_id: Uuid,
  pub score:                 Option<SubjectScore>,
}

impl ScoreLine {
  pub fn is_incomplete(&self) -> bool { self.score.is_none() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentTotals {
  pub lines:         Vec<ScoreLine>,
  /// Sum of complete line totals.
  pub total_score:   Decimal,
  /// `total_score / complete lines`, rounded; `None` when no line is complete.
  pub average_score: Option<Decimal>,
}

impl StudentTotals {
  pub fn is_incomplete(&self) -> bool { self.lines.iter().any(ScoreLine::is_incomplete) }

  pub fn complete_lines(&self) -> usize {
    self.lines.iter().filter(|l| !l.is_incomplete()).count()
  }
}

/// Totals for one student over exactly the `registered` subjects.
///
/// `records` may contain records for other subjects; they are ignored, so a
/// stray score for an unregistered subject never reaches the result.
pub fn student_totals(
  student_id: Uuid,
  class_id: Uuid,
  registered: &[Uuid],
  records: &[ScoreRecord],
) -> Result<StudentTotals> {
  if registered.is_empty() {
    return Err(Error::EmptyRegistration { student_id, class_id });
  }

  let mut seen = Vec::with_capacity(registered.len());
  let mut lines = Vec::with_capacity(registered.len());
  for &subject_id in registered {
    if seen.contains(&subject_id) {
      continue;
    }
    seen.push(subject_id);

    let score = records
      .iter()
      .find(|r| r.key.student_id == student_id && r.key.subject_assignment_id == subject_id)
      .map(SubjectScore::from);
    lines.push(ScoreLine { subject_assignment_id: subject_id, score });
  }

  let complete: Vec<Decimal> =
    lines.iter().filter_map(|l| l.score.map(|s| s.total)).collect();
  let total_score: Decimal = complete.iter().copied().sum();
  let average_score = if complete.is_empty() {
    None
  } else {
    Some(round_2dp(total_score / Decimal::from(complete.len())))
  };

  Ok(StudentTotals { lines, total_score, average_score })
}
