//! The compiled result, aggregate root of the engine.
//!
//! A [`CompiledResult`] splits into a derived [`ResultSnapshot`] (a pure
//! function of the inputs, no timestamps) and the human-entered parts around
//! it: narrative, workflow status and the last review. Equality of snapshots
//! is how a recompile detects that an approved result has gone stale.
//!
//! Documents serialise with camelCase field names.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, rating::RatedItem, term::AcademicTerm, workflow::ResultStatus};

/// Unique key of a compiled result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultKey {
  pub student_id: Uuid,
  pub class_id:   Uuid,
  pub term:       AcademicTerm,
}

/// One subject row of the result sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultLine {
  pub subject_assignment_id: Uuid,
  pub subject_name:          String,
  pub subject_teacher:       String,
  pub ca1:                   Option<Decimal>,
  pub ca2:                   Option<Decimal>,
  pub exam:                  Option<Decimal>,
  pub total:                 Option<Decimal>,
  pub class_average:         Option<Decimal>,
  pub class_min:             Option<Decimal>,
  pub class_max:             Option<Decimal>,
  pub grade:                 Option<String>,
  pub remark:                Option<String>,
  /// No score record exists yet for this registered subject.
  pub incomplete:            bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSnapshot {
  pub times_present:         u32,
  pub total_attendance_days: u32,
}

/// Every derived field of a compiled result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
  pub lines:          Vec<ResultLine>,
  pub total_score:    Decimal,
  pub average_score:  Option<Decimal>,
  /// Mean of the ranked cohort's average scores.
  pub class_average:  Option<Decimal>,
  pub position:       Option<u32>,
  /// Ordinal rendering of `position`, e.g. `"2nd"`.
  pub position_label: Option<String>,
  pub total_students: u32,
  pub attendance:     Option<AttendanceSnapshot>,
  pub affective:      Option<Vec<RatedItem>>,
  pub psychomotor:    Option<Vec<RatedItem>>,
}

impl ResultSnapshot {
  pub fn missing_subjects(&self) -> Vec<String> {
    self
      .lines
      .iter()
      .filter(|l| l.incomplete)
      .map(|l| l.subject_name.clone())
      .collect()
  }

  /// Every line scored and attendance on file.
  pub fn check_complete(&self) -> Result<()> {
    let missing_subjects = self.missing_subjects();
    let attendance_missing = self.attendance.is_none();
    if missing_subjects.is_empty() && !attendance_missing {
      Ok(())
    } else {
      Err(Error::IncompleteResult { missing_subjects, attendance_missing })
    }
  }
}

/// Comments and signatures entered by staff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narrative {
  pub class_teacher_comment:   Option<String>,
  pub principal_comment:       Option<String>,
  pub class_teacher_signature: Option<String>,
  pub principal_signature:     Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
  Approved,
  Rejected,
}

/// The most recent approver decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
  pub reviewer_id: Uuid,
  pub decision:    Decision,
  pub comment:     Option<String>,
  pub decided_at:  DateTime<Utc>,
}

/// An invalidation saved with its result but not yet accepted by the audit
/// sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAudit {
  pub reason:         String,
  pub invalidated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledResult {
  pub result_id:      Uuid,
  pub key:            ResultKey,
  pub snapshot:       ResultSnapshot,
  pub narrative:      Narrative,
  pub status:         ResultStatus,
  pub review:         Option<Review>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub pending_audits: Vec<PendingAudit>,
}

impl CompiledResult {
  /// A fresh draft for `key`.
  pub fn draft(key: ResultKey, snapshot: ResultSnapshot) -> Self {
    Self {
      result_id: Uuid::new_v4(),
      key,
      snapshot,
      narrative: Narrative::default(),
      status: ResultStatus::Draft,
      review: None,
      pending_audits: vec![],
    }
  }
}
