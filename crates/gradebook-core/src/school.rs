//! Facts owned by systems outside the engine: who is in a class, which
//! subjects a class offers, and attendance totals.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A roster member of a class for a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub student_id: Uuid,
  pub first_name: String,
  pub last_name:  String,
}

/// A subject taught to a class by a particular teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAssignment {
  pub subject_assignment_id: Uuid,
  pub class_id:              Uuid,
  pub subject_name:          String,
  pub subject_teacher:       String,
  /// Position of the subject on the result sheet.
  pub sort_order:            i64,
}

/// Attendance totals for one student/term. Captured elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceTotals {
  pub present:       u32,
  pub required_days: u32,
}
