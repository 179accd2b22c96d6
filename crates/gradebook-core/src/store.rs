//! Collaborator traits consumed by the engine.
//!
//! The traits are implemented by storage backends (e.g.
//! `gradebook-store-sqlite`) or adapters onto other school systems. The engine
//! depends on these abstractions, never on a concrete backend.
//!
//! All methods return `Send` futures so implementations can be shared across a
//! multi-threaded runtime.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  rating::StudentRatings,
  result::{CompiledResult, ResultKey},
  school::{AttendanceTotals, Student, SubjectAssignment},
  score::{ScoreKey, ScoreRecord},
  term::AcademicTerm,
};

// ─── Scores ──────────────────────────────────────────────────────────────────

/// System of record for raw score entries.
pub trait ScoreRecordRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_score(
    &self,
    key: ScoreKey,
  ) -> impl Future<Output = Result<Option<ScoreRecord>, Self::Error>> + Send + '_;

  /// Every record for one subject assignment in `term`.
  fn list_by_subject_cohort(
    &self,
    subject_assignment_id: Uuid,
    term: AcademicTerm,
  ) -> impl Future<Output = Result<Vec<ScoreRecord>, Self::Error>> + Send + '_;

  /// Every record for any subject assignment of `class_id` in `term`.
  fn list_by_student_cohort(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> impl Future<Output = Result<Vec<ScoreRecord>, Self::Error>> + Send + '_;

  /// Insert or replace the record at `record.key`.
  fn upsert_score(
    &self,
    record: ScoreRecord,
  ) -> impl Future<Output = Result<ScoreRecord, Self::Error>> + Send + '_;
}

// ─── School facts ────────────────────────────────────────────────────────────

pub trait SubjectRegistrationService: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Subject assignments the student is actively registered for.
  fn active_subjects_for(
    &self,
    student_id: Uuid,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;
}

pub trait ClassRoster: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Students enrolled in `class_id` for `term`.
  fn cohort_members(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;
}

pub trait SubjectCatalog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn subject_assignment(
    &self,
    subject_assignment_id: Uuid,
  ) -> impl Future<Output = Result<Option<SubjectAssignment>, Self::Error>> + Send + '_;

  fn subject_assignments(
    &self,
    class_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SubjectAssignment>, Self::Error>> + Send + '_;
}

pub trait AttendanceAdapter: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `None` when no attendance has been captured for the term.
  fn get_attendance(
    &self,
    student_id: Uuid,
    term: AcademicTerm,
  ) -> impl Future<Output = Result<Option<AttendanceTotals>, Self::Error>> + Send + '_;
}

pub trait RatingRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn ratings_for(
    &self,
    student_id: Uuid,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> impl Future<Output = Result<StudentRatings, Self::Error>> + Send + '_;
}

// ─── Compiled results ────────────────────────────────────────────────────────

/// All stored results of one class cohort plus the cohort version.
#[derive(Debug, Clone, Default)]
pub struct CohortResults {
  pub version: u64,
  pub results: Vec<CompiledResult>,
}

/// Outcome of [`ResultRepository::save_cohort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
  Saved { version: u64 },
  /// The stored version moved on since it was read.
  Conflict { current: u64 },
}

pub trait ResultRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_result(
    &self,
    result_id: Uuid,
  ) -> impl Future<Output = Result<Option<CompiledResult>, Self::Error>> + Send + '_;

  fn find_result(
    &self,
    key: ResultKey,
  ) -> impl Future<Output = Result<Option<CompiledResult>, Self::Error>> + Send + '_;

  /// Every stored result for `student_id` in `term`, across classes.
  fn results_for_student(
    &self,
    student_id: Uuid,
    term: AcademicTerm,
  ) -> impl Future<Output = Result<Vec<CompiledResult>, Self::Error>> + Send + '_;

  fn list_cohort(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> impl Future<Output = Result<CohortResults, Self::Error>> + Send + '_;

  /// Upsert `results` and bump the cohort version in one atomic step, provided
  /// the stored version still equals `expected_version`.
  fn save_cohort(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
    expected_version: u64,
    results: Vec<CompiledResult>,
  ) -> impl Future<Output = Result<SaveOutcome, Self::Error>> + Send + '_;

  /// Administrative purge. Returns whether a result was deleted.
  fn delete_result(
    &self,
    result_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Approval and audit ──────────────────────────────────────────────────────

pub trait ApprovalAuthority: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn can_approve(
    &self,
    user_id: Uuid,
    class_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

pub trait AuditSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Record that an approved result was sent back to draft by a recompile.
  fn record_invalidation(
    &self,
    compiled_result_id: Uuid,
    reason: String,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Everything the engine needs from its surroundings.
pub trait ResultStore:
  ScoreRecordRepository
  + SubjectRegistrationService
  + ClassRoster
  + SubjectCatalog
  + AttendanceAdapter
  + RatingRepository
  + ResultRepository
  + ApprovalAuthority
  + AuditSink
{
}

impl<T> ResultStore for T where
  T: ScoreRecordRepository
    + SubjectRegistrationService
    + ClassRoster
    + SubjectCatalog
    + AttendanceAdapter
    + RatingRepository
    + ResultRepository
    + ApprovalAuthority
    + AuditSink
{
}
