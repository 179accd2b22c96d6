//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Utc;
use gradebook_core::{
  rating::{AffectiveRating, Rating, StudentRatings},
  result::{CompiledResult, ResultKey, ResultSnapshot},
  school::{AttendanceTotals, Student, SubjectAssignment},
  score::{ScoreKey, ScoreRecord, ScoreStatus},
  store::{
    ApprovalAuthority, AttendanceAdapter, AuditSink, ClassRoster, RatingRepository,
    ResultRepository, SaveOutcome, ScoreRecordRepository, SubjectCatalog,
    SubjectRegistrationService,
  },
  term::{AcademicTerm, Term},
  workflow::ResultStatus,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn term() -> AcademicTerm { AcademicTerm::new(Term::First, 2025) }

fn dec(v: i64) -> Decimal { Decimal::from(v) }

async fn seed_subject(s: &SqliteStore, class_id: Uuid, name: &str, sort_order: i64) -> Uuid {
  let assignment = SubjectAssignment {
    subject_assignment_id: Uuid::new_v4(),
    class_id,
    subject_name: name.to_owned(),
    subject_teacher: "Mr Adeyemi".to_owned(),
    sort_order,
  };
  s.add_subject_assignment(&assignment).await.unwrap();
  assignment.subject_assignment_id
}

async fn seed_student(s: &SqliteStore, class_id: Uuid, last_name: &str) -> Uuid {
  let student = Student {
    student_id: Uuid::new_v4(),
    first_name: "Ada".to_owned(),
    last_name:  last_name.to_owned(),
  };
  s.add_student(&student).await.unwrap();
  s.enrol(class_id, student.student_id, term()).await.unwrap();
  student.student_id
}

fn empty_snapshot() -> ResultSnapshot {
  ResultSnapshot {
    lines:          vec![],
    total_score:    Decimal::ZERO,
    average_score:  None,
    class_average:  None,
    position:       None,
    position_label: None,
    total_students: 0,
    attendance:     None,
    affective:      None,
    psychomotor:    None,
  }
}

// ─── Scores ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_and_get_score() {
  let s = store().await;
  let class_id = Uuid::new_v4();
  let sa = seed_subject(&s, class_id, "Mathematics", 1).await;
  let key = ScoreKey { student_id: Uuid::new_v4(), subject_assignment_id: sa, term: term() };

  s.upsert_score(ScoreRecord::new(key, Decimal::new(155, 1), dec(18), dec(50)))
    .await
    .unwrap();
  let fetched = s.get_score(key).await.unwrap().unwrap();
  assert_eq!(fetched.ca1, Decimal::new(155, 1));
  assert_eq!(fetched.total(), Decimal::new(835, 1));
  assert_eq!(fetched.status, ScoreStatus::Draft);

  s.upsert_score(ScoreRecord::new(key, dec(20), dec(20), dec(60))).await.unwrap();
  let fetched = s.get_score(key).await.unwrap().unwrap();
  assert_eq!(fetched.total(), dec(100));
}

#[tokio::test]
async fn get_missing_score_returns_none() {
  let s = store().await;
  let key = ScoreKey {
    student_id:            Uuid::new_v4(),
    subject_assignment_id: Uuid::new_v4(),
    term:                  term(),
  };
  assert!(s.get_score(key).await.unwrap().is_none());
}

#[tokio::test]
async fn cohort_listings_are_scoped_by_subject_class_and_term() {
  let s = store().await;
  let class_id = Uuid::new_v4();
  let other_class = Uuid::new_v4();
  let maths = seed_subject(&s, class_id, "Mathematics", 1).await;
  let english = seed_subject(&s, class_id, "English", 2).await;
  let elsewhere = seed_subject(&s, other_class, "Mathematics", 1).await;
  let student = Uuid::new_v4();

  for sa in [maths, english, elsewhere] {
    let key = ScoreKey { student_id: student, subject_assignment_id: sa, term: term() };
    s.upsert_score(ScoreRecord::new(key, dec(10), dec(10), dec(30))).await.unwrap();
  }
  let second_term = ScoreKey {
    student_id:            student,
    subject_assignment_id: maths,
    term:                  AcademicTerm::new(Term::Second, 2025),
  };
  s.upsert_score(ScoreRecord::new(second_term, dec(1), dec(1), dec(1))).await.unwrap();

  assert_eq!(s.list_by_subject_cohort(maths, term()).await.unwrap().len(), 1);
  let class_scores = s.list_by_student_cohort(class_id, term()).await.unwrap();
  assert_eq!(class_scores.len(), 2);
  assert!(class_scores.iter().all(|r| r.key.subject_assignment_id != elsewhere));
}

#[tokio::test]
async fn score_status_can_be_locked() {
  let s = store().await;
  let sa = seed_subject(&s, Uuid::new_v4(), "Biology", 1).await;
  let key = ScoreKey { student_id: Uuid::new_v4(), subject_assignment_id: sa, term: term() };
  s.upsert_score(ScoreRecord::new(key, dec(10), dec(10), dec(30))).await.unwrap();

  assert!(s.set_score_status(key, ScoreStatus::Locked).await.unwrap());
  assert_eq!(s.get_score(key).await.unwrap().unwrap().status, ScoreStatus::Locked);

  let absent = ScoreKey { student_id: Uuid::new_v4(), ..key };
  assert!(!s.set_score_status(absent, ScoreStatus::Locked).await.unwrap());
}

// ─── School facts ────────────────────────────────────────────────────────────

#[tokio::test]
async fn registrations_follow_class_and_active_flag() {
  let s = store().await;
  let class_id = Uuid::new_v4();
  let maths = seed_subject(&s, class_id, "Mathematics", 1).await;
  let english = seed_subject(&s, class_id, "English", 2).await;
  let other = seed_subject(&s, Uuid::new_v4(), "French", 1).await;
  let student = seed_student(&s, class_id, "Okafor").await;

  for sa in [english, maths, other] {
    s.register(student, sa, term()).await.unwrap();
  }
  assert_eq!(
    s.active_subjects_for(student, class_id, term()).await.unwrap(),
    vec![maths, english]
  );

  s.deregister(student, english, term()).await.unwrap();
  assert_eq!(s.active_subjects_for(student, class_id, term()).await.unwrap(), vec![maths]);
}

#[tokio::test]
async fn roster_is_ordered_by_last_name() {
  let s = store().await;
  let class_id = Uuid::new_v4();
  seed_student(&s, class_id, "Okafor").await;
  seed_student(&s, class_id, "Bello").await;
  seed_student(&s, Uuid::new_v4(), "Adewale").await;

  let members = s.cohort_members(class_id, term()).await.unwrap();
  let names: Vec<_> = members.iter().map(|m| m.last_name.as_str()).collect();
  assert_eq!(names, ["Bello", "Okafor"]);
}

#[tokio::test]
async fn catalog_lists_assignments_in_sort_order() {
  let s = store().await;
  let class_id = Uuid::new_v4();
  let english = seed_subject(&s, class_id, "English", 2).await;
  let maths = seed_subject(&s, class_id, "Mathematics", 1).await;

  let listed = s.subject_assignments(class_id).await.unwrap();
  assert_eq!(
    listed.iter().map(|a| a.subject_assignment_id).collect::<Vec<_>>(),
    vec![maths, english]
  );
  assert_eq!(s.subject_assignment(english).await.unwrap().unwrap().subject_name, "English");
  assert!(s.subject_assignment(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn attendance_and_ratings_round_trip() {
  let s = store().await;
  let class_id = Uuid::new_v4();
  let student = seed_student(&s, class_id, "Okafor").await;

  assert!(s.get_attendance(student, term()).await.unwrap().is_none());
  let totals = AttendanceTotals { present: 58, required_days: 62 };
  s.set_attendance(student, term(), totals).await.unwrap();
  assert_eq!(s.get_attendance(student, term()).await.unwrap(), Some(totals));

  assert_eq!(
    s.ratings_for(student, class_id, term()).await.unwrap(),
    StudentRatings::default()
  );
  let r = |v| Rating::new(v).unwrap();
  let ratings = StudentRatings {
    affective:   Some(AffectiveRating {
      punctuality:              r(5),
      neatness:                 r(4),
      politeness:               r(3),
      attentiveness:            r(4),
      relationship_with_others: r(5),
    }),
    psychomotor: None,
  };
  s.set_ratings(student, class_id, term(), ratings).await.unwrap();
  assert_eq!(s.ratings_for(student, class_id, term()).await.unwrap(), ratings);
}

// ─── Compiled results ────────────────────────────────────────────────────────

#[tokio::test]
async fn save_cohort_bumps_version_and_detects_conflicts() {
  let s = store().await;
  let class_id = Uuid::new_v4();
  let key = ResultKey { student_id: Uuid::new_v4(), class_id, term: term() };
  let result = CompiledResult::draft(key, empty_snapshot());

  let empty = s.list_cohort(class_id, term()).await.unwrap();
  assert_eq!(empty.version, 0);
  assert!(empty.results.is_empty());

  let outcome = s.save_cohort(class_id, term(), 0, vec![result.clone()]).await.unwrap();
  assert_eq!(outcome, SaveOutcome::Saved { version: 1 });

  let stale = s.save_cohort(class_id, term(), 0, vec![result.clone()]).await.unwrap();
  assert_eq!(stale, SaveOutcome::Conflict { current: 1 });

  let cohort = s.list_cohort(class_id, term()).await.unwrap();
  assert_eq!(cohort.version, 1);
  assert_eq!(cohort.results, vec![result.clone()]);

  assert_eq!(s.get_result(result.result_id).await.unwrap(), Some(result.clone()));
  assert_eq!(s.find_result(key).await.unwrap(), Some(result.clone()));
  assert_eq!(s.results_for_student(key.student_id, term()).await.unwrap(), vec![result]);
}

#[tokio::test]
async fn save_cohort_replaces_existing_documents() {
  let s = store().await;
  let class_id = Uuid::new_v4();
  let key = ResultKey { student_id: Uuid::new_v4(), class_id, term: term() };
  let mut result = CompiledResult::draft(key, empty_snapshot());
  s.save_cohort(class_id, term(), 0, vec![result.clone()]).await.unwrap();

  result.status = ResultStatus::PendingApproval;
  result.snapshot.total_score = dec(170);
  s.save_cohort(class_id, term(), 1, vec![result.clone()]).await.unwrap();

  let stored = s.get_result(result.result_id).await.unwrap().unwrap();
  assert_eq!(stored.status, ResultStatus::PendingApproval);
  assert_eq!(stored.snapshot.total_score, dec(170));
  assert_eq!(s.list_cohort(class_id, term()).await.unwrap().results.len(), 1);
}

#[tokio::test]
async fn delete_result_reports_whether_anything_was_removed() {
  let s = store().await;
  let class_id = Uuid::new_v4();
  let key = ResultKey { student_id: Uuid::new_v4(), class_id, term: term() };
  let result = CompiledResult::draft(key, empty_snapshot());
  s.save_cohort(class_id, term(), 0, vec![result.clone()]).await.unwrap();

  assert!(s.delete_result(result.result_id).await.unwrap());
  assert!(!s.delete_result(result.result_id).await.unwrap());
  assert!(s.get_result(result.result_id).await.unwrap().is_none());
}

// ─── Approval and audit ──────────────────────────────────────────────────────

#[tokio::test]
async fn approvers_are_scoped_to_a_class() {
  let s = store().await;
  let (user, class_id) = (Uuid::new_v4(), Uuid::new_v4());
  assert!(!s.can_approve(user, class_id).await.unwrap());

  s.grant_approver(user, class_id).await.unwrap();
  assert!(s.can_approve(user, class_id).await.unwrap());
  assert!(!s.can_approve(user, Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn audit_entries_are_filterable() {
  let s = store().await;
  let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
  s.record_invalidation(first, "score edited".to_owned(), Utc::now()).await.unwrap();
  s.record_invalidation(second, "subject dropped".to_owned(), Utc::now()).await.unwrap();

  assert_eq!(s.audit_entries(None).await.unwrap().len(), 2);
  let only_first = s.audit_entries(Some(first)).await.unwrap();
  assert_eq!(only_first.len(), 1);
  assert_eq!(only_first[0].reason, "score edited");
}
