//! The CompiledResult builder.
//!
//! [`CohortInputs`] is everything read from the collaborators for one class
//! cohort. [`build_snapshots`] turns it into one [`ResultSnapshot`] per
//! student without further I/O: totals, subject statistics, grades, a single
//! rank pass over the whole cohort, attendance and ratings.

use std::collections::HashMap;

use gradebook_core::{
  Error, Result,
  aggregate::{self, StudentTotals, SubjectCohortStats},
  grading::GradeTable,
  rank::{self, RankEntry},
  rating::StudentRatings,
  result::{AttendanceSnapshot, ResultLine, ResultSnapshot},
  school::{AttendanceTotals, Student, SubjectAssignment},
  score::ScoreRecord,
  term::AcademicTerm,
};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Collaborator data for one `(class, term)` cohort.
#[derive(Debug, Clone)]
pub struct CohortInputs {
  pub class_id:      Uuid,
  pub term:          AcademicTerm,
  pub members:       Vec<Student>,
  pub catalog:       Vec<SubjectAssignment>,
  /// Every score record of the class's subjects in the term.
  pub records:       Vec<ScoreRecord>,
  /// Active subject registrations per student.
  pub registrations: HashMap<Uuid, Vec<Uuid>>,
  pub attendance:    HashMap<Uuid, AttendanceTotals>,
  pub ratings:       HashMap<Uuid, StudentRatings>,
}

impl CohortInputs {
  pub fn is_member(&self, student_id: Uuid) -> bool {
    self.members.iter().any(|m| m.student_id == student_id)
  }

  fn in_catalog(&self, subject_assignment_id: Uuid) -> bool {
    self.catalog.iter().any(|a| a.subject_assignment_id == subject_assignment_id)
  }

  /// Active registrations that point at one of this class's subjects.
  fn registered(&self, student_id: Uuid) -> Vec<Uuid> {
    self
      .registrations
      .get(&student_id)
      .into_iter()
      .flatten()
      .copied()
      .filter(|&id| self.in_catalog(id))
      .collect()
  }

  /// Registrations naming a subject outside the class catalog.
  pub fn stray_registrations(&self, student_id: Uuid) -> Vec<Uuid> {
    self
      .registrations
      .get(&student_id)
      .into_iter()
      .flatten()
      .copied()
      .filter(|&id| !self.in_catalog(id))
      .collect()
  }

  /// Totals over a member's registered subjects.
  pub fn student_totals(&self, student_id: Uuid) -> Result<StudentTotals> {
    aggregate::student_totals(
      student_id,
      self.class_id,
      &self.registered(student_id),
      &self.records,
    )
  }

  /// Statistics over the records of members registered for the subject.
  pub fn subject_stats(&self, subject_assignment_id: Uuid) -> SubjectCohortStats {
    let cohort = self.records.iter().filter(|r| {
      r.key.subject_assignment_id == subject_assignment_id
        && self.is_member(r.key.student_id)
        && self.registered(r.key.student_id).contains(&subject_assignment_id)
    });
    aggregate::cohort_stats(subject_assignment_id, self.term, cohort)
  }
}

/// Snapshots for every member with at least one registered subject.
///
/// Members without registrations are left out of the map and out of the rank
/// pass.
pub fn build_snapshots(
  inputs: &CohortInputs,
  grades: &GradeTable,
) -> Result<HashMap<Uuid, ResultSnapshot>> {
  let mut totals: Vec<(&Student, StudentTotals)> = Vec::with_capacity(inputs.members.len());
  for member in &inputs.members {
    let stray = inputs.stray_registrations(member.student_id);
    if !stray.is_empty() {
      tracing::warn!(
        student_id = %member.student_id,
        class_id = %inputs.class_id,
        subjects = ?stray,
        "registrations outside the class catalog ignored"
      );
    }
    match inputs.student_totals(member.student_id) {
      Ok(t) => totals.push((member, t)),
      Err(Error::EmptyRegistration { .. }) => {
        tracing::debug!(student_id = %member.student_id, "no active subjects; skipped");
      }
      Err(e) => return Err(e),
    }
  }

  let ranked = rank::rank_cohort(
    totals
      .iter()
      .filter_map(|(member, t)| {
        t.average_score.map(|average_score| RankEntry {
          student_id: member.student_id,
          average_score,
          total_score: t.total_score,
          last_name: member.last_name.clone(),
        })
      })
      .collect(),
  );
  let averages: Vec<Decimal> = ranked.iter().map(|r| r.entry.average_score).collect();
  let class_average = aggregate::mean_2dp(&averages);
  let total_students = ranked.len() as u32;
  let positions: HashMap<Uuid, u32> =
    ranked.iter().map(|r| (r.entry.student_id, r.position)).collect();

  let mut stats: HashMap<Uuid, SubjectCohortStats> = HashMap::new();
  let mut snapshots = HashMap::with_capacity(totals.len());
  for (member, t) in totals {
    let mut lines = Vec::with_capacity(t.lines.len());
    for line in &t.lines {
      let subject = inputs
        .catalog
        .iter()
        .find(|a| a.subject_assignment_id == line.subject_assignment_id)
        .ok_or_else(|| {
          Error::NotFound(format!("subject assignment {}", line.subject_assignment_id))
        })?;
      let subject_stats = stats
        .entry(subject.subject_assignment_id)
        .or_insert_with(|| inputs.subject_stats(subject.subject_assignment_id));
      lines.push((subject, build_line(subject, line.score, subject_stats, grades)));
    }
    lines.sort_by(|(a, _), (b, _)| {
      a.sort_order.cmp(&b.sort_order).then_with(|| a.subject_name.cmp(&b.subject_name))
    });

    let position = positions.get(&member.student_id).copied();
    let snapshot = ResultSnapshot {
      lines: lines.into_iter().map(|(_, l)| l).collect(),
      total_score: t.total_score,
      average_score: t.average_score,
      class_average,
      position,
      position_label: position.map(rank::ordinal),
      total_students,
      attendance: inputs.attendance.get(&member.student_id).map(|a| AttendanceSnapshot {
        times_present:         a.present,
        total_attendance_days: a.required_days,
      }),
      affective: inputs
        .ratings
        .get(&member.student_id)
        .and_then(|r| r.affective)
        .map(|a| a.items()),
      psychomotor: inputs
        .ratings
        .get(&member.student_id)
        .and_then(|r| r.psychomotor)
        .map(|p| p.items()),
    };
    snapshots.insert(member.student_id, snapshot);
  }

  Ok(snapshots)
}

fn build_line(
  subject: &SubjectAssignment,
  score: Option<aggregate::SubjectScore>,
  stats: &SubjectCohortStats,
  grades: &GradeTable,
) -> ResultLine {
  let grade = score.map(|s| grades.grade_for(s.total));
  ResultLine {
    subject_assignment_id: subject.subject_assignment_id,
    subject_name:          subject.subject_name.clone(),
    subject_teacher:       subject.subject_teacher.clone(),
    ca1:                   score.map(|s| s.ca1),
    ca2:                   score.map(|s| s.ca2),
    exam:                  score.map(|s| s.exam),
    total:                 score.map(|s| s.total),
    class_average:         stats.class_average,
    class_min:             stats.class_min,
    class_max:             stats.class_max,
    remark:                grade.as_ref().map(|g| g.remark.clone()),
    grade:                 grade.map(|g| g.grade),
    incomplete:            score.is_none(),
  }
}
