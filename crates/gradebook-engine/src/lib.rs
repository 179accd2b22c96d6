//! Result compilation and approval service.
//!
//! [`Engine`] reads through the collaborator traits of
//! [`gradebook_core::store`], builds [`CompiledResult`]s with
//! [`build_snapshots`], and drives them through the approval workflow. Every
//! write to a class cohort happens under that cohort's lock and is saved with
//! an optimistic version check; a lost race is retried once with fresh data.

mod compile;
mod locks;

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
};

use chrono::{DateTime, Utc};
pub use compile::{CohortInputs, build_snapshots};
use gradebook_core::{
  Error, Result,
  aggregate::{self, StudentTotals, SubjectCohortStats},
  etag::{compute_etag, etags_match},
  grading::GradeTable,
  result::{
    CompiledResult, Decision, Narrative, PendingAudit, ResultKey, ResultSnapshot, Review,
  },
  score::{ScoreRecord, ScoreStatus},
  store::{ResultStore, SaveOutcome},
  term::AcademicTerm,
  workflow::{ResultStatus, Transition},
};
pub use locks::{Cohort, CohortGuard, CohortLocks};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A lost version race is retried this many times in total.
const MAX_ATTEMPTS: usize = 2;

/// Which missing results a cohort pass may create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Create {
  Nothing,
  Student(Uuid),
  Everyone,
}

/// Whether a cohort pass bumps the cohort version when no result changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Touch {
  /// The caller changed an input; later passes must notice it.
  Always,
  IfChanged,
}

/// The application service. Cheap to share behind an `Arc`.
pub struct Engine<S> {
  store:  Arc<S>,
  grades: GradeTable,
  locks:  CohortLocks,
}

impl<S: ResultStore> Engine<S> {
  pub fn new(store: Arc<S>, grades: GradeTable) -> Self {
    Self { store, grades, locks: CohortLocks::new() }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn grades(&self) -> &GradeTable { &self.grades }

  // ── Scores ────────────────────────────────────────────────────────────────

  /// Write one score record and recompile the owning class cohort.
  ///
  /// Changing the marks of a locked record fails with [`Error::ScoreLocked`];
  /// changing the marks of a student whose result is awaiting approval fails
  /// with [`Error::ResultUnderReview`]. A status-only write (locking or
  /// unlocking) is always accepted.
  ///
  /// The recompile runs even when the marks are unchanged, so repeating a
  /// write whose recompile failed brings the cohort back in line.
  pub async fn record_score(&self, record: ScoreRecord) -> Result<ScoreRecord> {
    let key = record.key;
    let subject = self
      .store
      .subject_assignment(key.subject_assignment_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::NotFound(format!("subject assignment {}", key.subject_assignment_id))
      })?;
    let class_id = subject.class_id;

    let _subject_guard = self.locks.lock_subject(key.subject_assignment_id, key.term).await;
    let _class_guard = self.locks.lock_class(class_id, key.term).await;

    let existing = self.store.get_score(key).await.map_err(Error::store)?;
    let marks_changed = existing.as_ref().is_none_or(|e| {
      (e.ca1, e.ca2, e.exam) != (record.ca1, record.ca2, record.exam)
    });
    if marks_changed {
      if existing.as_ref().is_some_and(|e| e.status == ScoreStatus::Locked) {
        return Err(Error::ScoreLocked);
      }
      let result_key = ResultKey { student_id: key.student_id, class_id, term: key.term };
      if let Some(result) = self.store.find_result(result_key).await.map_err(Error::store)? {
        if result.status == ResultStatus::PendingApproval {
          return Err(Error::ResultUnderReview(result.result_id));
        }
      }
    }

    let saved = self.store.upsert_score(record).await.map_err(Error::store)?;
    info!(
      student_id = %key.student_id,
      subject_assignment_id = %key.subject_assignment_id,
      term = %key.term,
      total = %saved.total(),
      status = %saved.status,
      "score recorded"
    );

    self
      .cohort_pass(class_id, key.term, Create::Nothing, Touch::Always, |_| Ok(None))
      .await?;
    Ok(saved)
  }

  pub async fn subject_scores(
    &self,
    subject_assignment_id: Uuid,
    term: AcademicTerm,
  ) -> Result<Vec<ScoreRecord>> {
    self
      .store
      .list_by_subject_cohort(subject_assignment_id, term)
      .await
      .map_err(Error::store)
  }

  // ── Aggregation ───────────────────────────────────────────────────────────

  /// Class average, minimum and maximum for one subject of `class_id`.
  ///
  /// The cohort is every roster member actively registered for the subject.
  pub async fn subject_cohort_stats(
    &self,
    class_id: Uuid,
    subject_assignment_id: Uuid,
    term: AcademicTerm,
  ) -> Result<SubjectCohortStats> {
    let subject = self
      .store
      .subject_assignment(subject_assignment_id)
      .await
      .map_err(Error::store)?
      .filter(|s| s.class_id == class_id)
      .ok_or_else(|| {
        Error::NotFound(format!("subject assignment {subject_assignment_id} in class {class_id}"))
      })?;

    let members = self.store.cohort_members(class_id, term).await.map_err(Error::store)?;
    let mut cohort = HashSet::with_capacity(members.len());
    for member in &members {
      let registered = self
        .store
        .active_subjects_for(member.student_id, class_id, term)
        .await
        .map_err(Error::store)?;
      if registered.contains(&subject.subject_assignment_id) {
        cohort.insert(member.student_id);
      }
    }

    let records = self
      .store
      .list_by_subject_cohort(subject.subject_assignment_id, term)
      .await
      .map_err(Error::store)?;
    Ok(aggregate::cohort_stats(
      subject.subject_assignment_id,
      term,
      records.iter().filter(|r| cohort.contains(&r.key.student_id)),
    ))
  }

  /// Per-subject lines, total and average over the student's registered
  /// subjects.
  pub async fn student_totals(
    &self,
    student_id: Uuid,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> Result<StudentTotals> {
    let registered = self
      .store
      .active_subjects_for(student_id, class_id, term)
      .await
      .map_err(Error::store)?;
    let records = self.store.list_by_student_cohort(class_id, term).await.map_err(Error::store)?;
    aggregate::student_totals(student_id, class_id, &registered, &records)
  }

  // ── Compilation ───────────────────────────────────────────────────────────

  /// Compile (or recompile) one student's result.
  ///
  /// Ranking needs the whole class, so this runs a full cohort pass; other
  /// students' existing results are refreshed, but only this student's result
  /// is created if missing.
  pub async fn compile(
    &self,
    student_id: Uuid,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> Result<CompiledResult> {
    let _guard = self.locks.lock_class(class_id, term).await;
    let results = self
      .cohort_pass(class_id, term, Create::Student(student_id), Touch::IfChanged, |_| Ok(None))
      .await?;
    results
      .into_iter()
      .find(|r| r.key.student_id == student_id)
      .ok_or_else(|| Error::NotFound(format!("result for student {student_id}")))
  }

  /// Compile results for every member of the class with registered subjects.
  pub async fn compile_cohort(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> Result<Vec<CompiledResult>> {
    let _guard = self.locks.lock_class(class_id, term).await;
    let mut results = self
      .cohort_pass(class_id, term, Create::Everyone, Touch::IfChanged, |_| Ok(None))
      .await?;
    sort_for_listing(&mut results);
    Ok(results)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn get_result(&self, result_id: Uuid) -> Result<CompiledResult> {
    self
      .store
      .get_result(result_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("result {result_id}")))
  }

  /// Stored results of a class cohort, best position first.
  pub async fn list_cohort_results(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> Result<Vec<CompiledResult>> {
    let mut results = self.store.list_cohort(class_id, term).await.map_err(Error::store)?.results;
    sort_for_listing(&mut results);
    Ok(results)
  }

  pub async fn student_results(
    &self,
    student_id: Uuid,
    term: AcademicTerm,
  ) -> Result<Vec<CompiledResult>> {
    self.store.results_for_student(student_id, term).await.map_err(Error::store)
  }

  // ── Workflow ──────────────────────────────────────────────────────────────

  /// Draft → PendingApproval.
  ///
  /// Re-ranks the whole cohort first so the submitted position is current,
  /// then requires every line scored and attendance on file.
  pub async fn submit_for_approval(&self, result_id: Uuid) -> Result<CompiledResult> {
    let found = self.get_result(result_id).await?;
    let (class_id, term) = (found.key.class_id, found.key.term);

    let _guard = self.locks.lock_class(class_id, term).await;
    let results = self
      .cohort_pass(class_id, term, Create::Nothing, Touch::IfChanged, |results| {
        let result = results
          .iter_mut()
          .find(|r| r.result_id == result_id)
          .ok_or_else(|| Error::NotFound(format!("result {result_id}")))?;
        let next = result.status.apply(Transition::Submit)?;
        result.snapshot.check_complete()?;
        result.status = next;
        Ok(Some(result_id))
      })
      .await?;

    let submitted = results
      .into_iter()
      .find(|r| r.result_id == result_id)
      .ok_or_else(|| Error::NotFound(format!("result {result_id}")))?;
    info!(
      %result_id, %class_id, %term, position = ?submitted.snapshot.position,
      "result submitted"
    );
    Ok(submitted)
  }

  /// PendingApproval → Approved.
  ///
  /// With `expected_etag`, the approval only goes through if the snapshot is
  /// still the one the approver looked at.
  pub async fn approve(
    &self,
    result_id: Uuid,
    approver_id: Uuid,
    expected_etag: Option<String>,
  ) -> Result<CompiledResult> {
    let found = self.get_result(result_id).await?;
    self.require_approver(approver_id, found.key.class_id).await?;

    let decided_at = Utc::now();
    let approved = self
      .update_result(result_id, |result| {
        if let Some(expected) = &expected_etag {
          let current = compute_etag(&result.snapshot)?;
          if !etags_match(expected, &current) {
            return Err(Error::ConcurrentModification(format!(
              "result {result_id} changed since {expected}; now {current}"
            )));
          }
        }
        result.status = result.status.apply(Transition::Approve)?;
        result.review = Some(Review {
          reviewer_id: approver_id,
          decision: Decision::Approved,
          comment: None,
          decided_at,
        });
        Ok(())
      })
      .await?;

    info!(%result_id, %approver_id, "result approved");
    Ok(approved)
  }

  /// PendingApproval → Rejected. A non-blank comment is mandatory.
  pub async fn reject(
    &self,
    result_id: Uuid,
    approver_id: Uuid,
    comment: String,
  ) -> Result<CompiledResult> {
    let found = self.get_result(result_id).await?;
    self.require_approver(approver_id, found.key.class_id).await?;
    let comment = comment.trim().to_owned();
    if comment.is_empty() {
      return Err(Error::RejectionCommentRequired);
    }

    let decided_at = Utc::now();
    let rejected = self
      .update_result(result_id, |result| {
        result.status = result.status.apply(Transition::Reject)?;
        result.review = Some(Review {
          reviewer_id: approver_id,
          decision: Decision::Rejected,
          comment: Some(comment.clone()),
          decided_at,
        });
        Ok(())
      })
      .await?;

    info!(%result_id, %approver_id, "result rejected");
    Ok(rejected)
  }

  /// Rejected → Draft, so the class teacher can correct and resubmit.
  pub async fn reopen(&self, result_id: Uuid) -> Result<CompiledResult> {
    let reopened = self
      .update_result(result_id, |result| {
        result.status = result.status.apply(Transition::Reopen)?;
        result.review = None;
        Ok(())
      })
      .await?;
    info!(%result_id, "result reopened");
    Ok(reopened)
  }

  /// Replace the comments and signatures of a result that is not approved.
  pub async fn set_narrative(
    &self,
    result_id: Uuid,
    narrative: Narrative,
  ) -> Result<CompiledResult> {
    self
      .update_result(result_id, |result| {
        if !result.status.accepts_narrative() {
          return Err(Error::ResultFrozen(result_id));
        }
        result.narrative = narrative.clone();
        Ok(())
      })
      .await
  }

  /// Administrative delete, regardless of status.
  pub async fn purge(&self, result_id: Uuid) -> Result<()> {
    let found = self.get_result(result_id).await?;
    let _guard = self.locks.lock_class(found.key.class_id, found.key.term).await;
    if !self.store.delete_result(result_id).await.map_err(Error::store)? {
      return Err(Error::NotFound(format!("result {result_id}")));
    }
    warn!(%result_id, student_id = %found.key.student_id, status = %found.status, "result purged");
    Ok(())
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  async fn require_approver(&self, user_id: Uuid, class_id: Uuid) -> Result<()> {
    if self.store.can_approve(user_id, class_id).await.map_err(Error::store)? {
      Ok(())
    } else {
      Err(Error::ApprovalNotAuthorized { user_id, class_id })
    }
  }

  async fn load_cohort(&self, class_id: Uuid, term: AcademicTerm) -> Result<CohortInputs> {
    let members = self.store.cohort_members(class_id, term).await.map_err(Error::store)?;
    let catalog = self.store.subject_assignments(class_id).await.map_err(Error::store)?;
    let records = self.store.list_by_student_cohort(class_id, term).await.map_err(Error::store)?;

    let mut registrations = HashMap::with_capacity(members.len());
    let mut attendance = HashMap::with_capacity(members.len());
    let mut ratings = HashMap::with_capacity(members.len());
    for member in &members {
      let id = member.student_id;
      let registered =
        self.store.active_subjects_for(id, class_id, term).await.map_err(Error::store)?;
      registrations.insert(id, registered);
      if let Some(totals) = self.store.get_attendance(id, term).await.map_err(Error::store)? {
        attendance.insert(id, totals);
      }
      ratings.insert(id, self.store.ratings_for(id, class_id, term).await.map_err(Error::store)?);
    }

    Ok(CohortInputs {
      class_id,
      term,
      members,
      catalog,
      records,
      registrations,
      attendance,
      ratings,
    })
  }

  /// Recompile every result of a class cohort and save the changes.
  ///
  /// `then` runs on the merged results before saving and returns the id of
  /// any result it modified. The caller holds the class cohort lock.
  async fn cohort_pass<F>(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
    create: Create,
    touch: Touch,
    mut then: F,
  ) -> Result<Vec<CompiledResult>>
  where
    F: FnMut(&mut [CompiledResult]) -> Result<Option<Uuid>> + Send,
  {
    for attempt in 1..=MAX_ATTEMPTS {
      // Version first: a write committed after the inputs are read must fail
      // the save below.
      let stored = self.store.list_cohort(class_id, term).await.map_err(Error::store)?;
      let inputs = self.load_cohort(class_id, term).await?;
      if let Create::Student(student_id) = create {
        if !inputs.is_member(student_id) {
          return Err(Error::NotFound(format!(
            "student {student_id} in class {class_id} for {term}"
          )));
        }
        inputs.student_totals(student_id)?;
      }
      let snapshots = build_snapshots(&inputs, &self.grades)?;

      let mut pass = reconcile(class_id, term, stored.results, snapshots, create, Utc::now())?;
      if let Some(id) = then(&mut pass.results)? {
        pass.dirty.insert(id);
      }

      if pass.dirty.is_empty() && touch == Touch::IfChanged {
        let current = self.store.list_cohort(class_id, term).await.map_err(Error::store)?.version;
        if current == stored.version {
          debug!(%class_id, %term, "cohort unchanged");
          self.flush_audits(class_id, term, current, &mut pass.results).await?;
          return Ok(pass.results);
        }
        warn!(
          %class_id, %term, attempt, expected = stored.version, current,
          "cohort changed while compiling"
        );
        continue;
      }

      let changed: Vec<CompiledResult> = pass
        .results
        .iter()
        .filter(|r| pass.dirty.contains(&r.result_id))
        .cloned()
        .collect();
      let changed_count = changed.len();

      match self
        .store
        .save_cohort(class_id, term, stored.version, changed)
        .await
        .map_err(Error::store)?
      {
        SaveOutcome::Saved { version } => {
          info!(%class_id, %term, version, changed = changed_count, "cohort compiled");
          self.flush_audits(class_id, term, version, &mut pass.results).await?;
          return Ok(pass.results);
        }
        SaveOutcome::Conflict { current } => {
          warn!(
            %class_id, %term, attempt, expected = stored.version, current,
            "cohort version conflict"
          );
        }
      }
    }

    Err(Error::ConcurrentModification(format!(
      "class {class_id} for {term} kept changing during recompilation"
    )))
  }

  /// Hand saved invalidations to the audit sink and clear their markers.
  ///
  /// A marker is only cleared once the sink accepted it, so a failing sink
  /// leaves it for the next pass.
  async fn flush_audits(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
    version: u64,
    results: &mut [CompiledResult],
  ) -> Result<()> {
    let mut acknowledged = Vec::new();
    let mut failure = None;
    for result in results.iter_mut().filter(|r| !r.pending_audits.is_empty()) {
      let result_id = result.result_id;
      let mut sent = 0;
      for audit in &result.pending_audits {
        warn!(%result_id, %class_id, %term, reason = %audit.reason, "approved result invalidated");
        let recorded = self
          .store
          .record_invalidation(result_id, audit.reason.clone(), audit.invalidated_at)
          .await;
        if let Err(e) = recorded {
          failure = Some(Error::store(e));
          break;
        }
        sent += 1;
      }
      if sent > 0 {
        result.pending_audits = result.pending_audits.split_off(sent);
        acknowledged.push(result.clone());
      }
      if failure.is_some() {
        break;
      }
    }

    if !acknowledged.is_empty() {
      let outcome = self
        .store
        .save_cohort(class_id, term, version, acknowledged)
        .await
        .map_err(Error::store)?;
      if let SaveOutcome::Conflict { current } = outcome {
        warn!(%class_id, %term, expected = version, current, "audit markers kept for the next pass");
      }
    }
    failure.map_or(Ok(()), Err)
  }

  /// Apply a read-modify-write to one stored result under its cohort lock.
  async fn update_result<F>(&self, result_id: Uuid, mut update: F) -> Result<CompiledResult>
  where
    F: FnMut(&mut CompiledResult) -> Result<()> + Send,
  {
    let found = self.get_result(result_id).await?;
    let (class_id, term) = (found.key.class_id, found.key.term);
    let _guard = self.locks.lock_class(class_id, term).await;

    for attempt in 1..=MAX_ATTEMPTS {
      let cohort = self.store.list_cohort(class_id, term).await.map_err(Error::store)?;
      let mut result = cohort
        .results
        .into_iter()
        .find(|r| r.result_id == result_id)
        .ok_or_else(|| Error::NotFound(format!("result {result_id}")))?;
      update(&mut result)?;

      match self
        .store
        .save_cohort(class_id, term, cohort.version, vec![result.clone()])
        .await
        .map_err(Error::store)?
      {
        SaveOutcome::Saved { .. } => return Ok(result),
        SaveOutcome::Conflict { current } => {
          warn!(%result_id, attempt, expected = cohort.version, current, "result version conflict");
        }
      }
    }

    Err(Error::ConcurrentModification(format!("result {result_id} kept changing")))
  }
}

/// Merged state of a cohort after a recompile.
struct Pass {
  results: Vec<CompiledResult>,
  /// Results whose stored document must be rewritten.
  dirty:   HashSet<Uuid>,
}

fn reconcile(
  class_id: Uuid,
  term: AcademicTerm,
  stored: Vec<CompiledResult>,
  mut snapshots: HashMap<Uuid, ResultSnapshot>,
  create: Create,
  now: DateTime<Utc>,
) -> Result<Pass> {
  let mut pass = Pass { results: Vec::with_capacity(stored.len()), dirty: HashSet::new() };

  for mut result in stored {
    let Some(snapshot) = snapshots.remove(&result.key.student_id) else {
      debug!(result_id = %result.result_id, "student left the cohort; result kept as is");
      pass.results.push(result);
      continue;
    };
    if snapshot != result.snapshot {
      if result.status == ResultStatus::Approved {
        let before = compute_etag(&result.snapshot)?;
        let after = compute_etag(&snapshot)?;
        result.status = result.status.apply(Transition::Invalidate)?;
        result.review = None;
        result.pending_audits.push(PendingAudit {
          reason:         format!("inputs changed: snapshot {before} became {after}"),
          invalidated_at: now,
        });
      }
      debug!(result_id = %result.result_id, status = %result.status, "snapshot refreshed");
      result.snapshot = snapshot;
      pass.dirty.insert(result.result_id);
    }
    pass.results.push(result);
  }

  for (student_id, snapshot) in snapshots {
    let wanted = match create {
      Create::Everyone => true,
      Create::Student(id) => id == student_id,
      Create::Nothing => false,
    };
    if wanted {
      let result = CompiledResult::draft(ResultKey { student_id, class_id, term }, snapshot);
      debug!(result_id = %result.result_id, %student_id, "result created");
      pass.dirty.insert(result.result_id);
      pass.results.push(result);
    }
  }

  Ok(pass)
}

/// Ranked results by position, then unranked ones; student id breaks ties.
fn sort_for_listing(results: &mut [CompiledResult]) {
  results.sort_by_key(|r| (r.snapshot.position.is_none(), r.snapshot.position, r.key.student_id));
}
