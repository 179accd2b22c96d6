//! [`SqliteStore`]: the SQLite implementation of every collaborator trait in
//! [`gradebook_core::store`].

use std::path::Path;

use chrono::{DateTime, Utc};
use gradebook_core::{
  rating::StudentRatings,
  result::{CompiledResult, ResultKey},
  school::{AttendanceTotals, Student, SubjectAssignment},
  score::{ScoreKey, ScoreRecord, ScoreStatus},
  store::{
    ApprovalAuthority, AttendanceAdapter, AuditSink, ClassRoster, CohortResults,
    RatingRepository, ResultRepository, SaveOutcome, ScoreRecordRepository,
    SubjectCatalog, SubjectRegistrationService,
  },
  term::AcademicTerm,
};
use rusqlite::OptionalExtension as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  encode::{
    RawScoreRecord, SCORE_COLUMNS, decode_document, decode_dt, decode_uuid,
    encode_decimal, encode_document, encode_dt, encode_term, encode_uuid,
  },
  schema::SCHEMA,
  Result,
};

/// One row of the invalidation audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub audit_id:           Uuid,
  pub compiled_result_id: Uuid,
  pub reason:             String,
  pub recorded_at:        DateTime<Utc>,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A gradebook store backed by a single SQLite file.
///
/// Cloning shares the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Seeding ───────────────────────────────────────────────────────────────
  //
  // Rosters, subjects, registrations, attendance and ratings are owned by
  // other school systems. These writers let deployments mirror them locally.

  pub async fn add_student(&self, student: &Student) -> Result<()> {
    let id    = encode_uuid(student.student_id);
    let first = student.first_name.clone();
    let last  = student.last_name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students (student_id, first_name, last_name) VALUES (?1, ?2, ?3)
           ON CONFLICT(student_id) DO UPDATE
             SET first_name = excluded.first_name, last_name = excluded.last_name",
          rusqlite::params![id, first, last],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Put `student_id` on the roster of `class_id` for `term`.
  pub async fn enrol(&self, class_id: Uuid, student_id: Uuid, term: AcademicTerm) -> Result<()> {
    let class_id   = encode_uuid(class_id);
    let student_id = encode_uuid(student_id);
    let (t, year)  = encode_term(term);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO enrolments (class_id, student_id, term, academic_year)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![class_id, student_id, t, year],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn add_subject_assignment(&self, assignment: &SubjectAssignment) -> Result<()> {
    let id         = encode_uuid(assignment.subject_assignment_id);
    let class_id   = encode_uuid(assignment.class_id);
    let name       = assignment.subject_name.clone();
    let teacher    = assignment.subject_teacher.clone();
    let sort_order = assignment.sort_order;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subject_assignments
             (subject_assignment_id, class_id, subject_name, subject_teacher, sort_order)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(subject_assignment_id) DO UPDATE
             SET subject_name    = excluded.subject_name,
                 subject_teacher = excluded.subject_teacher,
                 sort_order      = excluded.sort_order",
          rusqlite::params![id, class_id, name, teacher, sort_order],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Register (or re-activate) a student for a subject assignment.
  pub async fn register(
    &self,
    student_id: Uuid,
    subject_assignment_id: Uuid,
    term: AcademicTerm,
  ) -> Result<()> {
    self.set_registration(student_id, subject_assignment_id, term, true).await
  }

  /// Drop a subject; the registration row is kept but marked inactive.
  pub async fn deregister(
    &self,
    student_id: Uuid,
    subject_assignment_id: Uuid,
    term: AcademicTerm,
  ) -> Result<()> {
    self.set_registration(student_id, subject_assignment_id, term, false).await
  }

  async fn set_registration(
    &self,
    student_id: Uuid,
    subject_assignment_id: Uuid,
    term: AcademicTerm,
    active: bool,
  ) -> Result<()> {
    let student_id = encode_uuid(student_id);
    let sa_id      = encode_uuid(subject_assignment_id);
    let (t, year)  = encode_term(term);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO registrations
             (student_id, subject_assignment_id, term, academic_year, active)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(student_id, subject_assignment_id, term, academic_year) DO UPDATE
             SET active = excluded.active",
          rusqlite::params![student_id, sa_id, t, year, active],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn set_attendance(
    &self,
    student_id: Uuid,
    term: AcademicTerm,
    totals: AttendanceTotals,
  ) -> Result<()> {
    let student_id = encode_uuid(student_id);
    let (t, year)  = encode_term(term);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO attendance (student_id, term, academic_year, present, required_days)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(student_id, term, academic_year) DO UPDATE
             SET present = excluded.present, required_days = excluded.required_days",
          rusqlite::params![student_id, t, year, totals.present, totals.required_days],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn set_ratings(
    &self,
    student_id: Uuid,
    class_id: Uuid,
    term: AcademicTerm,
    ratings: StudentRatings,
  ) -> Result<()> {
    let student_id  = encode_uuid(student_id);
    let class_id    = encode_uuid(class_id);
    let (t, year)   = encode_term(term);
    let affective   = ratings.affective.as_ref().map(serde_json::to_string).transpose()?;
    let psychomotor = ratings.psychomotor.as_ref().map(serde_json::to_string).transpose()?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO ratings
             (student_id, class_id, term, academic_year, affective_json, psychomotor_json)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(student_id, class_id, term, academic_year) DO UPDATE
             SET affective_json   = excluded.affective_json,
                 psychomotor_json = excluded.psychomotor_json",
          rusqlite::params![student_id, class_id, t, year, affective, psychomotor],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn grant_approver(&self, user_id: Uuid, class_id: Uuid) -> Result<()> {
    let user_id  = encode_uuid(user_id);
    let class_id = encode_uuid(class_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO approvers (user_id, class_id) VALUES (?1, ?2)",
          rusqlite::params![user_id, class_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Move a score record to `status`, e.g. to lock it after submission.
  /// Returns `false` when no record exists at `key`.
  pub async fn set_score_status(&self, key: ScoreKey, status: ScoreStatus) -> Result<bool> {
    let student_id = encode_uuid(key.student_id);
    let sa_id      = encode_uuid(key.subject_assignment_id);
    let (t, year)  = encode_term(key.term);
    let status     = status.to_string();
    let now        = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE score_records SET status = ?5, updated_at = ?6
           WHERE student_id = ?1 AND subject_assignment_id = ?2
             AND term = ?3 AND academic_year = ?4",
          rusqlite::params![student_id, sa_id, t, year, status, now],
        )?;
        Ok(n)
      })
      .await?;
    Ok(changed > 0)
  }

  /// Audit entries, oldest first, optionally narrowed to one result.
  pub async fn audit_entries(&self, compiled_result_id: Option<Uuid>) -> Result<Vec<AuditEntry>> {
    let filter = compiled_result_id.map(encode_uuid);

    let raws: Vec<(String, String, String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT audit_id, compiled_result_id, reason, recorded_at
           FROM audit_log
           WHERE ?1 IS NULL OR compiled_result_id = ?1
           ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![filter], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(audit_id, result_id, reason, at)| -> Result<AuditEntry> {
        Ok(AuditEntry {
          audit_id: decode_uuid(&audit_id)?,
          compiled_result_id: decode_uuid(&result_id)?,
          reason,
          recorded_at: decode_dt(&at)?,
        })
      })
      .collect()
  }

  async fn query_documents(
    &self,
    sql: &'static str,
    params: Vec<Box<dyn rusqlite::ToSql + Send>>,
  ) -> Result<Vec<CompiledResult>> {
    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    docs.iter().map(|d| decode_document(d)).collect()
  }

  async fn query_scores(
    &self,
    filter: &'static str,
    params: Vec<Box<dyn rusqlite::ToSql + Send>>,
  ) -> Result<Vec<ScoreRecord>> {
    let raws: Vec<RawScoreRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {SCORE_COLUMNS} FROM score_records WHERE {filter}
           ORDER BY subject_assignment_id, student_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawScoreRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawScoreRecord::into_record).collect()
  }
}

fn boxed<T: rusqlite::ToSql + Send + 'static>(v: T) -> Box<dyn rusqlite::ToSql + Send> {
  Box::new(v)
}

// ─── Scores ──────────────────────────────────────────────────────────────────

impl ScoreRecordRepository for SqliteStore {
  type Error = crate::Error;

  async fn get_score(&self, key: ScoreKey) -> Result<Option<ScoreRecord>> {
    let (t, year) = encode_term(key.term);
    let mut found = self
      .query_scores(
        "student_id = ?1 AND subject_assignment_id = ?2 AND term = ?3 AND academic_year = ?4",
        vec![
          boxed(encode_uuid(key.student_id)),
          boxed(encode_uuid(key.subject_assignment_id)),
          boxed(t),
          boxed(year),
        ],
      )
      .await?;
    Ok(found.pop())
  }

  async fn list_by_subject_cohort(
    &self,
    subject_assignment_id: Uuid,
    term: AcademicTerm,
  ) -> Result<Vec<ScoreRecord>> {
    let (t, year) = encode_term(term);
    self
      .query_scores(
        "subject_assignment_id = ?1 AND term = ?2 AND academic_year = ?3",
        vec![boxed(encode_uuid(subject_assignment_id)), boxed(t), boxed(year)],
      )
      .await
  }

  async fn list_by_student_cohort(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> Result<Vec<ScoreRecord>> {
    let (t, year) = encode_term(term);
    self
      .query_scores(
        "term = ?2 AND academic_year = ?3 AND subject_assignment_id IN
           (SELECT subject_assignment_id FROM subject_assignments WHERE class_id = ?1)",
        vec![boxed(encode_uuid(class_id)), boxed(t), boxed(year)],
      )
      .await
  }

  async fn upsert_score(&self, record: ScoreRecord) -> Result<ScoreRecord> {
    let student_id = encode_uuid(record.key.student_id);
    let sa_id      = encode_uuid(record.key.subject_assignment_id);
    let (t, year)  = encode_term(record.key.term);
    let ca1        = encode_decimal(record.ca1);
    let ca2        = encode_decimal(record.ca2);
    let exam       = encode_decimal(record.exam);
    let status     = record.status.to_string();
    let now        = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO score_records
             (student_id, subject_assignment_id, term, academic_year,
              ca1, ca2, exam, status, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT(student_id, subject_assignment_id, term, academic_year) DO UPDATE
             SET ca1        = excluded.ca1,
                 ca2        = excluded.ca2,
                 exam       = excluded.exam,
                 status     = excluded.status,
                 updated_at = excluded.updated_at",
          rusqlite::params![student_id, sa_id, t, year, ca1, ca2, exam, status, now],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }
}

// ─── School facts ────────────────────────────────────────────────────────────

impl SubjectRegistrationService for SqliteStore {
  type Error = crate::Error;

  async fn active_subjects_for(
    &self,
    student_id: Uuid,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> Result<Vec<Uuid>> {
    let student_id = encode_uuid(student_id);
    let class_id   = encode_uuid(class_id);
    let (t, year)  = encode_term(term);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.subject_assignment_id
           FROM registrations r
           JOIN subject_assignments sa ON sa.subject_assignment_id = r.subject_assignment_id
           WHERE r.student_id = ?1 AND sa.class_id = ?2
             AND r.term = ?3 AND r.academic_year = ?4 AND r.active = 1
           ORDER BY sa.sort_order, sa.subject_name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![student_id, class_id, t, year], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }
}

impl ClassRoster for SqliteStore {
  type Error = crate::Error;

  async fn cohort_members(&self, class_id: Uuid, term: AcademicTerm) -> Result<Vec<Student>> {
    let class_id  = encode_uuid(class_id);
    let (t, year) = encode_term(term);

    let raws: Vec<(String, String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT s.student_id, s.first_name, s.last_name
           FROM enrolments e
           JOIN students s ON s.student_id = e.student_id
           WHERE e.class_id = ?1 AND e.term = ?2 AND e.academic_year = ?3
           ORDER BY s.last_name, s.student_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![class_id, t, year], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(id, first_name, last_name)| -> Result<Student> {
        Ok(Student { student_id: decode_uuid(&id)?, first_name, last_name })
      })
      .collect()
  }
}

type RawAssignment = (String, String, String, String, i64);

fn into_assignment(
  (id, class_id, name, teacher, sort_order): RawAssignment,
) -> Result<SubjectAssignment> {
  Ok(SubjectAssignment {
    subject_assignment_id: decode_uuid(&id)?,
    class_id: decode_uuid(&class_id)?,
    subject_name: name,
    subject_teacher: teacher,
    sort_order,
  })
}

impl SubjectCatalog for SqliteStore {
  type Error = crate::Error;

  async fn subject_assignment(
    &self,
    subject_assignment_id: Uuid,
  ) -> Result<Option<SubjectAssignment>> {
    let id = encode_uuid(subject_assignment_id);

    let raw: Option<RawAssignment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT subject_assignment_id, class_id, subject_name, subject_teacher, sort_order
               FROM subject_assignments WHERE subject_assignment_id = ?1",
              rusqlite::params![id],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(into_assignment).transpose()
  }

  async fn subject_assignments(&self, class_id: Uuid) -> Result<Vec<SubjectAssignment>> {
    let class_id = encode_uuid(class_id);

    let raws: Vec<RawAssignment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT subject_assignment_id, class_id, subject_name, subject_teacher, sort_order
           FROM subject_assignments WHERE class_id = ?1
           ORDER BY sort_order, subject_name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![class_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(into_assignment).collect()
  }
}

impl AttendanceAdapter for SqliteStore {
  type Error = crate::Error;

  async fn get_attendance(
    &self,
    student_id: Uuid,
    term: AcademicTerm,
  ) -> Result<Option<AttendanceTotals>> {
    let student_id = encode_uuid(student_id);
    let (t, year)  = encode_term(term);

    let totals = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT present, required_days FROM attendance
               WHERE student_id = ?1 AND term = ?2 AND academic_year = ?3",
              rusqlite::params![student_id, t, year],
              |row| Ok(AttendanceTotals { present: row.get(0)?, required_days: row.get(1)? }),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(totals)
  }
}

impl RatingRepository for SqliteStore {
  type Error = crate::Error;

  async fn ratings_for(
    &self,
    student_id: Uuid,
    class_id: Uuid,
    term: AcademicTerm,
  ) -> Result<StudentRatings> {
    let student_id = encode_uuid(student_id);
    let class_id   = encode_uuid(class_id);
    let (t, year)  = encode_term(term);

    let raw: Option<(Option<String>, Option<String>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT affective_json, psychomotor_json FROM ratings
               WHERE student_id = ?1 AND class_id = ?2 AND term = ?3 AND academic_year = ?4",
              rusqlite::params![student_id, class_id, t, year],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((affective, psychomotor)) = raw else {
      return Ok(StudentRatings::default());
    };
    Ok(StudentRatings {
      affective:   affective.as_deref().map(serde_json::from_str).transpose()?,
      psychomotor: psychomotor.as_deref().map(serde_json::from_str).transpose()?,
    })
  }
}

// ─── Compiled results ────────────────────────────────────────────────────────

impl ResultRepository for SqliteStore {
  type Error = crate::Error;

  async fn get_result(&self, result_id: Uuid) -> Result<Option<CompiledResult>> {
    let mut found = self
      .query_documents(
        "SELECT document_json FROM compiled_results WHERE result_id = ?1",
        vec![boxed(encode_uuid(result_id))],
      )
      .await?;
    Ok(found.pop())
  }

  async fn find_result(&self, key: ResultKey) -> Result<Option<CompiledResult>> {
    let (t, year) = encode_term(key.term);
    let mut found = self
      .query_documents(
        "SELECT document_json FROM compiled_results
         WHERE student_id = ?1 AND class_id = ?2 AND term = ?3 AND academic_year = ?4",
        vec![
          boxed(encode_uuid(key.student_id)),
          boxed(encode_uuid(key.class_id)),
          boxed(t),
          boxed(year),
        ],
      )
      .await?;
    Ok(found.pop())
  }

  async fn results_for_student(
    &self,
    student_id: Uuid,
    term: AcademicTerm,
  ) -> Result<Vec<CompiledResult>> {
    let (t, year) = encode_term(term);
    self
      .query_documents(
        "SELECT document_json FROM compiled_results
         WHERE student_id = ?1 AND term = ?2 AND academic_year = ?3
         ORDER BY class_id",
        vec![boxed(encode_uuid(student_id)), boxed(t), boxed(year)],
      )
      .await
  }

  async fn list_cohort(&self, class_id: Uuid, term: AcademicTerm) -> Result<CohortResults> {
    let class_id  = encode_uuid(class_id);
    let (t, year) = encode_term(term);

    let (version, docs): (i64, Vec<String>) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let version: i64 = tx
          .query_row(
            "SELECT version FROM cohort_versions
             WHERE class_id = ?1 AND term = ?2 AND academic_year = ?3",
            rusqlite::params![class_id, t, year],
            |row| row.get(0),
          )
          .optional()?
          .unwrap_or(0);
        let docs = {
          let mut stmt = tx.prepare(
            "SELECT document_json FROM compiled_results
             WHERE class_id = ?1 AND term = ?2 AND academic_year = ?3
             ORDER BY student_id",
          )?;
          stmt
            .query_map(rusqlite::params![class_id, t, year], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok((version, docs))
      })
      .await?;

    Ok(CohortResults {
      version: u64::try_from(version).unwrap_or_default(),
      results: docs.iter().map(|d| decode_document(d)).collect::<Result<_>>()?,
    })
  }

  async fn save_cohort(
    &self,
    class_id: Uuid,
    term: AcademicTerm,
    expected_version: u64,
    results: Vec<CompiledResult>,
  ) -> Result<SaveOutcome> {
    let class_id  = encode_uuid(class_id);
    let (t, year) = encode_term(term);
    let now       = encode_dt(Utc::now());
    let rows = results
      .iter()
      .map(|r| -> Result<(String, String, String, String)> {
        Ok((
          encode_uuid(r.result_id),
          encode_uuid(r.key.student_id),
          r.status.to_string(),
          encode_document(r)?,
        ))
      })
      .collect::<Result<Vec<_>>>()?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let current: i64 = tx
          .query_row(
            "SELECT version FROM cohort_versions
             WHERE class_id = ?1 AND term = ?2 AND academic_year = ?3",
            rusqlite::params![class_id, t, year],
            |row| row.get(0),
          )
          .optional()?
          .unwrap_or(0);
        let current = u64::try_from(current).unwrap_or_default();
        if current != expected_version {
          // Dropping `tx` rolls back.
          return Ok(SaveOutcome::Conflict { current });
        }

        for (result_id, student_id, status, doc) in &rows {
          tx.execute(
            "INSERT INTO compiled_results
               (result_id, student_id, class_id, term, academic_year,
                status, document_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(result_id) DO UPDATE
               SET status        = excluded.status,
                   document_json = excluded.document_json,
                   updated_at    = excluded.updated_at",
            rusqlite::params![result_id, student_id, class_id, t, year, status, doc, now],
          )?;
        }

        let next = current + 1;
        tx.execute(
          "INSERT INTO cohort_versions (class_id, term, academic_year, version)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(class_id, term, academic_year) DO UPDATE SET version = excluded.version",
          rusqlite::params![class_id, t, year, next as i64],
        )?;
        tx.commit()?;
        Ok(SaveOutcome::Saved { version: next })
      })
      .await?;

    Ok(outcome)
  }

  async fn delete_result(&self, result_id: Uuid) -> Result<bool> {
    let id = encode_uuid(result_id);

    let deleted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM compiled_results WHERE result_id = ?1",
          rusqlite::params![id],
        )?;
        Ok(n)
      })
      .await?;
    Ok(deleted > 0)
  }
}

// ─── Approval and audit ──────────────────────────────────────────────────────

impl ApprovalAuthority for SqliteStore {
  type Error = crate::Error;

  async fn can_approve(&self, user_id: Uuid, class_id: Uuid) -> Result<bool> {
    let user_id  = encode_uuid(user_id);
    let class_id = encode_uuid(class_id);

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM approvers WHERE user_id = ?1 AND class_id = ?2",
              rusqlite::params![user_id, class_id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }
}

impl AuditSink for SqliteStore {
  type Error = crate::Error;

  async fn record_invalidation(
    &self,
    compiled_result_id: Uuid,
    reason: String,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let audit_id  = encode_uuid(Uuid::new_v4());
    let result_id = encode_uuid(compiled_result_id);
    let at        = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_log (audit_id, compiled_result_id, reason, recorded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![audit_id, result_id, reason, at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
