//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings and
//! decimals their canonical string form, so no precision is lost to `REAL`.
//! Terms are split into a text term and an integer academic year.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use gradebook_core::{
  result::CompiledResult,
  score::{ScoreKey, ScoreRecord, ScoreStatus},
  term::{AcademicTerm, AcademicYear, Term},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.normalize().to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

// ─── AcademicTerm ────────────────────────────────────────────────────────────

/// `(term, academic_year)` column values.
pub fn encode_term(t: AcademicTerm) -> (String, i64) {
  (t.term.to_string(), i64::from(t.academic_year.0))
}

pub fn decode_term(term: &str, academic_year: i64) -> Result<AcademicTerm> {
  let term = Term::from_str(term)
    .map_err(|_| Error::UnknownVariant { column: "term", value: term.to_owned() })?;
  let year = u16::try_from(academic_year).map_err(|_| Error::UnknownVariant {
    column: "academic_year",
    value:  academic_year.to_string(),
  })?;
  Ok(AcademicTerm { term, academic_year: AcademicYear(year) })
}

// ─── ScoreStatus ─────────────────────────────────────────────────────────────

pub fn decode_score_status(s: &str) -> Result<ScoreStatus> {
  ScoreStatus::from_str(s)
    .map_err(|_| Error::UnknownVariant { column: "status", value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `score_records` row.
pub struct RawScoreRecord {
  pub student_id:            String,
  pub subject_assignment_id: String,
  pub term:                  String,
  pub academic_year:         i64,
  pub ca1:                   String,
  pub ca2:                   String,
  pub exam:                  String,
  pub status:                String,
}

pub const SCORE_COLUMNS: &str =
  "student_id, subject_assignment_id, term, academic_year, ca1, ca2, exam, status";

impl RawScoreRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:            row.get(0)?,
      subject_assignment_id: row.get(1)?,
      term:                  row.get(2)?,
      academic_year:         row.get(3)?,
      ca1:                   row.get(4)?,
      ca2:                   row.get(5)?,
      exam:                  row.get(6)?,
      status:                row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<ScoreRecord> {
    Ok(ScoreRecord {
      key:    ScoreKey {
        student_id:            decode_uuid(&self.student_id)?,
        subject_assignment_id: decode_uuid(&self.subject_assignment_id)?,
        term:                  decode_term(&self.term, self.academic_year)?,
      },
      ca1:    decode_decimal(&self.ca1)?,
      ca2:    decode_decimal(&self.ca2)?,
      exam:   decode_decimal(&self.exam)?,
      status: decode_score_status(&self.status)?,
    })
  }
}

// ─── Compiled results ────────────────────────────────────────────────────────

pub fn encode_document(result: &CompiledResult) -> Result<String> {
  Ok(serde_json::to_string(result)?)
}

pub fn decode_document(s: &str) -> Result<CompiledResult> { Ok(serde_json::from_str(s)?) }
