//! Term context threaded explicitly through every engine call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three terms of a school session.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Term {
  First,
  Second,
  Third,
}

/// The calendar year a session starts in; `2025` is the 2025/2026 session.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AcademicYear(pub u16);

impl fmt::Display for AcademicYear {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.0, u32::from(self.0) + 1)
  }
}

/// A (term, academic year) pair.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AcademicTerm {
  pub term:          Term,
  pub academic_year: AcademicYear,
}

impl AcademicTerm {
  pub fn new(term: Term, academic_year: u16) -> Self {
    Self { term, academic_year: AcademicYear(academic_year) }
  }
}

impl fmt::Display for AcademicTerm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} term {}", self.term, self.academic_year)
  }
}
