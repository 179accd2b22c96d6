//! Affective and psychomotor ratings on the fixed five-point behavioural
//! scale. Pure lookups, no aggregation.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A score on the 1–5 behavioural scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
  pub fn new(value: u8) -> Result<Self> {
    if (1..=5).contains(&value) {
      Ok(Self(value))
    } else {
      Err(Error::InvalidRating(value))
    }
  }

  pub fn value(self) -> u8 { self.0 }

  pub fn remark(self) -> &'static str {
    match self.0 {
      1 => "Poor",
      2 => "Fair",
      3 => "Good",
      4 => "Very Good",
      _ => "Excellent",
    }
  }
}

impl TryFrom<u8> for Rating {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self> { Self::new(value) }
}

impl From<Rating> for u8 {
  fn from(r: Rating) -> Self { r.0 }
}

/// A rating as it appears on the result sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedItem {
  pub name:   String,
  pub rating: Rating,
  pub remark: String,
}

impl RatedItem {
  fn new(name: &str, rating: Rating) -> Self {
    Self { name: name.to_owned(), rating, remark: rating.remark().to_owned() }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectiveRating {
  pub punctuality:              Rating,
  pub neatness:                 Rating,
  pub politeness:               Rating,
  pub attentiveness:            Rating,
  pub relationship_with_others: Rating,
}

impl AffectiveRating {
  pub fn items(&self) -> Vec<RatedItem> {
    vec![
      RatedItem::new("Punctuality", self.punctuality),
      RatedItem::new("Neatness", self.neatness),
      RatedItem::new("Politeness", self.politeness),
      RatedItem::new("Attentiveness", self.attentiveness),
      RatedItem::new("Relationship with others", self.relationship_with_others),
    ]
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsychomotorRating {
  pub handwriting:          Rating,
  pub sports:               Rating,
  pub drawing_and_painting: Rating,
  pub crafts:               Rating,
  pub verbal_fluency:       Rating,
}

impl PsychomotorRating {
  pub fn items(&self) -> Vec<RatedItem> {
    vec![
      RatedItem::new("Handwriting", self.handwriting),
      RatedItem::new("Sports", self.sports),
      RatedItem::new("Drawing and painting", self.drawing_and_painting),
      RatedItem::new("Crafts", self.crafts),
      RatedItem::new("Verbal fluency", self.verbal_fluency),
    ]
  }
}

/// Ratings on file for one student/class/term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRatings {
  pub affective:   Option<AffectiveRating>,
  pub psychomotor: Option<PsychomotorRating>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn remarks_follow_the_fixed_scale() {
    let remarks: Vec<_> = (1..=5).map(|v| Rating::new(v).unwrap().remark()).collect();
    assert_eq!(remarks, ["Poor", "Fair", "Good", "Very Good", "Excellent"]);
  }

  #[test]
  fn out_of_range_ratings_are_rejected() {
    assert!(matches!(Rating::new(0), Err(Error::InvalidRating(0))));
    assert!(matches!(Rating::new(6), Err(Error::InvalidRating(6))));
  }

  #[test]
  fn deserialising_validates_range() {
    assert!(serde_json::from_str::<Rating>("4").is_ok());
    assert!(serde_json::from_str::<Rating>("9").is_err());
  }
}
