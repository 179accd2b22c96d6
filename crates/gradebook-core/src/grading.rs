//! Grade bands: mapping a 0–100 total to a letter grade and remark.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One configured band, e.g. `A: 70–100 "Excellent"`. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeBand {
  pub grade:  String,
  pub remark: String,
  pub min:    Decimal,
  pub max:    Decimal,
}

impl GradeBand {
  pub fn new(grade: &str, remark: &str, min: u32, max: u32) -> Self {
    Self {
      grade:  grade.to_owned(),
      remark: remark.to_owned(),
      min:    Decimal::from(min),
      max:    Decimal::from(max),
    }
  }
}

/// The grade and remark assigned to a total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
  pub grade:  String,
  pub remark: String,
}

/// A validated band table: sorted ascending, covering `[0, 100]` with no
/// overlap.
///
/// Bands written with whole-mark bounds (`B: 60–69`, `A: 70–100`) leave a
/// fractional gap between them; lookup picks the band with the greatest
/// `min <= total`, so `69.5` grades as `B`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GradeTable {
  bands: Vec<GradeBand>,
}

impl GradeTable {
  pub fn new(mut bands: Vec<GradeBand>) -> Result<Self> {
    if bands.is_empty() {
      return Err(Error::InvalidGradeBand("no bands configured".into()));
    }
    bands.sort_by(|a, b| a.min.cmp(&b.min));

    for band in &bands {
      if band.grade.trim().is_empty() {
        return Err(Error::InvalidGradeBand("band with an empty grade".into()));
      }
      if band.min > band.max {
        return Err(Error::InvalidGradeBand(format!(
          "band {} has min {} above max {}",
          band.grade, band.min, band.max
        )));
      }
    }

    let first = &bands[0];
    if first.min != Decimal::ZERO {
      return Err(Error::InvalidGradeBand(format!(
        "lowest band {} starts at {}, not 0",
        first.grade, first.min
      )));
    }
    let last = &bands[bands.len() - 1];
    if last.max != Decimal::ONE_HUNDRED {
      return Err(Error::InvalidGradeBand(format!(
        "highest band {} ends at {}, not 100",
        last.grade, last.max
      )));
    }

    for pair in bands.windows(2) {
      let (lower, upper) = (&pair[0], &pair[1]);
      if upper.min <= lower.max {
        return Err(Error::InvalidGradeBand(format!(
          "bands {} and {} overlap",
          lower.grade, upper.grade
        )));
      }
      if upper.min > lower.max + Decimal::ONE {
        return Err(Error::InvalidGradeBand(format!(
          "gap between bands {} and {}",
          lower.grade, upper.grade
        )));
      }
    }

    Ok(Self { bands })
  }

  pub fn bands(&self) -> &[GradeBand] { &self.bands }

  /// Grade a total. Totals outside `[0, 100]` are clamped first.
  pub fn grade_for(&self, total: Decimal) -> Grade {
    let total = total.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    // The first band starts at 0, so a match always exists.
    let band = self
      .bands
      .iter()
      .rev()
      .find(|b| b.min <= total)
      .unwrap_or(&self.bands[0]);
    Grade { grade: band.grade.clone(), remark: band.remark.clone() }
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  fn standard() -> Vec<GradeBand> {
    vec![
      GradeBand::new("A", "Excellent", 70, 100),
      GradeBand::new("B", "Very Good", 60, 69),
      GradeBand::new("C", "Good", 50, 59),
      GradeBand::new("D", "Fair", 40, 49),
      GradeBand::new("F", "Fail", 0, 39),
    ]
  }

  #[test]
  fn grades_band_edges() {
    let table = GradeTable::new(standard()).unwrap();
    assert_eq!(table.grade_for(Decimal::from(100)).grade, "A");
    assert_eq!(table.grade_for(Decimal::from(70)).grade, "A");
    assert_eq!(table.grade_for(Decimal::from(69)).grade, "B");
    assert_eq!(table.grade_for(Decimal::new(695, 1)).grade, "B");
    assert_eq!(table.grade_for(Decimal::from(40)).grade, "D");
    assert_eq!(table.grade_for(Decimal::from(39)).grade, "F");
    assert_eq!(table.grade_for(Decimal::ZERO).grade, "F");
  }

  #[test]
  fn input_order_does_not_matter() {
    let mut reversed = standard();
    reversed.reverse();
    assert_eq!(GradeTable::new(reversed).unwrap(), GradeTable::new(standard()).unwrap());
  }

  #[test]
  fn rejects_empty_table() {
    assert!(matches!(GradeTable::new(vec![]), Err(Error::InvalidGradeBand(_))));
  }

  #[test]
  fn rejects_overlap() {
    let mut bands = standard();
    bands[1].max = Decimal::from(72);
    assert!(matches!(GradeTable::new(bands), Err(Error::InvalidGradeBand(_))));
  }

  #[test]
  fn rejects_gap() {
    let mut bands = standard();
    bands[2] = GradeBand::new("C", "Good", 52, 59);
    assert!(matches!(GradeTable::new(bands), Err(Error::InvalidGradeBand(_))));
  }

  #[test]
  fn rejects_table_not_reaching_hundred() {
    let mut bands = standard();
    bands[0].max = Decimal::from(99);
    assert!(matches!(GradeTable::new(bands), Err(Error::InvalidGradeBand(_))));
  }

  #[test]
  fn rejects_table_not_starting_at_zero() {
    let mut bands = standard();
    bands[4].min = Decimal::from(1);
    assert!(matches!(GradeTable::new(bands), Err(Error::InvalidGradeBand(_))));
  }

  /// A valid table with a band starting at 0 and at every cut point.
  fn partition(cuts: &std::collections::BTreeSet<u32>) -> Vec<GradeBand> {
    let starts: Vec<u32> = std::iter::once(0).chain(cuts.iter().copied()).collect();
    starts
      .iter()
      .enumerate()
      .map(|(i, &min)| {
        let max = starts.get(i + 1).map_or(100, |next| next - 1);
        GradeBand::new(&format!("G{i}"), "band", min, max)
      })
      .collect()
  }

  fn containing(table: &GradeTable, total: Decimal) -> Vec<&GradeBand> {
    table
      .bands()
      .iter()
      .filter(|b| b.min <= total && total < b.max + Decimal::ONE)
      .collect()
  }

  proptest! {
    #[test]
    fn every_total_lands_in_exactly_one_band(tenths in 0i64..=1_000) {
      let table = GradeTable::new(standard()).unwrap();
      let total = Decimal::new(tenths, 1);
      let grade = table.grade_for(total);
      let containing = containing(&table, total);
      prop_assert_eq!(containing.len(), 1);
      prop_assert_eq!(&containing[0].grade, &grade.grade);
    }

    #[test]
    fn any_partition_of_the_scale_is_exhaustive(
      cuts in prop::collection::btree_set(1u32..=100, 0..20),
      tenths in 0i64..=1_000,
    ) {
      let mut bands = partition(&cuts);
      prop_assert_eq!(bands.len(), cuts.len() + 1);
      bands.reverse();
      let table = GradeTable::new(bands).unwrap();

      let total = Decimal::new(tenths, 1);
      let containing = containing(&table, total);
      prop_assert_eq!(containing.len(), 1);
      prop_assert_eq!(&containing[0].grade, &table.grade_for(total).grade);
    }
  }
}
