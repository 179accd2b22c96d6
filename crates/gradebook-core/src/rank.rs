//! Cohort ranking with standard competition positions (1, 1, 3, 4).

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
  pub student_id:    Uuid,
  pub average_score: Decimal,
  pub total_score:   Decimal,
  pub last_name:     String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
  #[serde(flatten)]
  pub entry:    RankEntry,
  /// 1-based; tied entries share a position.
  pub position: u32,
}

/// Listing order: average desc, total desc, last name asc, then student id.
///
/// Only average and total decide a position; the name and id keys make the
/// order within a tie reproducible regardless of input order.
fn listing_order(a: &RankEntry, b: &RankEntry) -> Ordering {
  b.average_score
    .cmp(&a.average_score)
    .then_with(|| b.total_score.cmp(&a.total_score))
    .then_with(|| a.last_name.cmp(&b.last_name))
    .then_with(|| a.student_id.cmp(&b.student_id))
}

fn same_standing(a: &RankEntry, b: &RankEntry) -> bool {
  a.average_score == b.average_score && a.total_score == b.total_score
}

/// Rank an entire cohort. Always called with every member; there is no
/// incremental variant because one changed score can move everyone.
pub fn rank_cohort(mut entries: Vec<RankEntry>) -> Vec<RankedEntry> {
  entries.sort_by(listing_order);

  let mut ranked: Vec<RankedEntry> = Vec::with_capacity(entries.len());
  for (index, entry) in entries.into_iter().enumerate() {
    let position = match ranked.last() {
      Some(prev) if same_standing(&prev.entry, &entry) => prev.position,
      _ => index as u32 + 1,
    };
    ranked.push(RankedEntry { entry, position });
  }
  ranked
}

/// `1` → `1st`, `12` → `12th`, `22` → `22nd`.
pub fn ordinal(n: u32) -> String {
  let suffix = match (n % 10, n % 100) {
    (_, 11..=13) => "th",
    (1, _) => "st",
    (2, _) => "nd",
    (3, _) => "rd",
    _ => "th",
  };
  format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  fn entry(last_name: &str, average: i64, total: i64) -> RankEntry {
    RankEntry {
      student_id:    Uuid::new_v4(),
      average_score: Decimal::from(average),
      total_score:   Decimal::from(total),
      last_name:     last_name.to_owned(),
    }
  }

  fn positions(ranked: &[RankedEntry]) -> Vec<u32> {
    ranked.iter().map(|r| r.position).collect()
  }

  #[test]
  fn competition_ranking_skips_after_ties() {
    let ranked = rank_cohort(vec![
      entry("Obi", 80, 160),
      entry("Ade", 90, 180),
      entry("Eze", 70, 140),
      entry("Bello", 90, 180),
    ]);
    assert_eq!(positions(&ranked), [1, 1, 3, 4]);
  }

  #[test]
  fn ties_list_by_last_name() {
    let ranked = rank_cohort(vec![entry("Obi", 90, 180), entry("Ade", 90, 180)]);
    let names: Vec<_> = ranked.iter().map(|r| r.entry.last_name.as_str()).collect();
    assert_eq!(names, ["Ade", "Obi"]);
    assert_eq!(positions(&ranked), [1, 1]);
  }

  #[test]
  fn equal_average_breaks_on_total() {
    let ranked = rank_cohort(vec![entry("Ade", 75, 300), entry("Obi", 75, 375)]);
    assert_eq!(ranked[0].entry.last_name, "Obi");
    assert_eq!(positions(&ranked), [1, 2]);
  }

  #[test]
  fn empty_cohort() {
    assert!(rank_cohort(vec![]).is_empty());
  }

  #[test]
  fn ordinal_suffixes() {
    let rendered: Vec<_> =
      [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 101, 111, 112, 113].map(ordinal).to_vec();
    assert_eq!(
      rendered,
      [
        "1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "23rd", "101st",
        "111th", "112th", "113th"
      ]
    );
  }

  proptest! {
    #[test]
    fn ranking_ignores_input_order(
      scores in proptest::collection::vec((0i64..5, 0i64..3), 1..12),
      rotate in 0usize..12,
    ) {
      let entries: Vec<RankEntry> = scores
        .iter()
        .enumerate()
        .map(|(i, (avg, total))| RankEntry {
          student_id:    Uuid::from_u128(i as u128),
          average_score: Decimal::from(*avg),
          total_score:   Decimal::from(*total),
          last_name:     format!("S{}", i % 3),
        })
        .collect();
      let mut shuffled = entries.clone();
      shuffled.reverse();
      let len = shuffled.len();
      shuffled.rotate_left(rotate % len);

      prop_assert_eq!(rank_cohort(entries), rank_cohort(shuffled));
    }
  }
}
