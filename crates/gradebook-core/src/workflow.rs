//! Approval workflow for compiled results.
//!
//! ```text
//! Draft ──submit──▶ PendingApproval ──approve──▶ Approved
//!   ▲                    │                          │
//!   │                  reject                   invalidate
//!   │                    ▼                          │
//!   └──────reopen──── Rejected                      │
//!   └───────────────────────────────────────────────┘
//! ```
//!
//! `invalidate` is only ever issued by the engine when a recompile changes an
//! approved snapshot. Guards that need outside information (completeness,
//! approver capability, rejection comment) are checked by the caller before
//! the transition is applied.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
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
pub enum ResultStatus {
  #[default]
  Draft,
  PendingApproval,
  Approved,
  Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
  Submit,
  Approve,
  Reject,
  Reopen,
  Invalidate,
}

impl Transition {
  pub fn target(self) -> ResultStatus {
    match self {
      Self::Submit => ResultStatus::PendingApproval,
      Self::Approve => ResultStatus::Approved,
      Self::Reject => ResultStatus::Rejected,
      Self::Reopen | Self::Invalidate => ResultStatus::Draft,
    }
  }
}

impl ResultStatus {
  /// Apply `transition`, or fail with [`Error::IllegalTransition`].
  pub fn apply(self, transition: Transition) -> Result<Self> {
    use ResultStatus::*;
    use Transition::*;

    match (self, transition) {
      (Draft, Submit)
      | (PendingApproval, Approve)
      | (PendingApproval, Reject)
      | (Rejected, Reopen)
      | (Approved, Invalidate) => Ok(transition.target()),
      _ => Err(Error::IllegalTransition { from: self, to: transition.target() }),
    }
  }

  /// Whether a recompile may replace the snapshot without a transition.
  pub fn accepts_recompile(self) -> bool { !matches!(self, Self::Approved) }

  /// Narrative fields are frozen once approved.
  pub fn accepts_narrative(self) -> bool { !matches!(self, Self::Approved) }
}
