//! Per-field change policy.
//!
//! [`TrackingPolicy`] decides which fields produce change events at all;
//! [`NoisePolicy`] decides which status transitions are applied silently.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::entity::{EntityKind, Field};

/// Statuses that flap too often to be worth a message.
pub const QUIET_STATUSES: &[&str] = &[
  ":slack_call: On a call",
  ":spiral_calendar_pad: In a meeting",
  ":bus: Commuting",
  ":palm_tree: Vacationing",
  ":house_with_garden: Working remotely",
];

// ─── Tracking ────────────────────────────────────────────────────────────────

/// Which comparable fields emit [`Change::FieldChanged`](crate::change::Change).
///
/// Display name and title are always tracked for users. Status tracking is
/// off by default; supervisor tracking for employees is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrackingPolicy {
  pub track_user_status: bool,
  pub track_supervisor:  bool,
}

impl Default for TrackingPolicy {
  fn default() -> Self { Self { track_user_status: false, track_supervisor: true } }
}

impl TrackingPolicy {
  pub fn tracks(&self, kind: EntityKind, field: Field) -> bool {
    match (kind, field) {
      (EntityKind::User, Field::DisplayName | Field::Title) => true,
      (EntityKind::User, Field::Status) => self.track_user_status,
      (EntityKind::Employee, Field::Supervisor) => self.track_supervisor,
      _ => false,
    }
  }
}

// ─── Noise ───────────────────────────────────────────────────────────────────

/// Deny-list of status values whose transitions are not announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoisePolicy {
  statuses: BTreeSet<String>,
}

impl Default for NoisePolicy {
  fn default() -> Self {
    Self { statuses: QUIET_STATUSES.iter().map(|s| (*s).to_owned()).collect() }
  }
}

impl NoisePolicy {
  /// The default deny-list extended with `extra`.
  pub fn with_extra<I, S>(extra: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut policy = Self::default();
    policy.statuses.extend(extra.into_iter().map(Into::into));
    policy
  }

  /// True if either end of the transition is a quiet status.
  pub fn is_noisy(&self, from: &str, to: &str) -> bool {
    self.statuses.contains(from.trim()) || self.statuses.contains(to.trim())
  }
}

/// Everything that shapes a run apart from its collaborators. Built once at
/// startup and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct Policy {
  pub tracking: TrackingPolicy,
  pub noise:    NoisePolicy,
}
