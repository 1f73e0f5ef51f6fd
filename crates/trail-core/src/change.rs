//! The change taxonomy produced by the diff engine.
//!
//! A [`Change`] carries the entity in the state it should be persisted in
//! once the change is applied. Tombstone and creation timestamps are filled
//! in by [`Change::settle`], which the reconciler calls with the run's
//! timestamp before announcing and persisting.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::entity::{Entity, Field};

/// One classified difference between the known and observed collections.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<E> {
  /// Present in the observed collection, absent from the known one.
  Created(E),
  /// A tracked field differs. `entity` already holds `new`.
  FieldChanged {
    entity: E,
    field:  Field,
    old:    String,
    new:    String,
  },
  /// The source now reports the entity as deleted.
  Removed(E),
  /// The source reports a previously deleted entity as live again.
  Restored(E),
  /// Absent from the observed collection. Only for hard-delete variants.
  Gone(E),
}

/// The discriminant of a [`Change`], with the field for field changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
  Created,
  FieldChanged(Field),
  Removed,
  Restored,
  Gone,
}

impl fmt::Display for ChangeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Created => f.write_str("creation"),
      Self::FieldChanged(field) => write!(f, "{field} change"),
      Self::Removed => f.write_str("removal"),
      Self::Restored => f.write_str("restoration"),
      Self::Gone => f.write_str("disappearance"),
    }
  }
}

impl<E: Entity> Change<E> {
  pub fn entity(&self) -> &E {
    match self {
      Self::Created(e) | Self::Removed(e) | Self::Restored(e) | Self::Gone(e) => e,
      Self::FieldChanged { entity, .. } => entity,
    }
  }

  pub fn kind(&self) -> ChangeKind {
    match self {
      Self::Created(_) => ChangeKind::Created,
      Self::FieldChanged { field, .. } => ChangeKind::FieldChanged(*field),
      Self::Removed(_) => ChangeKind::Removed,
      Self::Restored(_) => ChangeKind::Restored,
      Self::Gone(_) => ChangeKind::Gone,
    }
  }

  /// Stamp the lifecycle timestamps this change implies, as of `now`.
  ///
  /// - `Created`: `created_at = now`; a record that arrives already deleted
  ///   is tombstoned at `now` too.
  /// - `Removed`: tombstoned at `now`.
  /// - `Restored`: tombstone cleared.
  pub fn settle(self, now: DateTime<Utc>) -> Self {
    match self {
      Self::Created(mut e) => {
        e.set_created_at(now);
        let tombstone = e.is_deleted().then_some(now);
        e.set_deleted(tombstone);
        Self::Created(e)
      }
      Self::Removed(mut e) => {
        e.set_deleted(Some(now));
        Self::Removed(e)
      }
      Self::Restored(mut e) => {
        e.set_deleted(None);
        Self::Restored(e)
      }
      other => other,
    }
  }
}
