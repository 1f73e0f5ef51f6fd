//! Snapshot diff: known collection + observed collection → ordered changes.
//!
//! Entities are joined on their identifier. For each observed entity the
//! tracked fields are compared in the variant's fixed order, then the
//! deletion flag. Variants without a tombstone get a final pass over the
//! known collection to find records the source no longer reports.

use std::collections::{HashMap, HashSet};

use crate::{
  change::Change,
  entity::{DeletionPolicy, Entity, Field},
  policy::TrackingPolicy,
};

/// Compute the changes that bring `known` in line with `observed`.
///
/// Within one entity, field changes come before the deletion-state change,
/// and each field change carries the entity with all earlier changes
/// already applied.
pub fn diff<E: Entity>(
  known: &[E],
  observed: &[E],
  tracking: &TrackingPolicy,
) -> Vec<Change<E>> {
  let lookup: HashMap<&str, &E> = known.iter().map(|e| (e.id(), e)).collect();
  let fields: Vec<Field> = E::FIELDS
    .iter()
    .copied()
    .filter(|f| tracking.tracks(E::KIND, *f))
    .collect();

  let mut changes: Vec<Change<E>> = vec![];

  for incoming in observed {
    let Some(existing) = lookup.get(incoming.id()) else {
      changes.push(Change::Created(incoming.clone()));
      continue;
    };

    let mut current = (*existing).clone();

    for &field in &fields {
      if let Some((old, new)) = field_change(field, &current, incoming) {
        current.set_field(field, new.clone());
        changes.push(Change::FieldChanged {
          entity: current.clone(),
          field,
          old,
          new,
        });
      }
    }

    match (existing.is_deleted(), incoming.is_deleted()) {
      (false, true) => changes.push(Change::Removed(current)),
      (true, false) => changes.push(Change::Restored(current)),
      _ => {}
    }
  }

  if E::DELETION == DeletionPolicy::HardDelete {
    let seen: HashSet<&str> = observed.iter().map(E::id).collect();
    changes.extend(
      known
        .iter()
        .filter(|e| !seen.contains(e.id()))
        .cloned()
        .map(Change::Gone),
    );
  }

  changes
}

/// Returns `(old, new)` if `field` differs between the two versions.
fn field_change<E: Entity>(
  field: Field,
  current: &E,
  incoming: &E,
) -> Option<(String, String)> {
  let old = current.field(field).unwrap_or_default();
  let new = incoming.field(field).unwrap_or_default();

  if old == new {
    return None;
  }
  if field.blank_is_unknown() && new.trim().is_empty() {
    return None;
  }
  Some((old.to_owned(), new.to_owned()))
}
