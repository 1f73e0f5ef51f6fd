//! Rendering changes into chat messages.
//!
//! Each entity variant implements [`Announce`]. Rendering returns `None` when
//! a change should be applied silently (noisy status transitions).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::Serialize;

use crate::{
  change::Change,
  entity::{Emoji, Employee, Entity, Field, User},
  policy::NoisePolicy,
};

/// Shown in place of a supervisor that cannot be resolved.
pub const UNKNOWN: &str = "unknown";

/// Oregon Trail causes of death.
pub const DISEASES: &[&str] = &[
  "Dysentery",
  "Typhoid Fever",
  "Cholera",
  "Diphtheria",
  "Measles",
  "Thirst Traps",
];

pub fn random_disease() -> &'static str {
  let index = OsRng.next_u32() as usize % DISEASES.len();
  DISEASES.get(index).copied().unwrap_or("Dysentery")
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// An image shown beneath a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
  pub image_url: String,
  pub title:     String,
}

impl Attachment {
  pub fn image(url: impl Into<String>) -> Self {
    Self { image_url: url.into(), title: String::new() }
  }
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
  pub text:        String,
  /// Emoji code used as the poster's icon, e.g. `:rip:`.
  pub icon:        String,
  pub attachments: Vec<Attachment>,
}

impl Message {
  pub fn new(text: impl Into<String>, icon: impl Into<String>) -> Self {
    Self { text: text.into(), icon: icon.into(), attachments: vec![] }
  }

  pub fn with_attachment(mut self, attachment: Attachment) -> Self {
    self.attachments.push(attachment);
    self
  }
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// Identifier → display name, for resolving references between entities.
#[derive(Debug, Clone, Default)]
pub struct Directory {
  names: HashMap<String, String>,
}

impl Directory {
  /// Observed names win over known ones.
  pub fn build<E: Entity>(known: &[E], observed: &[E]) -> Self {
    let names = known
      .iter()
      .chain(observed)
      .map(|e| (e.id().to_owned(), e.display_name().to_owned()))
      .collect();
    Self { names }
  }

  pub fn name_of(&self, id: &str) -> &str {
    self.names.get(id).map(String::as_str).unwrap_or(UNKNOWN)
  }
}

// ─── Announcer ───────────────────────────────────────────────────────────────

/// Everything rendering needs beyond the change itself.
pub struct Announcer<'a> {
  pub directory: &'a Directory,
  pub noise:     &'a NoisePolicy,
  pub disease:   fn() -> &'static str,
}

impl Announcer<'_> {
  pub fn announce<E: Announce>(&self, change: &Change<E>) -> Option<Message> {
    E::announce(change, self)
  }
}

/// Per-variant message rendering.
pub trait Announce: Entity {
  fn announce(change: &Change<Self>, cx: &Announcer<'_>) -> Option<Message>;
}

impl Announce for User {
  fn announce(change: &Change<Self>, cx: &Announcer<'_>) -> Option<Message> {
    let message = match change {
      Change::Created(user) if user.deleted => Message::new(
        format!("I'm sorry for your loss, {} was stillborn", user.display_name()),
        ":baby:",
      ),
      Change::Created(user) => Message::new(
        format!(
          "Congratulations, you have a beautiful new baby named {}",
          user.display_name()
        ),
        ":baby:",
      ),
      Change::FieldChanged { entity, field, old, new } => match field {
        Field::DisplayName => Message::new(
          format!("{} changed their handle from {old} to {new}", entity.display_name()),
          ":name_badge:",
        ),
        Field::Title => Message::new(
          format!("{} changed their title from {old} to {new}", entity.display_name()),
          ":name_badge:",
        ),
        Field::Status => {
          if cx.noise.is_noisy(old, new) {
            return None;
          }
          Message::new(
            format!("{} changed their status from {old} to {new}", entity.display_name()),
            ":thought_balloon:",
          )
        }
        Field::Supervisor => return None,
      },
      Change::Removed(user) => Message::new(
        format!(
          "After {}, {} died of {}",
          lifespan(user.created_at, user.deleted_at),
          user.display_name(),
          (cx.disease)()
        ),
        ":rip:",
      )
      .with_attachment(Attachment::image(&user.avatar)),
      Change::Restored(user) => Message::new(
        format!("{} is back from the dead!", user.display_name()),
        ":zombie:",
      )
      .with_attachment(Attachment::image(&user.avatar)),
      Change::Gone(user) => Message::new(format!("{} vanished", user.display_name()), ":rip:"),
    };
    Some(message)
  }
}

impl Announce for Emoji {
  fn announce(change: &Change<Self>, _cx: &Announcer<'_>) -> Option<Message> {
    let icon = match change {
      Change::Created(_) => ":heavy_plus_sign:",
      Change::Gone(_) => ":heavy_minus_sign:",
      // Emojis have no fields and no tombstone.
      Change::FieldChanged { .. } | Change::Removed(_) | Change::Restored(_) => return None,
    };
    Some(Message::new(format!(":{}:", change.entity().name), icon))
  }
}

impl Announce for Employee {
  fn announce(change: &Change<Self>, cx: &Announcer<'_>) -> Option<Message> {
    let message = match change {
      Change::Created(employee) if employee.supervisor_id.trim().is_empty() => {
        Message::new(format!("{} joined", employee.name), ":baby:")
      }
      Change::Created(employee) => Message::new(
        format!(
          "{} joined, reporting to {}",
          employee.name,
          cx.directory.name_of(&employee.supervisor_id)
        ),
        ":baby:",
      ),
      Change::FieldChanged { entity, field: Field::Supervisor, old, new } => Message::new(
        format!(
          "{}'s supervisor changed from {} to {}",
          entity.name,
          cx.directory.name_of(old),
          cx.directory.name_of(new)
        ),
        ":name_badge:",
      ),
      Change::FieldChanged { .. } => return None,
      Change::Removed(employee) => Message::new(
        format!(
          "After {}, {} died of {}",
          lifespan(employee.created_at, employee.deleted_at),
          employee.name,
          (cx.disease)()
        ),
        ":rip:",
      ),
      Change::Restored(employee) => {
        Message::new(format!("{} is back from the dead!", employee.name), ":zombie:")
      }
      Change::Gone(employee) => Message::new(format!("{} vanished", employee.name), ":rip:"),
    };
    Some(message)
  }
}

/// Human-readable span between creation and the tombstone (or now).
fn lifespan(created: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> String {
  let Some(created) = created else {
    return "an unknown time".to_owned();
  };
  let span = until.unwrap_or_else(Utc::now).signed_duration_since(created);

  let plural = |n: i64, unit: &str| {
    if n == 1 { format!("1 {unit}") } else { format!("{n} {unit}s") }
  };

  match (span.num_days(), span.num_hours()) {
    (days, _) if days >= 1 => plural(days, "day"),
    (_, hours) if hours >= 1 => plural(hours, "hour"),
    _ => "a few minutes".to_owned(),
  }
}
