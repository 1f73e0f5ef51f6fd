//! Directory entities: the records a reconciliation run compares.
//!
//! Every entity is keyed by an identifier assigned by the remote source. The
//! [`Entity`] trait gives the diff engine a uniform view over the three
//! variants: which fields it compares, how those fields are read and written,
//! and whether a vanished record is tombstoned or deleted outright.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Kinds and fields ────────────────────────────────────────────────────────

/// The entity domain a reconciliation run operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  User,
  Emoji,
  Employee,
}

impl EntityKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Emoji => "emoji",
      Self::Employee => "employee",
    }
  }

  pub fn plural(self) -> &'static str {
    match self {
      Self::User => "users",
      Self::Emoji => "emojis",
      Self::Employee => "employees",
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A comparable, mutable field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
  DisplayName,
  Title,
  Status,
  Supervisor,
}

impl Field {
  /// Whether a blank observed value means "no information" rather than
  /// "cleared". Such a value never produces a change.
  pub fn blank_is_unknown(self) -> bool { matches!(self, Self::Supervisor) }
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::DisplayName => "display name",
      Self::Title => "title",
      Self::Status => "status",
      Self::Supervisor => "supervisor",
    })
  }
}

/// What happens to a persisted record once the remote source stops
/// reporting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
  /// The source reports deletion through a flag; the row is kept and marked.
  Tombstone,
  /// The source simply drops the record; the row is deleted.
  HardDelete,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Uniform access to a directory record.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
  const KIND: EntityKind;
  const DELETION: DeletionPolicy;
  /// Comparable fields, in the order they are compared.
  const FIELDS: &'static [Field];

  fn id(&self) -> &str;

  /// The name used when talking about this record in a message.
  fn display_name(&self) -> &str;

  fn is_deleted(&self) -> bool;

  /// Current value of `field`, or `None` if this variant has no such field.
  fn field(&self, field: Field) -> Option<&str>;

  fn set_field(&mut self, field: Field, value: String);

  fn created_at(&self) -> Option<DateTime<Utc>>;

  fn set_created_at(&mut self, at: DateTime<Utc>);

  fn deleted_at(&self) -> Option<DateTime<Utc>>;

  /// Set (`Some`) or clear (`None`) the tombstone. Keeps the deletion flag
  /// and its timestamp in step.
  fn set_deleted(&mut self, at: Option<DateTime<Utc>>);
}

// ─── User ────────────────────────────────────────────────────────────────────

/// A member of the chat workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:           String,
  /// The account handle, e.g. `zach`.
  pub name:         String,
  pub real_name:    String,
  pub display_name: String,
  /// URL of the original-size avatar image.
  pub avatar:       String,
  /// Status emoji and text, e.g. `:bus: Commuting`.
  pub status:       String,
  pub title:        String,
  pub admin:        bool,
  pub bot:          bool,
  pub deleted:      bool,
  pub created_at:   Option<DateTime<Utc>>,
  pub deleted_at:   Option<DateTime<Utc>>,
}

impl User {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self { id: id.into(), name: name.into(), ..Self::default() }
  }
}

impl Entity for User {
  const KIND: EntityKind = EntityKind::User;
  const DELETION: DeletionPolicy = DeletionPolicy::Tombstone;
  const FIELDS: &'static [Field] = &[Field::DisplayName, Field::Title, Field::Status];

  fn id(&self) -> &str { &self.id }

  fn display_name(&self) -> &str {
    if self.real_name.is_empty() { &self.name } else { &self.real_name }
  }

  fn is_deleted(&self) -> bool { self.deleted }

  fn field(&self, field: Field) -> Option<&str> {
    match field {
      Field::DisplayName => Some(&self.display_name),
      Field::Title => Some(&self.title),
      Field::Status => Some(&self.status),
      Field::Supervisor => None,
    }
  }

  fn set_field(&mut self, field: Field, value: String) {
    match field {
      Field::DisplayName => self.display_name = value,
      Field::Title => self.title = value,
      Field::Status => self.status = value,
      Field::Supervisor => {}
    }
  }

  fn created_at(&self) -> Option<DateTime<Utc>> { self.created_at }

  fn set_created_at(&mut self, at: DateTime<Utc>) { self.created_at = Some(at); }

  fn deleted_at(&self) -> Option<DateTime<Utc>> { self.deleted_at }

  fn set_deleted(&mut self, at: Option<DateTime<Utc>>) {
    self.deleted = at.is_some();
    self.deleted_at = at;
  }
}

// ─── Emoji ───────────────────────────────────────────────────────────────────

/// A custom emoji. Its name is its identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
  pub name:       String,
  pub created_at: Option<DateTime<Utc>>,
}

impl Emoji {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), created_at: None }
  }
}

impl Entity for Emoji {
  const KIND: EntityKind = EntityKind::Emoji;
  const DELETION: DeletionPolicy = DeletionPolicy::HardDelete;
  const FIELDS: &'static [Field] = &[];

  fn id(&self) -> &str { &self.name }

  fn display_name(&self) -> &str { &self.name }

  fn is_deleted(&self) -> bool { false }

  fn field(&self, _field: Field) -> Option<&str> { None }

  fn set_field(&mut self, _field: Field, _value: String) {}

  fn created_at(&self) -> Option<DateTime<Utc>> { self.created_at }

  fn set_created_at(&mut self, at: DateTime<Utc>) { self.created_at = Some(at); }

  fn deleted_at(&self) -> Option<DateTime<Utc>> { None }

  fn set_deleted(&mut self, _at: Option<DateTime<Utc>>) {}
}

// ─── Employee ────────────────────────────────────────────────────────────────

/// A node of the HR org chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
  pub id:            String,
  pub name:          String,
  /// Identifier of another employee; empty at the root of the chart.
  pub supervisor_id: String,
  pub reports_count: u32,
  pub deleted:       bool,
  pub created_at:    Option<DateTime<Utc>>,
  pub deleted_at:    Option<DateTime<Utc>>,
}

impl Employee {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self { id: id.into(), name: name.into(), ..Self::default() }
  }
}

impl Entity for Employee {
  const KIND: EntityKind = EntityKind::Employee;
  const DELETION: DeletionPolicy = DeletionPolicy::Tombstone;
  const FIELDS: &'static [Field] = &[Field::Supervisor];

  fn id(&self) -> &str { &self.id }

  fn display_name(&self) -> &str { &self.name }

  fn is_deleted(&self) -> bool { self.deleted }

  fn field(&self, field: Field) -> Option<&str> {
    match field {
      Field::Supervisor => Some(&self.supervisor_id),
      _ => None,
    }
  }

  fn set_field(&mut self, field: Field, value: String) {
    if field == Field::Supervisor {
      self.supervisor_id = value;
    }
  }

  fn created_at(&self) -> Option<DateTime<Utc>> { self.created_at }

  fn set_created_at(&mut self, at: DateTime<Utc>) { self.created_at = Some(at); }

  fn deleted_at(&self) -> Option<DateTime<Utc>> { self.deleted_at }

  fn set_deleted(&mut self, at: Option<DateTime<Utc>>) {
    self.deleted = at.is_some();
    self.deleted_at = at;
  }
}
