//! Encoding and decoding helpers between `trail-core` entities and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, booleans as 0/1 integers.

use chrono::{DateTime, Utc};
use trail_core::entity::{Emoji, Employee, User};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// `created_at` is stamped by the reconciler; fall back to now for records
/// that reach the store unstamped.
pub fn encode_created(dt: Option<DateTime<Utc>>) -> String {
  encode_dt(dt.unwrap_or_else(Utc::now))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

fn decode_count(column: &'static str, value: i64) -> Result<u32> {
  u32::try_from(value).map_err(|_| Error::OutOfRange { column, value })
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `users` row before timestamp parsing.
pub struct RawUser {
  pub id:           String,
  pub name:         String,
  pub real_name:    String,
  pub display_name: String,
  pub avatar:       String,
  pub status:       String,
  pub title:        String,
  pub admin:        bool,
  pub bot:          bool,
  pub deleted:      bool,
  pub created_at:   String,
  pub deleted_at:   Option<String>,
}

pub const USER_COLUMNS: &str = "id, name, real_name, display_name, avatar, status, title, \
                                admin, bot, deleted, created_at, deleted_at";

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      name:         row.get(1)?,
      real_name:    row.get(2)?,
      display_name: row.get(3)?,
      avatar:       row.get(4)?,
      status:       row.get(5)?,
      title:        row.get(6)?,
      admin:        row.get(7)?,
      bot:          row.get(8)?,
      deleted:      row.get(9)?,
      created_at:   row.get(10)?,
      deleted_at:   row.get(11)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:           self.id,
      name:         self.name,
      real_name:    self.real_name,
      display_name: self.display_name,
      avatar:       self.avatar,
      status:       self.status,
      title:        self.title,
      admin:        self.admin,
      bot:          self.bot,
      deleted:      self.deleted,
      created_at:   Some(decode_dt(&self.created_at)?),
      deleted_at:   decode_opt_dt(self.deleted_at)?,
    })
  }
}

/// An `emojis` row before timestamp parsing.
pub struct RawEmoji {
  pub name:       String,
  pub created_at: String,
}

impl RawEmoji {
  pub fn into_emoji(self) -> Result<Emoji> {
    Ok(Emoji { name: self.name, created_at: Some(decode_dt(&self.created_at)?) })
  }
}

/// An `employees` row before timestamp parsing.
pub struct RawEmployee {
  pub id:            String,
  pub name:          String,
  pub supervisor_id: String,
  pub reports_count: i64,
  pub deleted:       bool,
  pub created_at:    String,
  pub deleted_at:    Option<String>,
}

pub const EMPLOYEE_COLUMNS: &str =
  "id, name, supervisor_id, reports_count, deleted, created_at, deleted_at";

impl RawEmployee {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      name:          row.get(1)?,
      supervisor_id: row.get(2)?,
      reports_count: row.get(3)?,
      deleted:       row.get(4)?,
      created_at:    row.get(5)?,
      deleted_at:    row.get(6)?,
    })
  }

  pub fn into_employee(self) -> Result<Employee> {
    Ok(Employee {
      id:            self.id,
      name:          self.name,
      supervisor_id: self.supervisor_id,
      reports_count: decode_count("reports_count", self.reports_count)?,
      deleted:       self.deleted,
      created_at:    Some(decode_dt(&self.created_at)?),
      deleted_at:    decode_opt_dt(self.deleted_at)?,
    })
  }
}
