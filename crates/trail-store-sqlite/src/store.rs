//! [`SqliteStore`]: the SQLite implementation of [`EntityStore`].

use std::path::Path;

use trail_core::{
  entity::{Emoji, Employee, User},
  store::EntityStore,
};

use crate::{
  encode::{
    EMPLOYEE_COLUMNS, RawEmoji, RawEmployee, RawUser, USER_COLUMNS, encode_created,
    encode_dt,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The persisted directory, backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Delete the row keyed by `id` from `table`.
  async fn delete_from(&self, table: &'static str, key: &'static str, id: &str) -> Result<()> {
    let id = id.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!("DELETE FROM {table} WHERE {key} = ?1"),
          rusqlite::params![id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

impl EntityStore<User> for SqliteStore {
  type Error = Error;

  async fn load_all(&self) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY rowid"))?;
        let rows = stmt
          .query_map([], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn persist(&self, user: &User) -> Result<()> {
    let user           = user.clone();
    let created_at_str = encode_created(user.created_at);
    let deleted_at_str = user.deleted_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (
             id, name, real_name, display_name, avatar, status, title,
             admin, bot, deleted, created_at, deleted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
           ON CONFLICT (id) DO UPDATE SET
             name         = excluded.name,
             real_name    = excluded.real_name,
             display_name = excluded.display_name,
             avatar       = excluded.avatar,
             status       = excluded.status,
             title        = excluded.title,
             admin        = excluded.admin,
             bot          = excluded.bot,
             deleted      = excluded.deleted,
             deleted_at   = excluded.deleted_at",
          rusqlite::params![
            user.id,
            user.name,
            user.real_name,
            user.display_name,
            user.avatar,
            user.status,
            user.title,
            user.admin,
            user.bot,
            user.deleted,
            created_at_str,
            deleted_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete(&self, id: &str) -> Result<()> { self.delete_from("users", "id", id).await }
}

// ─── Emojis ──────────────────────────────────────────────────────────────────

impl EntityStore<Emoji> for SqliteStore {
  type Error = Error;

  async fn load_all(&self) -> Result<Vec<Emoji>> {
    let raws: Vec<RawEmoji> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT name, created_at FROM emojis ORDER BY rowid")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawEmoji {
              name:       row.get(0)?,
              created_at: row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEmoji::into_emoji).collect()
  }

  async fn persist(&self, emoji: &Emoji) -> Result<()> {
    let name   = emoji.name.clone();
    let at_str = encode_created(emoji.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO emojis (name, created_at) VALUES (?1, ?2)
           ON CONFLICT (name) DO NOTHING",
          rusqlite::params![name, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete(&self, name: &str) -> Result<()> {
    self.delete_from("emojis", "name", name).await
  }
}

// ─── Employees ───────────────────────────────────────────────────────────────

impl EntityStore<Employee> for SqliteStore {
  type Error = Error;

  async fn load_all(&self) -> Result<Vec<Employee>> {
    let raws: Vec<RawEmployee> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY rowid"))?;
        let rows = stmt
          .query_map([], RawEmployee::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEmployee::into_employee).collect()
  }

  async fn persist(&self, employee: &Employee) -> Result<()> {
    let employee       = employee.clone();
    let reports_count  = i64::from(employee.reports_count);
    let created_at_str = encode_created(employee.created_at);
    let deleted_at_str = employee.deleted_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO employees (
             id, name, supervisor_id, reports_count, deleted, created_at, deleted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (id) DO UPDATE SET
             name          = excluded.name,
             supervisor_id = excluded.supervisor_id,
             reports_count = excluded.reports_count,
             deleted       = excluded.deleted,
             deleted_at    = excluded.deleted_at",
          rusqlite::params![
            employee.id,
            employee.name,
            employee.supervisor_id,
            reports_count,
            employee.deleted,
            created_at_str,
            deleted_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete(&self, id: &str) -> Result<()> {
    self.delete_from("employees", "id", id).await
  }
}
