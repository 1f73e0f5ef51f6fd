//! SQL schema for the `trail` SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Ids are assigned by the chat platform.
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY,
    name         TEXT NOT NULL DEFAULT '',
    real_name    TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL DEFAULT '',
    avatar       TEXT NOT NULL DEFAULT '',
    status       TEXT NOT NULL DEFAULT '',
    title        TEXT NOT NULL DEFAULT '',
    admin        INTEGER NOT NULL DEFAULT 0,
    bot          INTEGER NOT NULL DEFAULT 0,
    deleted      INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,   -- RFC 3339 UTC
    deleted_at   TEXT,            -- set iff deleted = 1
    CHECK ((deleted = 1) = (deleted_at IS NOT NULL))
);

-- Emojis are deleted outright when they disappear; no tombstone.
CREATE TABLE IF NOT EXISTS emojis (
    name       TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

-- supervisor_id is not a foreign key: the chart is scraped top-down and a
-- supervisor may be missing.
CREATE TABLE IF NOT EXISTS employees (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL DEFAULT '',
    supervisor_id TEXT NOT NULL DEFAULT '',
    reports_count INTEGER NOT NULL DEFAULT 0,
    deleted       INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    deleted_at    TEXT,
    CHECK ((deleted = 1) = (deleted_at IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS employees_supervisor_idx ON employees(supervisor_id);

PRAGMA user_version = 1;
";
