//! SQL schema for the Infinity SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'active',  -- 'active' | 'inactive'
    password_hash TEXT NOT NULL,                   -- argon2 PHC string
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS api_keys (
    id           TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL REFERENCES users(id),
    key_hash     TEXT NOT NULL UNIQUE,             -- sha256 hex of plain key
    name         TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'active',   -- 'active' | 'revoked'
    last_used_at TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- JWT denylist; rows become dead weight once the token expires.
CREATE TABLE IF NOT EXISTS revoked_tokens (
    token_hash TEXT PRIMARY KEY,                   -- sha256 hex of the JWT
    user_id    TEXT NOT NULL,
    revoked_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS model_definitions (
    id                 TEXT PRIMARY KEY,
    owner_id           TEXT NOT NULL REFERENCES users(id),
    name               TEXT NOT NULL,
    description        TEXT,
    fields_json        TEXT NOT NULL,              -- map of field name -> definition
    relationships_json TEXT,
    indexes_json       TEXT,
    embedding_json     TEXT,
    status             TEXT NOT NULL DEFAULT 'active',  -- 'active' | 'archived'
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    UNIQUE (owner_id, name)
);

CREATE TABLE IF NOT EXISTS model_views (
    id          TEXT PRIMARY KEY,
    model_id    TEXT NOT NULL REFERENCES model_definitions(id) ON DELETE CASCADE,
    owner_id    TEXT NOT NULL,
    name        TEXT NOT NULL,
    description TEXT,
    config_json TEXT NOT NULL,
    is_default  INTEGER NOT NULL DEFAULT 0,
    is_public   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Records carry their own lifecycle: deliberately no foreign key to
-- model_definitions, so record writes and model deletes stay independent.
CREATE TABLE IF NOT EXISTS data_records (
    record_id   TEXT PRIMARY KEY,
    model_id    TEXT NOT NULL,
    fields_json TEXT NOT NULL,                     -- map of field name -> value
    vector_json TEXT,                              -- JSON array of floats
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS api_keys_user_idx      ON api_keys(user_id);
CREATE INDEX IF NOT EXISTS model_defs_owner_idx   ON model_definitions(owner_id);
CREATE INDEX IF NOT EXISTS model_views_model_idx  ON model_views(model_id);
CREATE INDEX IF NOT EXISTS data_records_model_idx ON data_records(model_id);

PRAGMA user_version = 1;
";
