//! SQL schema for the paranoid SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per record of any model. Rows are never physically deleted.
CREATE TABLE IF NOT EXISTS records (
    pk              TEXT PRIMARY KEY,
    model           TEXT NOT NULL,
    fields          TEXT NOT NULL DEFAULT '{}',  -- JSON object of field values
    created_at      TEXT NOT NULL,               -- ISO 8601 UTC
    is_soft_deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at      TEXT,                        -- ISO 8601 UTC or NULL
    CHECK ((is_soft_deleted = 0) = (deleted_at IS NULL))
);

-- Many-to-many join rows, keyed by the join table name of the relation.
CREATE TABLE IF NOT EXISTS links (
    join_table TEXT NOT NULL,
    left_pk    TEXT NOT NULL REFERENCES records(pk),
    right_pk   TEXT NOT NULL REFERENCES records(pk),
    PRIMARY KEY (join_table, left_pk, right_pk)
);

CREATE INDEX IF NOT EXISTS records_model_idx   ON records(model, is_soft_deleted);
CREATE INDEX IF NOT EXISTS records_created_idx ON records(created_at);

PRAGMA user_version = 1;
";
