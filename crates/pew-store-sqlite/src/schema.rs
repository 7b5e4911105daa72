//! SQL schema for the attendance store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS members (
    member_id   TEXT PRIMARY KEY,
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    email       TEXT,
    phone       TEXT,
    photo       TEXT,              -- path relative to the photo store
    subject_id  TEXT NOT NULL,     -- key in the recognition service
    enrollment  TEXT,              -- JSON returned on enrollment
    status      TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'inactive')),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Uniqueness only binds active members, so an inactive row never blocks a
-- new registration.
CREATE UNIQUE INDEX IF NOT EXISTS members_active_subject_idx
    ON members(subject_id) WHERE status = 'active';
CREATE UNIQUE INDEX IF NOT EXISTS members_active_email_idx
    ON members(email) WHERE status = 'active' AND email IS NOT NULL;
CREATE INDEX IF NOT EXISTS members_email_idx ON members(email);

CREATE TABLE IF NOT EXISTS attendance_records (
    record_id         TEXT PRIMARY KEY,
    member_id         TEXT NOT NULL REFERENCES members(member_id),
    attendance_date   TEXT NOT NULL,   -- YYYY-MM-DD, local
    check_in_time     TEXT NOT NULL,   -- HH:MM:SS[.f], local
    event_type        TEXT NOT NULL,
    similarity_score  REAL,
    notes             TEXT,
    created_at        TEXT NOT NULL,
    UNIQUE (member_id, attendance_date, event_type)
);

CREATE INDEX IF NOT EXISTS attendance_date_idx
    ON attendance_records(attendance_date, event_type);

PRAGMA user_version = 1;
";
