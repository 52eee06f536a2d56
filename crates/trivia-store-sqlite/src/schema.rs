//! SQL schema for the trivia SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 2000;

-- Questions are never deleted, only retired.
CREATE TABLE IF NOT EXISTS questions (
    question_id   TEXT PRIMARY KEY,
    text          TEXT NOT NULL,
    kind          TEXT NOT NULL,    -- 'single' | 'multiple_choice'
    options_json  TEXT,             -- JSON array of 4 strings, multiple choice only
    static_answer TEXT,
    dynamic_query TEXT,
    category      TEXT,
    submitter_id  TEXT,
    origin        TEXT NOT NULL,    -- 'authored' | 'generated'
    status        TEXT NOT NULL,    -- 'available' | 'answered' | 'retired'
    usage_count   INTEGER NOT NULL DEFAULT 0,
    last_used_at  TEXT,
    created_at    TEXT NOT NULL,
    CHECK ((static_answer IS NULL) != (dynamic_query IS NULL)),
    CHECK ((kind = 'multiple_choice') = (options_json IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS approval_sessions (
    approval_id          TEXT PRIMARY KEY,
    reviewer_id          TEXT NOT NULL,
    draft_key            TEXT NOT NULL,   -- sha256 of the submitted draft text
    draft_json           TEXT NOT NULL,
    step                 TEXT NOT NULL,   -- 'awaiting_decision' | 'editing' | 'completed'
    outcome              TEXT,            -- 'approved' | 'rejected' | 'expired'
    approved_question_id TEXT REFERENCES questions(question_id),
    review_message       TEXT,
    created_at           TEXT NOT NULL,
    last_activity_at     TEXT NOT NULL,
    expires_at           TEXT NOT NULL,
    restart_count        INTEGER NOT NULL DEFAULT 0,
    revision             INTEGER NOT NULL DEFAULT 0,
    CHECK ((step = 'completed') = (outcome IS NOT NULL))
);

-- At most one open review per (reviewer, draft).
CREATE UNIQUE INDEX IF NOT EXISTS approval_open_idx
    ON approval_sessions(reviewer_id, draft_key)
    WHERE step != 'completed';

CREATE INDEX IF NOT EXISTS approval_expiry_idx
    ON approval_sessions(expires_at)
    WHERE step != 'completed';

-- Drafts whose reviewer had no delivery channel.
CREATE TABLE IF NOT EXISTS pending_drafts (
    pending_id  TEXT PRIMARY KEY,
    reviewer_id TEXT NOT NULL,
    draft_json  TEXT NOT NULL,
    queued_at   TEXT NOT NULL
);

-- Channels registered at runtime; merged over the configured reviewers.
CREATE TABLE IF NOT EXISTS reviewer_channels (
    reviewer_id   TEXT PRIMARY KEY,
    channel       TEXT NOT NULL,
    registered_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS trivia_sessions (
    session_id           TEXT PRIMARY KEY,
    question_id          TEXT NOT NULL REFERENCES questions(question_id),
    channel              TEXT NOT NULL,
    started_by           TEXT NOT NULL,
    started_at           TEXT NOT NULL,
    ended_at             TEXT,
    status               TEXT NOT NULL,   -- 'active' | 'completed' | 'expired'
    question_message     TEXT,
    confirmation_message TEXT,
    calculated_answer    TEXT,            -- JSON-encoded CalculatedAnswer
    first_correct_user   TEXT,
    participant_count    INTEGER NOT NULL DEFAULT 0,
    correct_count        INTEGER NOT NULL DEFAULT 0
);

-- Single-flight: at most one active session, system-wide.
CREATE UNIQUE INDEX IF NOT EXISTS trivia_one_active_idx
    ON trivia_sessions(status)
    WHERE status = 'active';

CREATE INDEX IF NOT EXISTS trivia_question_message_idx
    ON trivia_sessions(question_message);
CREATE INDEX IF NOT EXISTS trivia_confirmation_message_idx
    ON trivia_sessions(confirmation_message);

-- `seq` doubles as the submission-order tie-breaker.
CREATE TABLE IF NOT EXISTS answers (
    seq              INTEGER PRIMARY KEY AUTOINCREMENT,
    answer_id        TEXT NOT NULL UNIQUE,
    session_id       TEXT NOT NULL REFERENCES trivia_sessions(session_id),
    user_id          TEXT NOT NULL,
    raw_text         TEXT NOT NULL,
    normalized_text  TEXT NOT NULL,
    submitted_at     TEXT NOT NULL,   -- stamped by SQLite on insert
    is_correct       INTEGER,
    is_first_correct INTEGER NOT NULL DEFAULT 0,
    has_conflict     INTEGER NOT NULL DEFAULT 0,
    is_close         INTEGER NOT NULL DEFAULT 0,
    UNIQUE (session_id, user_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS answers_one_first_correct_idx
    ON answers(session_id)
    WHERE is_first_correct = 1;

PRAGMA user_version = 2;
";
