//! Database schema - SQLite DDL for the scoreboard
//!
//! Six tables, all keyed back to `users.initials`. Every statement is
//! `IF NOT EXISTS`, so the whole list can be replayed against an
//! already-initialized database.

/// Registered students and professors
pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    initials    TEXT PRIMARY KEY NOT NULL,
    password    TEXT NOT NULL,            -- PHC-formatted argon2 hash
    role        TEXT NOT NULL,
    list        TEXT,
    "group"     TEXT,
    gender      TEXT
)"#;

/// Per-user aggregate statistics (1:1 with users)
pub const CREATE_STATISTICS: &str = r#"
CREATE TABLE IF NOT EXISTS statistics (
    initials        TEXT PRIMARY KEY NOT NULL REFERENCES users(initials),
    games_played    INTEGER NOT NULL DEFAULT 0,
    average_score   REAL NOT NULL DEFAULT 0,
    highest_score   REAL NOT NULL DEFAULT 0
)"#;

/// Best score per user (1:1 with users)
pub const CREATE_LEADERBOARD: &str = r#"
CREATE TABLE IF NOT EXISTS leaderboard (
    student_id      TEXT PRIMARY KEY NOT NULL REFERENCES users(initials),
    highest_score   REAL NOT NULL DEFAULT 0
)"#;

/// Append-only attempt log, the source of every report
pub const CREATE_OBJECTS: &str = r#"
CREATE TABLE IF NOT EXISTS objects (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    score           REAL NOT NULL,
    tries           INTEGER NOT NULL,
    user_initials   TEXT REFERENCES users(initials)
)"#;

/// Level reference data
pub const CREATE_LEVELS: &str = r#"
CREATE TABLE IF NOT EXISTS levels (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    max_score   INTEGER NOT NULL
)"#;

/// Per-user, per-level progress (fanned out at registration)
pub const CREATE_USER_LEVELS: &str = r#"
CREATE TABLE IF NOT EXISTS user_levels (
    user_initials   TEXT NOT NULL REFERENCES users(initials),
    level_id        INTEGER NOT NULL REFERENCES levels(id),
    completed       BOOLEAN NOT NULL DEFAULT 0,
    score           INTEGER NOT NULL DEFAULT 0,
    tries           INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_initials, level_id)
)"#;

pub const CREATE_OBJECTS_USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_objects_user ON objects(user_initials)";

/// Levels inserted when the `levels` table is empty
pub const DEFAULT_LEVELS: [(&str, i64); 3] = [
    ("Level 1", 100),
    ("Level 2", 200),
    ("Level 3", 300),
];

/// All DDL statements in dependency order
///
/// `users` first, then everything referencing it, `levels` before
/// `user_levels` since the latter references both.
pub fn schema_statements() -> Vec<(&'static str, &'static str)> {
    vec![
        ("users", CREATE_USERS),
        ("statistics", CREATE_STATISTICS),
        ("leaderboard", CREATE_LEADERBOARD),
        ("objects", CREATE_OBJECTS),
        ("idx_objects_user", CREATE_OBJECTS_USER_INDEX),
        ("levels", CREATE_LEVELS),
        ("user_levels", CREATE_USER_LEVELS),
    ]
}
