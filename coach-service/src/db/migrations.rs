//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Create all tables if they do not exist yet.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- Learner profile and portfolio documents
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- State machine position per user
        CREATE TABLE IF NOT EXISTS sessions (
            user_id TEXT PRIMARY KEY,
            user_state TEXT NOT NULL DEFAULT 'none',
            action_step TEXT NOT NULL DEFAULT 'empty',
            skill TEXT NOT NULL DEFAULT '',
            handedness TEXT NOT NULL DEFAULT '',
            updating_date TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Learner-facing chat log, one JSON array per user
        CREATE TABLE IF NOT EXISTS chat_histories (
            user_id TEXT PRIMARY KEY,
            messages TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Cached chat summaries keyed by {user}_{date}_{skill}
        CREATE TABLE IF NOT EXISTS daily_summaries (
            id TEXT PRIMARY KEY,
            summary TEXT NOT NULL,
            last_count INTEGER NOT NULL,
            date TEXT NOT NULL,
            skill TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- AI tutor transcripts
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            messages TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at);
        "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    Ok(())
}
