//! Session document operations.
//!
//! Sessions are read and written as separate statements. Two webhook
//! deliveries for the same user may interleave their read-modify-write
//! cycles and the later write wins; callers do not hold a per-user lock.

use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::UserSession;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Get the session for a user
    pub fn get_session(&self, user_id: &str) -> ServiceResult<Option<UserSession>> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT user_state, action_step, skill, handedness, updating_date FROM sessions WHERE user_id = ?1",
            params![user_id],
            UserSession::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Replace the session for a user
    pub fn put_session(&self, user_id: &str, session: &UserSession) -> ServiceResult<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO sessions (user_id, user_state, action_step, skill, handedness, updating_date, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
            ON CONFLICT(user_id) DO UPDATE SET
                user_state = excluded.user_state,
                action_step = excluded.action_step,
                skill = excluded.skill,
                handedness = excluded.handedness,
                updating_date = excluded.updating_date,
                updated_at = excluded.updated_at
            "#,
            params![
                user_id,
                session.user_state.as_str(),
                session.action_step.as_str(),
                session.skill.map(|s| s.as_str()).unwrap_or_default(),
                session.handedness.map(|h| h.as_str()).unwrap_or_default(),
                session.updating_date.as_deref().unwrap_or_default(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }
}
