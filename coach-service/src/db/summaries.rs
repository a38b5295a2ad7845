//! Daily summary cache operations.

use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::DailySummary;
use crate::error::{DatabaseError, ServiceResult};

/// Cache key for a user's summary of one skill on one day
pub fn daily_summary_id(user_id: &str, date: &str, skill: &str) -> String {
    format!("{}_{}_{}", user_id, date, skill)
}

impl Database {
    pub fn get_daily_summary(&self, id: &str) -> ServiceResult<Option<DailySummary>> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT summary, last_count, date, skill, updated_at FROM daily_summaries WHERE id = ?1",
            params![id],
            DailySummary::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    pub fn put_daily_summary(&self, id: &str, summary: &DailySummary) -> ServiceResult<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO daily_summaries (id, summary, last_count, date, skill, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                summary = excluded.summary,
                last_count = excluded.last_count,
                date = excluded.date,
                skill = excluded.skill,
                updated_at = excluded.updated_at
            "#,
            params![
                id,
                summary.summary,
                summary.last_count as i64,
                summary.date,
                summary.skill,
                summary.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }
}
