//! Chat history reads and the daily summary cache.

use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::CoachService;
use crate::db::{ChatMessage, DailySummary, daily_summary_id};
use crate::error::{ServiceError, ServiceResult, format_error_chain};

/// Outcome of a summary request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    pub summary: String,
    pub cached: bool,
}

impl CoachService {
    /// A user's chat log, optionally narrowed to one skill
    pub fn get_history(&self, user_id: &str, skill: Option<&str>) -> ServiceResult<Vec<ChatMessage>> {
        let Some(history) = self.db.get_chat_history(user_id)? else {
            return Ok(Vec::new());
        };

        match skill.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
            Some(skill) => Ok(history.messages_for_skill(&skill).cloned().collect()),
            None => Ok(history.messages),
        }
    }

    /// Summarize `content`, reusing today's summary while no new messages
    /// have been recorded for the skill
    pub async fn get_or_create_summary(
        &self,
        user_id: &str,
        skill: &str,
        content: &str,
    ) -> ServiceResult<SummaryResult> {
        let skill = skill.trim().to_lowercase();
        if user_id.trim().is_empty() || skill.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "user_id and skill are required".to_string(),
            });
        }

        let count = self
            .db
            .get_chat_history(user_id)?
            .map(|history| history.messages_for_skill(&skill).count())
            .unwrap_or(0);

        let date = Local::now().format("%Y-%m-%d").to_string();
        let id = daily_summary_id(user_id, &date, &skill);

        match self.db.get_daily_summary(&id) {
            Ok(Some(cached)) if cached.last_count == count && !cached.summary.is_empty() => {
                metrics::counter!("coach_summaries_total", "cache" => "hit").increment(1);
                debug!(user_id = %user_id, skill = %skill, count, "Summary cache hit");
                return Ok(SummaryResult {
                    summary: cached.summary,
                    cached: true,
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(id = %id, error = %format_error_chain(&e), "Summary cache lookup failed");
            }
        }

        metrics::counter!("coach_summaries_total", "cache" => "miss").increment(1);
        let summary = self.ai.summarize(content).await?;

        let entry = DailySummary {
            summary: summary.clone(),
            last_count: count,
            date,
            skill,
            updated_at: Utc::now(),
        };
        if let Err(e) = self.db.put_daily_summary(&id, &entry) {
            warn!(id = %id, error = %format_error_chain(&e), "Failed to store summary cache");
        }

        info!(user_id = %user_id, skill = %entry.skill, count, "Summary generated");
        Ok(SummaryResult {
            summary,
            cached: false,
        })
    }
}
