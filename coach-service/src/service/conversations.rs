//! Per-skill AI conversations.

use tracing::{error, info, warn};

use super::CoachService;
use crate::db::{Exchange, GradingDetail, Handedness, Skill, UserData};
use crate::error::{ServiceResult, format_error_chain};

impl CoachService {
    /// Conversation id for the user's skill, creating one if missing
    pub async fn ensure_conversation(
        &self,
        user: &mut UserData,
        skill: Skill,
    ) -> ServiceResult<String> {
        if let Some(id) = user.gpt_conversation_ids.get(skill) {
            return Ok(id.to_string());
        }

        let id = self.ai.create_conversation().await?;
        user.gpt_conversation_ids.set(skill, id.clone());
        self.db.put_user(user)?;

        info!(user_id = %user.id, skill = %skill, conversation_id = %id, "Created missing conversation");
        Ok(id)
    }

    /// Send one chat message to a conversation
    pub async fn chat(&self, conversation_id: &str, message: &str) -> ServiceResult<String> {
        self.ai.send_message(conversation_id, message).await
    }

    /// Ask the coach to explain a grade.
    ///
    /// Never fails: an AI failure yields the localized retry notice, which the
    /// caller stores as the note.
    pub async fn explain_grade(
        &self,
        conversation_id: &str,
        handedness: Handedness,
        skill: Skill,
        grading_details: &[GradingDetail],
    ) -> String {
        let details = match serde_json::to_string(grading_details) {
            Ok(details) => details,
            Err(e) => {
                error!(error = %e, "Failed to encode grading details");
                return self.t("reply-ai-failed");
            }
        };
        let prompt = self.tf(
            "prompt-explain-grade",
            &[
                ("handedness", handedness.label_zh()),
                ("skill", skill.label_zh()),
                ("details", &details),
            ],
        );

        match self.chat(conversation_id, &prompt).await {
            Ok(note) => note,
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %format_error_chain(&e),
                    "Grade explanation failed"
                );
                self.t("reply-ai-failed")
            }
        }
    }

    /// One learner chat turn: send, then record the exchange
    pub(crate) async fn chat_turn(
        &self,
        user: &mut UserData,
        skill: Skill,
        text: &str,
    ) -> ServiceResult<String> {
        let conversation_id = self.ensure_conversation(user, skill).await?;
        let reply = self.chat(&conversation_id, text).await?;

        let exchange = Exchange {
            skill: skill.as_str(),
            conversation_id: &conversation_id,
            user_text: text,
            assistant_text: &reply,
        };
        if let Err(e) = self.db.append_exchange(&user.id, &exchange) {
            error!(user_id = %user.id, error = %format_error_chain(&e), "Failed to record chat exchange");
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::service::testing::{FakeAi, Harness, HarnessOptions, USER_ID};

    #[tokio::test]
    async fn test_ensure_conversation_recreates_missing_id() {
        let h = Harness::new();
        let mut user = h.service.ensure_user(USER_ID).await.unwrap();
        user.gpt_conversation_ids.set(Skill::Clear, String::new());
        h.db.put_user(&user).unwrap();

        let id = h.service.ensure_conversation(&mut user, Skill::Clear).await.unwrap();

        assert_eq!(id, "conv-3");
        assert_eq!(h.ai.created.load(Ordering::SeqCst), 4);
        let stored = h.db.get_user(USER_ID).unwrap().unwrap();
        assert_eq!(stored.gpt_conversation_ids.get(Skill::Clear), Some("conv-3"));
    }

    #[tokio::test]
    async fn test_explain_grade_prompt() {
        let h = Harness::new();
        let details = vec![GradingDetail {
            description: "elbow height".to_string(),
            grade: 12.5,
        }];

        let note = h
            .service
            .explain_grade("conv-0", Handedness::Left, Skill::Smash, &details)
            .await;

        let sent = h.ai.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        let prompt = &sent[0].1;
        assert!(prompt.contains("慣用手：左手"));
        assert!(prompt.contains("動作技能：殺球"));
        assert!(prompt.contains(r#"[{"description":"elbow height","grade":12.5}]"#));
        assert_eq!(note, format!("coach says: {prompt}"));
    }

    #[tokio::test]
    async fn test_explain_grade_failure_yields_retry_notice() {
        let h = Harness::with(HarnessOptions {
            ai: FakeAi {
                fail: true,
                ..FakeAi::default()
            },
            ..HarnessOptions::default()
        });

        let note = h
            .service
            .explain_grade("conv-0", Handedness::Right, Skill::Serve, &[])
            .await;
        assert_eq!(note, "無法取得建議，請再試一次");
    }

    #[tokio::test]
    async fn test_chat_turn_records_exchange() {
        let h = Harness::new();
        let mut user = h.service.ensure_user(USER_ID).await.unwrap();

        let reply = h.service.chat_turn(&mut user, Skill::Serve, "How do I serve?").await.unwrap();

        assert_eq!(reply, "coach says: How do I serve?");
        let history = h.db.get_chat_history(USER_ID).unwrap().unwrap();
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].text, "How do I serve?");
        assert_eq!(history.messages[1].text, reply);
        assert_eq!(history.messages[0].skill, "serve");
    }
}
