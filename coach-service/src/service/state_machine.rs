//! Per-user session state machine.
//!
//! Each inbound event is classified (menu text, postback kind or raw
//! message), routed by the session's [`UserState`] and [`ActionStep`], and
//! answered with reply messages. Errors never escape un-replied: they are
//! logged, the session is reset and the learner gets a localized error.

use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};

use super::CoachService;
use crate::db::{ActionStep, Handedness, Skill, UserData, UserSession, UserState};
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::line::{
    EventKind, InboundEvent, MAX_MESSAGES_PER_REQUEST, OutboundMessage, QuickReplyItem,
    portfolio_carousels,
};
use crate::postback::Postback;

/// What a rich-menu label asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuEntry {
    /// Enter a flow at skill selection, prompting with the message key
    Enter(UserState, &'static str),
    Instructions,
}

fn menu_entry(text: &str) -> Option<MenuEntry> {
    let entry = match text.trim() {
        "學習歷程" => MenuEntry::Enter(UserState::ViewingPortfolio, "prompt-skill-portfolio"),
        "專家影片" => MenuEntry::Enter(UserState::ViewingExpertVideos, "prompt-skill-expert-videos"),
        "動作分析" => MenuEntry::Enter(UserState::AnalyzingVideo, "prompt-skill-analysis"),
        "預習及反思" => MenuEntry::Enter(UserState::WritingNotes, "prompt-skill-notes"),
        "GPT對談" => MenuEntry::Enter(UserState::ChattingWithGpt, "prompt-skill-chat"),
        "使用說明" => MenuEntry::Instructions,
        _ => return None,
    };
    Some(entry)
}

/// Event content once menu labels and menu switches are handled
enum Input<'a> {
    Text(&'a str),
    Postback(Postback),
    Video(&'a str),
    OtherMessage,
}

fn event_label(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Text { .. } => "text",
        EventKind::Video { .. } => "video",
        EventKind::OtherMessage => "other_message",
        EventKind::Postback { .. } => "postback",
        EventKind::Follow => "follow",
        EventKind::Unsupported { .. } => "unsupported",
    }
}

fn invalid_step(session: &UserSession) -> ServiceError {
    ServiceError::InvalidStep {
        state: session.user_state.to_string(),
        step: session.action_step.to_string(),
    }
}

impl CoachService {
    /// Handle one webhook event and deliver the replies
    pub async fn handle_event(&self, event: &InboundEvent) {
        let messages = self.respond(event).await;
        self.deliver(event, messages).await;
    }

    /// Compute the replies for one event, mapping failures to an error reply
    pub async fn respond(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        match self.process_event(event).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(
                    user_id = %event.user_id,
                    event = event_label(&event.kind),
                    error = %format_error_chain(&e),
                    "Event handling failed"
                );
                if let Err(reset_err) = self.db.put_session(&event.user_id, &UserSession::default()) {
                    warn!(
                        user_id = %event.user_id,
                        error = %format_error_chain(&reset_err),
                        "Failed to reset session after error"
                    );
                }
                vec![OutboundMessage::text(
                    e.user_message(&self.i18n, &self.config.locale),
                )]
            }
        }
    }

    /// Send replies, falling back to push when the reply token is missing or
    /// rejected. Messages beyond one request's capacity are pushed.
    async fn deliver(&self, event: &InboundEvent, messages: Vec<OutboundMessage>) {
        let mut batches = messages.chunks(MAX_MESSAGES_PER_REQUEST);
        let Some(first) = batches.next() else {
            return;
        };

        let replied = match &event.reply_token {
            Some(token) => match self.platform.reply(token, first).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        user_id = %event.user_id,
                        error = %format_error_chain(&e),
                        "Reply failed, falling back to push"
                    );
                    false
                }
            },
            None => false,
        };

        let pending = if replied { None } else { Some(first) };
        for batch in pending.into_iter().chain(batches) {
            if let Err(e) = self.platform.push(&event.user_id, batch).await {
                error!(
                    user_id = %event.user_id,
                    error = %format_error_chain(&e),
                    "Push failed, replies dropped"
                );
                return;
            }
        }
    }

    async fn process_event(&self, event: &InboundEvent) -> ServiceResult<Vec<OutboundMessage>> {
        let user_id = event.user_id.as_str();
        metrics::counter!("coach_events_total", "kind" => event_label(&event.kind)).increment(1);
        debug!(user_id = %user_id, event = event_label(&event.kind), "Processing event");

        let input = match &event.kind {
            EventKind::Follow => {
                let user = self.ensure_user(user_id).await?;
                self.ensure_session(user_id)?;
                info!(user_id = %user_id, "User followed");
                return Ok(vec![OutboundMessage::text(
                    self.tf("reply-welcome", &[("name", &user.name)]),
                )]);
            }
            EventKind::Unsupported { event_type } => {
                debug!(user_id = %user_id, event_type = %event_type, "Unsupported event type");
                if event.reply_token.is_none() {
                    return Ok(Vec::new());
                }
                return Ok(vec![OutboundMessage::text(self.t("reply-default-error"))]);
            }
            EventKind::Text { text } => Input::Text(text),
            EventKind::Postback { data } => match Postback::parse(data)? {
                Some(postback) => Input::Postback(postback),
                None => {
                    debug!(user_id = %user_id, data = %data, "Ignoring postback");
                    return Ok(Vec::new());
                }
            },
            EventKind::Video { message_id } => Input::Video(message_id),
            EventKind::OtherMessage => Input::OtherMessage,
        };

        let mut user = self.ensure_user(user_id).await?;
        let mut session = self.ensure_session(user_id)?;

        if let Input::Text(text) = &input
            && let Some(entry) = menu_entry(text)
        {
            return self.enter_menu(user_id, &mut session, entry);
        }

        self.route(&mut user, &mut session, input).await
    }

    fn enter_menu(
        &self,
        user_id: &str,
        session: &mut UserSession,
        entry: MenuEntry,
    ) -> ServiceResult<Vec<OutboundMessage>> {
        match entry {
            MenuEntry::Instructions => {
                session.reset();
                self.db.put_session(user_id, session)?;
                Ok(vec![OutboundMessage::text(self.t("reply-instruction"))])
            }
            MenuEntry::Enter(state, prompt_key) => {
                session.enter(state);
                self.db.put_session(user_id, session)?;
                debug!(user_id = %user_id, state = %state, "Entered flow");
                Ok(vec![OutboundMessage::text_with_quick_reply(
                    self.t(prompt_key),
                    skill_quick_replies(state),
                )])
            }
        }
    }

    async fn route(
        &self,
        user: &mut UserData,
        session: &mut UserSession,
        input: Input<'_>,
    ) -> ServiceResult<Vec<OutboundMessage>> {
        let user_id = user.id.clone();

        // Payload kinds that act regardless of the session position
        if let Input::Postback(postback) = &input {
            match postback {
                Postback::StopChat => {
                    session.reset();
                    self.db.put_session(&user_id, session)?;
                    return Ok(vec![OutboundMessage::text(self.t("reply-chat-stopped"))]);
                }
                Postback::WriteNote {
                    work_date,
                    action_step,
                    skill,
                    ..
                } => return self.begin_note(&user_id, session, work_date, *action_step, *skill),
                Postback::PlayVideo {
                    video_id,
                    thumbnail_id,
                } => {
                    return Ok(vec![OutboundMessage::Video {
                        original_content_url: self.blobs.url(video_id),
                        preview_image_url: self.blobs.url(thumbnail_id),
                    }]);
                }
                Postback::AskAi {
                    handedness,
                    work_date,
                    skill,
                } => return self.ask_ai(user, *handedness, work_date, *skill).await,
                Postback::SelectSkill { .. } | Postback::SelectHandedness { .. } => {}
            }
        }

        match (session.user_state, session.action_step, input) {
            (
                UserState::WritingNotes,
                ActionStep::SelectingSkill,
                Input::Postback(Postback::SelectSkill { skill, .. }),
            ) => {
                let messages = self.portfolio_reply(user, skill, true)?;
                session.skill = Some(skill);
                session.action_step = ActionStep::SelectingPortfolio;
                self.db.put_session(&user_id, session)?;
                Ok(messages)
            }
            (UserState::WritingNotes, step, Input::Text(text)) if step.is_note_writing() => {
                self.update_note(user, session, step, text)
            }
            (
                UserState::ChattingWithGpt,
                ActionStep::SelectingSkill,
                Input::Postback(Postback::SelectSkill { skill, .. }),
            ) => {
                session.skill = Some(skill);
                session.action_step = ActionStep::Chatting;
                self.db.put_session(&user_id, session)?;
                Ok(vec![OutboundMessage::text_with_quick_reply(
                    self.t("reply-chat-started"),
                    self.stop_quick_reply(),
                )])
            }
            (UserState::ChattingWithGpt, ActionStep::Chatting, Input::Text(text)) => {
                let skill = session.skill.ok_or_else(|| invalid_step(session))?;
                let reply = self.chat_turn(user, skill, text).await?;
                Ok(vec![OutboundMessage::text_with_quick_reply(
                    reply,
                    self.stop_quick_reply(),
                )])
            }
            (
                UserState::ViewingExpertVideos | UserState::AnalyzingVideo,
                ActionStep::SelectingSkill,
                Input::Postback(Postback::SelectSkill { skill, .. }),
            ) => {
                session.skill = Some(skill);
                session.action_step = ActionStep::SelectingHandedness;
                self.db.put_session(&user_id, session)?;
                Ok(vec![self.handedness_prompt()])
            }
            (
                UserState::ViewingExpertVideos,
                ActionStep::SelectingHandedness,
                Input::Postback(Postback::SelectHandedness { handedness }),
            ) => {
                let skill = session.skill.ok_or_else(|| invalid_step(session))?;
                let messages = self.expert_videos_reply(handedness, skill);
                session.reset();
                self.db.put_session(&user_id, session)?;
                Ok(messages)
            }
            (
                UserState::ViewingPortfolio,
                ActionStep::SelectingSkill,
                Input::Postback(Postback::SelectSkill { skill, .. }),
            ) => {
                let messages = self.portfolio_reply(user, skill, false)?;
                session.reset();
                self.db.put_session(&user_id, session)?;
                Ok(messages)
            }
            (
                UserState::AnalyzingVideo,
                ActionStep::SelectingHandedness,
                Input::Postback(Postback::SelectHandedness { handedness }),
            ) => {
                session.handedness = Some(handedness);
                session.action_step = ActionStep::UploadingVideo;
                self.db.put_session(&user_id, session)?;
                user.handedness = handedness;
                self.db.put_user(user)?;
                Ok(vec![OutboundMessage::text(self.t("prompt-upload-video"))])
            }
            (UserState::AnalyzingVideo, ActionStep::UploadingVideo, Input::Video(message_id)) => {
                self.handle_upload(user, session, message_id).await
            }
            (
                UserState::None,
                _,
                Input::Text(_) | Input::Video(_) | Input::OtherMessage,
            ) => Ok(vec![OutboundMessage::text(self.t("reply-unsupported-message"))]),
            (UserState::WritingNotes, step, Input::OtherMessage) if step.is_note_writing() => {
                Err(invalid_step(session))
            }
            (_, step, Input::OtherMessage) if step != ActionStep::UploadingVideo => {
                Ok(vec![OutboundMessage::text(self.t("reply-unsupported-message"))])
            }
            _ => Err(invalid_step(session)),
        }
    }

    fn begin_note(
        &self,
        user_id: &str,
        session: &mut UserSession,
        work_date: &str,
        action_step: ActionStep,
        skill: Skill,
    ) -> ServiceResult<Vec<OutboundMessage>> {
        let prompt_key = match action_step {
            ActionStep::WritingPreviewNote => "prompt-preview-note",
            ActionStep::WritingReflection => "prompt-reflection",
            other => {
                return Err(ServiceError::InvalidStep {
                    state: UserState::WritingNotes.to_string(),
                    step: other.to_string(),
                });
            }
        };

        session.user_state = UserState::WritingNotes;
        session.action_step = action_step;
        session.skill = Some(skill);
        session.updating_date = Some(work_date.to_string());
        self.db.put_session(user_id, session)?;

        let date = work_date.get(..10).unwrap_or(work_date);
        Ok(vec![OutboundMessage::text(self.tf(
            prompt_key,
            &[("date", date), ("skill", skill.label_zh())],
        ))])
    }

    fn update_note(
        &self,
        user: &mut UserData,
        session: &mut UserSession,
        step: ActionStep,
        text: &str,
    ) -> ServiceResult<Vec<OutboundMessage>> {
        let (Some(skill), Some(date)) = (session.skill, session.updating_date.clone()) else {
            return Err(invalid_step(session));
        };

        let work = user
            .portfolio
            .get_mut(skill)
            .get_mut(&date)
            .ok_or_else(|| ServiceError::WorkNotFound {
                skill,
                date: date.clone(),
            })?;
        if step == ActionStep::WritingPreviewNote {
            work.preview_note = text.to_string();
        } else {
            work.reflection = text.to_string();
        }
        self.db.put_user(user)?;

        session.reset();
        self.db.put_session(&user.id, session)?;

        info!(user_id = %user.id, skill = %skill, work_date = %date, step = %step, "Note updated");
        self.portfolio_reply(user, skill, false)
    }

    async fn ask_ai(
        &self,
        user: &mut UserData,
        handedness: Handedness,
        work_date: &str,
        skill: Skill,
    ) -> ServiceResult<Vec<OutboundMessage>> {
        let not_found = || ServiceError::WorkNotFound {
            skill,
            date: work_date.to_string(),
        };
        let details = user
            .portfolio
            .get(skill)
            .get(work_date)
            .map(|work| work.grading_outcome.grading_details.clone())
            .ok_or_else(not_found)?;

        let conversation_id = self.ensure_conversation(user, skill).await?;
        let note = self
            .explain_grade(&conversation_id, handedness, skill, &details)
            .await;

        let work = user
            .portfolio
            .get_mut(skill)
            .get_mut(work_date)
            .ok_or_else(not_found)?;
        work.ai_note = note;
        self.db.put_user(user)?;

        self.portfolio_reply(user, skill, false)
    }

    async fn handle_upload(
        &self,
        user: &mut UserData,
        session: &mut UserSession,
        message_id: &str,
    ) -> ServiceResult<Vec<OutboundMessage>> {
        let skill = session.skill.ok_or_else(|| invalid_step(session))?;
        let video = self.platform.message_content(message_id).await?;
        self.process_upload(user, session, video).await?;

        session.reset();
        self.db.put_session(&user.id, session)?;

        let mut messages = vec![OutboundMessage::text(self.t("reply-upload-success"))];
        messages.extend(self.portfolio_reply(user, skill, false)?);
        Ok(messages)
    }

    /// Header plus carousels for one skill's portfolio
    fn portfolio_reply(
        &self,
        user: &UserData,
        skill: Skill,
        editing: bool,
    ) -> ServiceResult<Vec<OutboundMessage>> {
        let works = user.portfolio.get(skill);
        if works.is_empty() {
            return Err(ServiceError::NoPortfolio { skill });
        }

        let header = if editing {
            "portfolio-header-editing"
        } else {
            "portfolio-header-viewing"
        };
        let mut messages = vec![OutboundMessage::text(self.t(header))];
        messages.extend(portfolio_carousels(
            works,
            skill,
            user.handedness,
            editing,
            self.blobs.as_ref(),
            &self.labels,
        ));
        Ok(messages)
    }

    fn expert_videos_reply(&self, handedness: Handedness, skill: Skill) -> Vec<OutboundMessage> {
        let args = [
            ("handedness", handedness.label_zh()),
            ("skill", skill.label_zh()),
        ];
        let urls = self.config.expert_videos_for(handedness, skill);
        if urls.is_empty() {
            return vec![OutboundMessage::text(self.tf("reply-no-expert-videos", &args))];
        }

        let mut body = self.tf("reply-expert-videos-header", &args);
        for (i, url) in urls.iter().enumerate() {
            let index = (i + 1).to_string();
            body.push('\n');
            body.push_str(&self.tf("reply-expert-video-item", &[("index", &index), ("url", url)]));
        }
        vec![OutboundMessage::text(body)]
    }

    fn handedness_prompt(&self) -> OutboundMessage {
        let items = Handedness::iter()
            .map(|handedness| {
                QuickReplyItem::postback(
                    handedness.label_zh(),
                    Postback::SelectHandedness { handedness }.to_data(),
                )
            })
            .collect();
        OutboundMessage::text_with_quick_reply(self.t("prompt-handedness"), items)
    }

    fn stop_quick_reply(&self) -> Vec<QuickReplyItem> {
        vec![QuickReplyItem::postback(
            self.t("quick-reply-stop-chat"),
            Postback::StopChat.to_data(),
        )]
    }
}

fn skill_quick_replies(state: UserState) -> Vec<QuickReplyItem> {
    Skill::iter()
        .map(|skill| {
            QuickReplyItem::postback(skill.label_zh(), Postback::SelectSkill { state, skill }.to_data())
        })
        .collect()
}
