//! Database model structs.
//!
//! This module contains the data structures for database records and the
//! closed enums that appear in them. Every enum round-trips through its
//! snake_case label: `as_str()` for variant → label, `str::parse` for
//! label → variant (unknown labels are an error, never a default).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Format of portfolio date-keys and artifact file names
pub const WORK_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Top-level interaction the learner is in
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserState {
    #[default]
    None,
    WritingNotes,
    ChattingWithGpt,
    ViewingExpertVideos,
    ViewingPortfolio,
    AnalyzingVideo,
}

impl UserState {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Progress through the sub-flow of a [`UserState`]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionStep {
    SelectingSkill,
    SelectingHandedness,
    UploadingVideo,
    SelectingPortfolio,
    WritingPreviewNote,
    WritingReflection,
    Chatting,
    #[default]
    Empty,
}

impl ActionStep {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn is_note_writing(&self) -> bool {
        matches!(
            self,
            ActionStep::WritingPreviewNote | ActionStep::WritingReflection
        )
    }
}

/// Technique category coached by the bot
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Skill {
    Serve,
    Smash,
    Clear,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn label_zh(&self) -> &'static str {
        match self {
            Skill::Serve => "發球",
            Skill::Smash => "殺球",
            Skill::Clear => "高遠球",
        }
    }
}

/// Learner's dominant hand
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Handedness {
    Left,
    #[default]
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn label_zh(&self) -> &'static str {
        match self {
            Handedness::Left => "左手",
            Handedness::Right => "右手",
        }
    }
}

/// Per-user state machine position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_state: UserState,
    pub action_step: ActionStep,
    pub skill: Option<Skill>,
    pub handedness: Option<Handedness>,
    pub updating_date: Option<String>,
}

impl UserSession {
    /// Return to the idle position, clearing every in-progress selection
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_reset(&self) -> bool {
        *self == Self::default()
    }

    /// Reset and enter `state` at its first step
    pub fn enter(&mut self, state: UserState) {
        self.reset();
        self.user_state = state;
        self.action_step = ActionStep::SelectingSkill;
    }

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let user_state: String = row.get(0)?;
        let action_step: String = row.get(1)?;
        let skill: String = row.get(2)?;
        let handedness: String = row.get(3)?;
        let updating_date: String = row.get(4)?;

        Ok(Self {
            user_state: parse_column(0, &user_state)?,
            action_step: parse_column(1, &action_step)?,
            skill: parse_optional_column(2, &skill)?,
            handedness: parse_optional_column(3, &handedness)?,
            updating_date: (!updating_date.is_empty()).then_some(updating_date),
        })
    }
}

fn parse_column<T>(index: usize, value: &str) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    value.parse().map_err(|e: strum::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_optional_column<T>(index: usize, value: &str) -> Result<Option<T>, rusqlite::Error>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    if value.is_empty() {
        Ok(None)
    } else {
        parse_column(index, value).map(Some)
    }
}

/// Per-criterion grading line returned by the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingDetail {
    pub description: String,
    pub grade: f64,
}

/// Structured result of grading one submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingOutcome {
    #[serde(default)]
    pub grading_details: Vec<GradingDetail>,
    pub total_grade: f64,
}

/// One graded, dated submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    #[serde(rename = "date")]
    pub date_time: String,
    pub thumbnail: String,
    pub video: String,
    #[serde(default)]
    pub comparison_video: String,
    pub reflection: String,
    pub preview_note: String,
    pub ai_note: String,
    pub grading_outcome: GradingOutcome,
}

impl Work {
    /// Parse the date-key back to a timestamp
    pub fn parse_date_key(key: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(key, WORK_DATE_FORMAT).ok()
    }
}

/// Per-skill portfolios keyed by date-key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolios {
    #[serde(default)]
    pub serve: BTreeMap<String, Work>,
    #[serde(default)]
    pub smash: BTreeMap<String, Work>,
    #[serde(default)]
    pub clear: BTreeMap<String, Work>,
}

impl Portfolios {
    pub fn get(&self, skill: Skill) -> &BTreeMap<String, Work> {
        match skill {
            Skill::Serve => &self.serve,
            Skill::Smash => &self.smash,
            Skill::Clear => &self.clear,
        }
    }

    pub fn get_mut(&mut self, skill: Skill) -> &mut BTreeMap<String, Work> {
        match skill {
            Skill::Serve => &mut self.serve,
            Skill::Smash => &mut self.smash,
            Skill::Clear => &mut self.clear,
        }
    }
}

/// Blob-store prefixes created for the user at onboarding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FolderPaths {
    pub root: String,
    pub serve: String,
    pub smash: String,
    pub clear: String,
    pub thumbnail: String,
}


/// AI conversation id per skill
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationIds {
    #[serde(default)]
    pub serve: String,
    #[serde(default)]
    pub smash: String,
    #[serde(default)]
    pub clear: String,
}

impl ConversationIds {
    pub fn get(&self, skill: Skill) -> Option<&str> {
        let id = match skill {
            Skill::Serve => &self.serve,
            Skill::Smash => &self.smash,
            Skill::Clear => &self.clear,
        };
        (!id.is_empty()).then_some(id.as_str())
    }

    pub fn set(&mut self, skill: Skill, id: String) {
        match skill {
            Skill::Serve => self.serve = id,
            Skill::Smash => self.smash = id,
            Skill::Clear => self.clear = id,
        }
    }
}

/// Learner profile and portfolio document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub handedness: Handedness,
    #[serde(default)]
    pub folder_paths: FolderPaths,
    #[serde(default)]
    pub portfolio: Portfolios,
    #[serde(default)]
    pub gpt_conversation_ids: ConversationIds,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One turn of the learner-facing chat log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    pub skill: String,
    #[serde(default)]
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered chat log for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatHistory {
    /// Messages tagged with `skill` (case-insensitive)
    pub fn messages_for_skill<'a>(&'a self, skill: &'a str) -> impl Iterator<Item = &'a ChatMessage> {
        self.messages
            .iter()
            .filter(move |m| m.skill.to_lowercase() == skill)
    }
}

/// Cached chat summary for (user, date, skill)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub summary: String,
    pub last_count: usize,
    pub date: String,
    pub skill: String,
    pub updated_at: DateTime<Utc>,
}

impl DailySummary {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let last_count: i64 = row.get(1)?;
        let updated_at_str: String = row.get(4)?;

        Ok(Self {
            summary: row.get(0)?,
            last_count: last_count.max(0) as usize,
            date: row.get(2)?,
            skill: row.get(3)?,
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

/// AI conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<ConversationMessage>,
}

impl Conversation {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(1)?;
        let updated_at_str: String = row.get(2)?;
        let messages_str: String = row.get(3)?;

        Ok(Self {
            id: row.get(0)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            messages: serde_json::from_str(&messages_str).unwrap_or_default(),
        })
    }
}

/// Message in an AI conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_enum_labels_round_trip() {
        for state in UserState::iter() {
            assert_eq!(state.as_str().parse::<UserState>(), Ok(state));
        }
        for step in ActionStep::iter() {
            assert_eq!(step.as_str().parse::<ActionStep>(), Ok(step));
        }
        for skill in Skill::iter() {
            assert_eq!(skill.as_str().parse::<Skill>(), Ok(skill));
        }
        for hand in Handedness::iter() {
            assert_eq!(hand.as_str().parse::<Handedness>(), Ok(hand));
        }
    }

    #[test]
    fn test_known_labels() {
        assert_eq!(UserState::ChattingWithGpt.as_str(), "chatting_with_gpt");
        assert_eq!(ActionStep::WritingPreviewNote.as_str(), "writing_preview_note");
        assert_eq!(Skill::Clear.label_zh(), "高遠球");
        assert_eq!(Handedness::Left.label_zh(), "左手");
    }

    #[test]
    fn test_unknown_label_is_error() {
        assert!("lob".parse::<Skill>().is_err());
        assert!("".parse::<ActionStep>().is_err());
        assert!("ambidextrous".parse::<Handedness>().is_err());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut session = UserSession {
            user_state: UserState::AnalyzingVideo,
            action_step: ActionStep::UploadingVideo,
            skill: Some(Skill::Smash),
            handedness: Some(Handedness::Left),
            updating_date: Some("2025-03-01-10-30".to_string()),
        };

        session.reset();
        assert!(session.is_reset());
        assert_eq!(session.user_state, UserState::None);
        assert_eq!(session.action_step, ActionStep::Empty);
        assert_eq!(session.skill, None);
        assert_eq!(session.handedness, None);

        session.reset();
        assert!(session.is_reset());
    }

    #[test]
    fn test_enter_starts_at_skill_selection() {
        let mut session = UserSession {
            skill: Some(Skill::Serve),
            ..Default::default()
        };
        session.enter(UserState::ViewingPortfolio);
        assert_eq!(session.user_state, UserState::ViewingPortfolio);
        assert_eq!(session.action_step, ActionStep::SelectingSkill);
        assert_eq!(session.skill, None);
    }

    #[test]
    fn test_work_json_field_names() {
        let work = Work {
            date_time: "2025-03-01-10-30".to_string(),
            thumbnail: "u/thumbnail/2025-03-01-10-30.jpeg".to_string(),
            video: "u/serve/2025-03-01-10-30.mp4".to_string(),
            comparison_video: String::new(),
            reflection: "r".to_string(),
            preview_note: "p".to_string(),
            ai_note: "a".to_string(),
            grading_outcome: GradingOutcome::default(),
        };

        let json = serde_json::to_value(&work).unwrap();
        assert_eq!(json["date"], "2025-03-01-10-30");
        assert!(json.get("previewNote").is_some());
        assert!(json.get("aiNote").is_some());
        assert!(json["gradingOutcome"].get("total_grade").is_some());
    }

    #[test]
    fn test_parse_date_key() {
        assert!(Work::parse_date_key("2025-03-01-10-30").is_some());
        assert!(Work::parse_date_key("2025-03-01").is_none());
    }

    #[test]
    fn test_conversation_ids_empty_is_missing() {
        let mut ids = ConversationIds::default();
        assert_eq!(ids.get(Skill::Smash), None);
        ids.set(Skill::Smash, "conv-1".to_string());
        assert_eq!(ids.get(Skill::Smash), Some("conv-1"));
    }
}
