//! Button postback payloads.
//!
//! Each payload kind has an exact field set. A payload with a missing or
//! unexpected field, or an empty required string, is rejected instead of
//! being filled with defaults.

use serde::{Deserialize, Serialize};

use crate::db::{ActionStep, Handedness, Skill, UserState, Work};
use crate::error::PostbackError;

/// Menu-switch postbacks sent by the rich menu; they carry no work
pub const MENU_SWITCH_DATA: [&str; 2] = ["switch-to-main", "switch-to-secondary"];

/// Decoded postback payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postback {
    /// Leave AI chat
    StopChat,
    /// Jump into editing a note of one work
    WriteNote {
        state: UserState,
        work_date: String,
        action_step: ActionStep,
        skill: Skill,
    },
    /// Play a stored video
    PlayVideo {
        video_id: String,
        thumbnail_id: String,
    },
    /// Ask the AI to explain a work's grade
    AskAi {
        handedness: Handedness,
        work_date: String,
        skill: Skill,
    },
    /// Skill picked from a quick reply
    SelectSkill { state: UserState, skill: Skill },
    /// Handedness picked from a quick reply
    SelectHandedness { handedness: Handedness },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StopPayload {
    stop: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WriteNotePayload {
    state: String,
    work_date: String,
    action_step: String,
    skill: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct VideoPayload {
    video_id: String,
    thumbnail_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AskAiPayload {
    handedness: String,
    work_date: String,
    skill: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SelectSkillPayload {
    state: String,
    skill: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SelectHandednessPayload {
    handedness: String,
}

fn non_empty(field: &'static str, value: String) -> Result<String, PostbackError> {
    if value.is_empty() {
        Err(PostbackError::EmptyField { field })
    } else {
        Ok(value)
    }
}

fn label<T: std::str::FromStr>(field: &'static str, value: String) -> Result<T, PostbackError> {
    let value = non_empty(field, value)?;
    value
        .parse()
        .map_err(|_| PostbackError::InvalidValue { field, value })
}

fn work_date(value: String) -> Result<String, PostbackError> {
    let value = non_empty("work_date", value)?;
    match Work::parse_date_key(&value) {
        Some(_) => Ok(value),
        None => Err(PostbackError::InvalidValue {
            field: "work_date",
            value,
        }),
    }
}

impl Postback {
    /// Classify raw postback data.
    ///
    /// Kinds are tried in order: stop, note editing, video, ask-AI, then the
    /// quick-reply selections. `Ok(None)` means the data is not a payload the
    /// bot acts on (menu switches and `{"stop": false}`).
    pub fn parse(data: &str) -> Result<Option<Self>, PostbackError> {
        if MENU_SWITCH_DATA.contains(&data) {
            return Ok(None);
        }

        if let Ok(p) = serde_json::from_str::<StopPayload>(data) {
            return Ok(p.stop.then_some(Postback::StopChat));
        }

        if let Ok(p) = serde_json::from_str::<WriteNotePayload>(data) {
            return Ok(Some(Postback::WriteNote {
                state: label("state", p.state)?,
                work_date: work_date(p.work_date)?,
                action_step: label("action_step", p.action_step)?,
                skill: label("skill", p.skill)?,
            }));
        }

        if let Ok(p) = serde_json::from_str::<VideoPayload>(data) {
            return Ok(Some(Postback::PlayVideo {
                video_id: non_empty("video_id", p.video_id)?,
                thumbnail_id: non_empty("thumbnail_id", p.thumbnail_id)?,
            }));
        }

        if let Ok(p) = serde_json::from_str::<AskAiPayload>(data) {
            return Ok(Some(Postback::AskAi {
                handedness: label("handedness", p.handedness)?,
                work_date: work_date(p.work_date)?,
                skill: label("skill", p.skill)?,
            }));
        }

        if let Ok(p) = serde_json::from_str::<SelectSkillPayload>(data) {
            return Ok(Some(Postback::SelectSkill {
                state: label("state", p.state)?,
                skill: label("skill", p.skill)?,
            }));
        }

        match serde_json::from_str::<SelectHandednessPayload>(data) {
            Ok(p) => Ok(Some(Postback::SelectHandedness {
                handedness: label("handedness", p.handedness)?,
            })),
            Err(e) => Err(PostbackError::Malformed(e)),
        }
    }

    /// Encode as postback data for an outbound button
    pub fn to_data(&self) -> String {
        let value = match self {
            Postback::StopChat => serde_json::to_value(StopPayload { stop: true }),
            Postback::WriteNote {
                state,
                work_date,
                action_step,
                skill,
            } => serde_json::to_value(WriteNotePayload {
                state: state.as_str().to_string(),
                work_date: work_date.clone(),
                action_step: action_step.as_str().to_string(),
                skill: skill.as_str().to_string(),
            }),
            Postback::PlayVideo {
                video_id,
                thumbnail_id,
            } => serde_json::to_value(VideoPayload {
                video_id: video_id.clone(),
                thumbnail_id: thumbnail_id.clone(),
            }),
            Postback::AskAi {
                handedness,
                work_date,
                skill,
            } => serde_json::to_value(AskAiPayload {
                handedness: handedness.as_str().to_string(),
                work_date: work_date.clone(),
                skill: skill.as_str().to_string(),
            }),
            Postback::SelectSkill { state, skill } => serde_json::to_value(SelectSkillPayload {
                state: state.as_str().to_string(),
                skill: skill.as_str().to_string(),
            }),
            Postback::SelectHandedness { handedness } => {
                serde_json::to_value(SelectHandednessPayload {
                    handedness: handedness.as_str().to_string(),
                })
            }
        };
        value.map(|v| v.to_string()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop() {
        assert_eq!(
            Postback::parse(r#"{"stop":true}"#).unwrap(),
            Some(Postback::StopChat)
        );
        assert_eq!(Postback::parse(r#"{"stop":false}"#).unwrap(), None);
    }

    #[test]
    fn test_menu_switch_is_ignored() {
        assert_eq!(Postback::parse("switch-to-main").unwrap(), None);
        assert_eq!(Postback::parse("switch-to-secondary").unwrap(), None);
    }

    #[test]
    fn test_write_note() {
        let data = r#"{"state":"writing_notes","work_date":"2025-03-01-10-30","action_step":"writing_reflection","skill":"serve"}"#;
        assert_eq!(
            Postback::parse(data).unwrap(),
            Some(Postback::WriteNote {
                state: UserState::WritingNotes,
                work_date: "2025-03-01-10-30".to_string(),
                action_step: ActionStep::WritingReflection,
                skill: Skill::Serve,
            })
        );
    }

    #[test]
    fn test_skill_and_handedness_selection() {
        assert_eq!(
            Postback::parse(r#"{"state":"analyzing_video","skill":"smash"}"#).unwrap(),
            Some(Postback::SelectSkill {
                state: UserState::AnalyzingVideo,
                skill: Skill::Smash,
            })
        );
        assert_eq!(
            Postback::parse(r#"{"handedness":"left"}"#).unwrap(),
            Some(Postback::SelectHandedness {
                handedness: Handedness::Left,
            })
        );
    }

    #[test]
    fn test_extra_field_is_rejected() {
        let data = r#"{"video_id":"a.mp4","thumbnail_id":"a.jpeg","extra":1}"#;
        assert!(matches!(
            Postback::parse(data),
            Err(PostbackError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let data = r#"{"handedness":"left","skill":"clear"}"#;
        assert!(Postback::parse(data).is_err());
    }

    #[test]
    fn test_empty_field_is_rejected() {
        let data = r#"{"video_id":"","thumbnail_id":"a.jpeg"}"#;
        assert!(matches!(
            Postback::parse(data),
            Err(PostbackError::EmptyField { field: "video_id" })
        ));
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let data = r#"{"handedness":"left","work_date":"2025-03-01-10-30","skill":"lob"}"#;
        assert!(matches!(
            Postback::parse(data),
            Err(PostbackError::InvalidValue { field: "skill", .. })
        ));
    }

    #[test]
    fn test_encoded_payloads_parse_back() {
        let postbacks = [
            Postback::StopChat,
            Postback::AskAi {
                handedness: Handedness::Right,
                work_date: "2025-03-01-10-30".to_string(),
                skill: Skill::Clear,
            },
            Postback::PlayVideo {
                video_id: "U1/clear/2025-03-01-10-30.mp4".to_string(),
                thumbnail_id: "U1/thumbnail/2025-03-01-10-30.jpeg".to_string(),
            },
        ];
        for postback in postbacks {
            assert_eq!(Postback::parse(&postback.to_data()).unwrap(), Some(postback));
        }
    }
}
