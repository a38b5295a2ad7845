//! Portfolio carousel rendering.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::messages::OutboundMessage;
use crate::blob::BlobStore;
use crate::db::{ActionStep, Handedness, Skill, UserState, Work};
use crate::i18n::I18n;
use crate::postback::Postback;

const GOLD_STAR_URL: &str =
    "https://scdn.line-apps.com/n/channel_devcenter/img/fx/review_gold_star_28.png";
const GRAY_STAR_URL: &str =
    "https://scdn.line-apps.com/n/channel_devcenter/img/fx/review_gray_star_28.png";

/// Bubbles per carousel message
const CAROUSEL_CAPACITY: usize = 10;
const STAR_COUNT: usize = 5;
const POINTS_PER_STAR: f64 = 20.0;

/// Localized text used in portfolio bubbles
#[derive(Debug, Clone)]
pub struct PortfolioLabels {
    pub alt_text: String,
    pub ai_note: String,
    pub preview_note: String,
    pub reflection: String,
    pub empty_note: String,
    pub edit_reflection: String,
    pub edit_preview_note: String,
    pub ask_ai: String,
    pub play_video: String,
    pub play_comparison: String,
}

impl PortfolioLabels {
    pub fn load(i18n: &I18n, locale: &str) -> Self {
        let get = |key: &str| i18n.get(locale, key, None);
        Self {
            alt_text: get("portfolio-alt-text"),
            ai_note: get("portfolio-label-ai-note"),
            preview_note: get("portfolio-label-preview-note"),
            reflection: get("portfolio-label-reflection"),
            empty_note: get("portfolio-empty-note"),
            edit_reflection: get("portfolio-button-edit-reflection"),
            edit_preview_note: get("portfolio-button-edit-preview-note"),
            ask_ai: get("portfolio-button-ask-ai"),
            play_video: get("portfolio-button-play-video"),
            play_comparison: get("portfolio-button-play-comparison"),
        }
    }
}

/// Number of gold stars for a grade: one per full 20 points, at most five
pub fn full_star_count(total_grade: f64) -> usize {
    (0..STAR_COUNT)
        .filter(|&i| total_grade - POINTS_PER_STAR * i as f64 >= POINTS_PER_STAR)
        .count()
}

fn rating_box(total_grade: f64) -> Value {
    let full = full_star_count(total_grade);
    let mut contents: Vec<Value> = (0..STAR_COUNT)
        .map(|i| {
            let url = if i < full { GOLD_STAR_URL } else { GRAY_STAR_URL };
            json!({ "type": "icon", "size": "sm", "url": url })
        })
        .collect();
    contents.push(json!({
        "type": "text",
        "text": format!("{:.2}", total_grade),
        "size": "sm",
        "color": "#8c8c8c",
        "margin": "md",
        "flex": 0,
    }));

    json!({
        "type": "box",
        "layout": "baseline",
        "margin": "md",
        "contents": contents,
    })
}

fn note_section(label: &str, text: &str, empty: &str) -> Value {
    let text = if text.trim().is_empty() { empty } else { text };
    json!({
        "type": "box",
        "layout": "vertical",
        "margin": "lg",
        "spacing": "sm",
        "contents": [
            { "type": "text", "text": label, "color": "#000000", "size": "md", "weight": "bold", "flex": 1 },
            { "type": "text", "text": text, "wrap": true, "color": "#666666", "size": "sm", "flex": 5 },
        ],
    })
}

fn postback_button(label: &str, postback: &Postback, style: &str, open_keyboard: bool) -> Value {
    let mut action = json!({
        "type": "postback",
        "label": label,
        "data": postback.to_data(),
    });
    if open_keyboard {
        action["inputOption"] = json!("openKeyboard");
    }
    json!({ "type": "button", "style": style, "height": "sm", "action": action })
}

struct BubbleContext<'a> {
    skill: Skill,
    handedness: Handedness,
    editing: bool,
    blobs: &'a dyn BlobStore,
    labels: &'a PortfolioLabels,
}

fn bubble(work: &Work, ctx: &BubbleContext<'_>) -> Value {
    let labels = ctx.labels;
    let date = work.date_time.get(..10).unwrap_or(&work.date_time);

    let mut buttons = Vec::new();
    if ctx.editing {
        for (label, step) in [
            (&labels.edit_reflection, ActionStep::WritingReflection),
            (&labels.edit_preview_note, ActionStep::WritingPreviewNote),
        ] {
            let postback = Postback::WriteNote {
                state: UserState::WritingNotes,
                work_date: work.date_time.clone(),
                action_step: step,
                skill: ctx.skill,
            };
            buttons.push(postback_button(label, &postback, "primary", true));
        }
    }
    buttons.push(postback_button(
        &labels.ask_ai,
        &Postback::AskAi {
            handedness: ctx.handedness,
            work_date: work.date_time.clone(),
            skill: ctx.skill,
        },
        "secondary",
        false,
    ));
    buttons.push(postback_button(
        &labels.play_video,
        &Postback::PlayVideo {
            video_id: work.video.clone(),
            thumbnail_id: work.thumbnail.clone(),
        },
        "link",
        false,
    ));
    if !work.comparison_video.is_empty() {
        buttons.push(postback_button(
            &labels.play_comparison,
            &Postback::PlayVideo {
                video_id: work.comparison_video.clone(),
                thumbnail_id: work.thumbnail.clone(),
            },
            "link",
            false,
        ));
    }

    json!({
        "type": "bubble",
        "hero": {
            "type": "image",
            "url": ctx.blobs.url(&work.thumbnail),
            "size": "full",
            "aspectRatio": "20:13",
            "aspectMode": "cover",
        },
        "body": {
            "type": "box",
            "layout": "vertical",
            "contents": [
                { "type": "text", "text": format!("🗓️ {}", date), "weight": "bold", "size": "xl" },
                rating_box(work.grading_outcome.total_grade),
                note_section(&labels.ai_note, &work.ai_note, &labels.empty_note),
                note_section(&labels.preview_note, &work.preview_note, &labels.empty_note),
                note_section(&labels.reflection, &work.reflection, &labels.empty_note),
            ],
        },
        "footer": {
            "type": "box",
            "layout": "vertical",
            "spacing": "sm",
            "contents": buttons,
        },
    })
}

/// Render a skill portfolio as carousel messages.
///
/// Works are ordered newest first within the carousels and the carousels are
/// sent oldest first, so the newest work ends up in the last message.
pub fn portfolio_carousels(
    works: &BTreeMap<String, Work>,
    skill: Skill,
    handedness: Handedness,
    editing: bool,
    blobs: &dyn BlobStore,
    labels: &PortfolioLabels,
) -> Vec<OutboundMessage> {
    let ctx = BubbleContext {
        skill,
        handedness,
        editing,
        blobs,
        labels,
    };

    // Date-keys share one fixed-width format, so key order is chronological
    let bubbles: Vec<Value> = works.values().rev().map(|w| bubble(w, &ctx)).collect();

    let mut carousels: Vec<OutboundMessage> = bubbles
        .chunks(CAROUSEL_CAPACITY)
        .map(|chunk| OutboundMessage::Flex {
            alt_text: labels.alt_text.clone(),
            contents: json!({ "type": "carousel", "contents": chunk }),
        })
        .collect();
    carousels.reverse();
    carousels
}
