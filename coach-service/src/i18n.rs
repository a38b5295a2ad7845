use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

/// Internationalization service using Fluent (thread-safe)
pub struct I18n {
    bundles: RwLock<HashMap<String, FluentBundle<FluentResource>>>,
    default_locale: String,
}

impl I18n {
    /// Create a new i18n service with the embedded zh-TW and en translations
    pub fn new() -> Self {
        let i18n = Self {
            bundles: RwLock::new(HashMap::new()),
            default_locale: "zh-TW".to_string(),
        };

        for (locale, content) in [("zh-TW", ZH_TW), ("en", EN)] {
            if let Err(e) = i18n.add_locale(locale, content) {
                warn!(locale = %locale, error = %e, "Failed to load embedded translations");
            }
        }

        i18n
    }

    /// Add a locale with translations
    pub fn add_locale(&self, locale: &str, content: &str) -> Result<(), String> {
        let lang_id: LanguageIdentifier = locale
            .parse()
            .map_err(|e| format!("Invalid locale '{}': {}", locale, e))?;

        let resource = FluentResource::try_new(content.to_string())
            .map_err(|(_, errors)| format!("Failed to parse Fluent resource: {:?}", errors))?;

        let mut bundle = FluentBundle::new_concurrent(vec![lang_id]);
        // Chat clients render the bidi isolation marks literally
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| format!("Failed to add resource to bundle: {:?}", errors))?;

        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| "translation bundles lock poisoned".to_string())?;
        bundles.insert(locale.to_string(), bundle);

        debug!(locale = %locale, "Loaded translations");

        Ok(())
    }

    /// Get a translated message
    pub fn get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        // Try requested locale, fall back to default, fall back to key
        self.try_get(locale, key, args)
            .or_else(|| self.try_get(&self.default_locale, key, args))
            .unwrap_or_else(|| key.to_string())
    }

    /// Try to get a translation from a specific locale
    fn try_get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundles = self.bundles.read().ok()?;
        let bundle = bundles.get(locale)?;
        let message = bundle.get_message(key)?;
        let pattern = message.value()?;

        let mut errors = vec![];
        let result = bundle.format_pattern(pattern, args, &mut errors);

        if !errors.is_empty() {
            warn!(key = %key, errors = ?errors, "Fluent formatting errors");
        }

        Some(result.to_string())
    }

    /// Get a translated message with arguments
    pub fn format(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (k, v) in args {
            fluent_args.set(*k, *v);
        }
        self.get(locale, key, Some(&fluent_args))
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new()
    }
}

const ZH_TW: &str = r#"
# Generic replies
reply-default-error = 發生錯誤，請重新操作
reply-unsupported-message = 抱歉，您所輸入的訊息格式目前並未支援，請重試一次！
reply-no-portfolio = 尚未上傳【{ $skill }】的學習反思及影片

# Onboarding
reply-welcome =
    Hi { $name }! 歡迎加入羽球教室🏸
    已建立您的使用者資料🎉🎊 請點選選單的項目開始使用
reply-instruction =
    歡迎加入羽球教室🏸，以下為選單的使用說明：
    ➡️ 使用說明：呼叫選單各個項目的解說
    ➡️ 預習及反思：記錄每次練習各動作的課前檢視要點與學習反思
    ➡️ 學習歷程：查看個人的學習歷程記錄
    ➡️ 動作分析：上傳個人動作錄影，系統將自動評分並產生學習歷程
    ➡️ GPT對談：與AI教練對話，獲取羽球相關資訊
    ➡️ 專家影片：觀看專家示範影片
    ⚠️ 每次的學習歷程都需有【影片】才能建檔

# Skill selection prompts
prompt-skill-portfolio = 請選擇要查看的動作
prompt-skill-expert-videos = 請選擇要觀看的動作
prompt-skill-analysis = 請選擇要分析的動作
prompt-skill-notes = 請選擇要記錄的動作
prompt-skill-chat = 請選擇要對談的動作
prompt-handedness = 請選擇左手或右手
prompt-upload-video = 請上傳影片
prompt-preview-note = 請輸入【{ $date }】的【{ $skill }】的課前檢視要點
prompt-reflection = 請輸入【{ $date }】的【{ $skill }】的學習反思

# AI chat
reply-chat-started = 已進入和GPT對話模式
reply-chat-stopped = 已結束對話
quick-reply-stop-chat = 結束對話
reply-ai-failed = 無法取得建議，請再試一次
prompt-explain-grade =
    以下為我此次動作的資料，請分析並給出改善建議：
    慣用手：{ $handedness }
    動作技能：{ $skill }
    動作評分細節：{ $details }

# Expert videos
reply-expert-videos-header = 以下是【{ $handedness }】-【{ $skill }】的專家示範影片：
reply-expert-video-item =
    專家影片{ $index }：
    { $url }
reply-no-expert-videos = 目前沒有【{ $handedness }】-【{ $skill }】的專家示範影片

# Portfolio
reply-upload-success = 已成功上傳影片!
portfolio-header-editing = 請選擇您要更新的學習歷程：
portfolio-header-viewing = 以下為您的學習歷程：
portfolio-alt-text = 學習歷程
portfolio-label-ai-note = 需調整細節：
portfolio-label-preview-note = 課前動作檢測要點：
portfolio-label-reflection = 學習反思：
portfolio-empty-note = 無內容
portfolio-button-edit-reflection = 更新學習反思
portfolio-button-edit-preview-note = 更新課前動作檢測要點
portfolio-button-ask-ai = 詢問AI建議
portfolio-button-play-video = 查看影片
portfolio-button-play-comparison = 查看比較影片

# Work defaults
work-default-reflection = 尚未填寫心得
work-default-preview-note = 尚未填寫課前檢視要點
work-default-ai-note = 尚未詢問 AI 改善建議
"#;

const EN: &str = r#"
reply-default-error = Something went wrong, please try again
reply-unsupported-message = Sorry, this message type is not supported yet. Please try again!
reply-no-portfolio = No reflections or videos uploaded for { $skill } yet
reply-chat-started = You are now chatting with the AI coach
reply-chat-stopped = Chat ended
quick-reply-stop-chat = End chat
reply-ai-failed = Could not get suggestions, please try again
prompt-handedness = Please choose left or right hand
prompt-upload-video = Please upload a video
reply-upload-success = Video uploaded successfully!
"#;
