//! Service configuration.
//!
//! Settings come from an optional `config.*` file and `COACH__*` environment
//! variables (see [`loader`]). Every section has defaults so the service can
//! start with only the LINE credentials supplied.

mod loader;

pub use loader::load_config;

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::{Handedness, Skill};

/// Complete service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_line")]
    pub line: LineConfig,

    #[serde(default = "default_ollama")]
    pub ollama: OllamaConfig,

    #[serde(default = "default_pose_estimation")]
    pub pose_estimation: PoseEstimationConfig,

    #[serde(default = "default_media")]
    pub media: MediaConfig,

    /// Expert demonstration URLs keyed by `{handedness}_{skill}`
    #[serde(default = "default_expert_videos")]
    pub expert_videos: HashMap<String, Vec<String>>,

    #[serde(default = "default_locale")]
    pub locale: String,
}

impl AppConfig {
    /// Expert videos for a handedness and skill; empty when none are configured
    pub fn expert_videos_for(&self, handedness: Handedness, skill: Skill) -> &[String] {
        let key = format!("{}_{}", handedness.as_str(), skill.as_str());
        self.expert_videos
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            line: default_line(),
            ollama: default_ollama(),
            pose_estimation: default_pose_estimation(),
            media: default_media(),
            expert_videos: default_expert_videos(),
            locale: default_locale(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL under which `/media/{path}` blobs are reachable by the chat platform
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("coach.db")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

/// LINE Messaging API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_secret: String,

    #[serde(default)]
    pub channel_access_token: String,

    #[serde(default = "default_line_api_base_url")]
    pub api_base_url: String,

    /// Host serving message content downloads
    #[serde(default = "default_line_data_api_base_url")]
    pub data_api_base_url: String,

    #[serde(default = "default_line_timeout")]
    pub timeout_secs: u64,
}

impl LineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Ollama LLM configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_ollama_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_chat_system_prompt")]
    pub chat_system_prompt: String,

    #[serde(default = "default_summary_system_prompt")]
    pub summary_system_prompt: String,
}

impl OllamaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Pose-estimation inference service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoseEstimationConfig {
    #[serde(default = "default_pose_url")]
    pub base_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_pose_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl PoseEstimationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// External media tool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Directory holding `pro_{handedness}_{skill}.mp4` reference clips
    #[serde(default = "default_reference_video_dir")]
    pub reference_video_dir: PathBuf,
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
        public_base_url: default_public_base_url(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_line() -> LineConfig {
    LineConfig {
        channel_secret: String::new(),
        channel_access_token: String::new(),
        api_base_url: default_line_api_base_url(),
        data_api_base_url: default_line_data_api_base_url(),
        timeout_secs: default_line_timeout(),
    }
}

fn default_line_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_line_data_api_base_url() -> String {
    "https://api-data.line.me".to_string()
}

fn default_line_timeout() -> u64 {
    30
}

fn default_ollama() -> OllamaConfig {
    OllamaConfig {
        base_url: default_ollama_url(),
        model: default_model(),
        temperature: default_temperature(),
        request_timeout_secs: default_ollama_timeout(),
        chat_system_prompt: default_chat_system_prompt(),
        summary_system_prompt: default_summary_system_prompt(),
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_ollama_timeout() -> u64 {
    120
}

fn default_chat_system_prompt() -> String {
    "你是一位羽球教練，請以繁體中文回答學生關於羽球動作技巧的問題，並給出具體可執行的練習建議。"
        .to_string()
}

fn default_summary_system_prompt() -> String {
    "請以繁體中文，用條列方式摘要以下學生與羽球教練的對話重點。".to_string()
}

fn default_pose_estimation() -> PoseEstimationConfig {
    PoseEstimationConfig {
        base_url: default_pose_url(),
        username: String::new(),
        password: String::new(),
        request_timeout_secs: default_pose_timeout(),
        max_attempts: default_max_attempts(),
        retry_delay_secs: default_retry_delay(),
    }
}

fn default_pose_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_pose_timeout() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    6
}

fn default_retry_delay() -> u64 {
    10
}

fn default_media() -> MediaConfig {
    MediaConfig {
        ffmpeg_path: default_ffmpeg_path(),
        reference_video_dir: default_reference_video_dir(),
    }
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_reference_video_dir() -> PathBuf {
    PathBuf::from("./pro_videos")
}

fn default_expert_videos() -> HashMap<String, Vec<String>> {
    HashMap::from([
        (
            "right_clear".to_string(),
            vec!["https://youtu.be/K7EEhEF2vMo".to_string()],
        ),
        (
            "left_clear".to_string(),
            vec![
                "https://youtu.be/yyjC-xXOsdg".to_string(),
                "https://youtu.be/AzF44kouBBQ".to_string(),
            ],
        ),
    ])
}

fn default_locale() -> String {
    "zh-TW".to_string()
}
