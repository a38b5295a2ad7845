//! In-memory collaborators for service tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use tempfile::TempDir;

use super::{CoachService, Collaborators};
use crate::ai::ConversationBackend;
use crate::blob::{BlobStore, LocalBlobStore};
use crate::config::AppConfig;
use crate::db::{Database, GradingDetail, GradingOutcome, Handedness, Skill};
use crate::error::{AiError, InferenceError, MediaError, PlatformError, ServiceResult};
use crate::line::{ChatPlatform, EventKind, InboundEvent, OutboundMessage};
use crate::media::MediaTools;
use crate::pose::{PoseEstimator, VideoAnalysis};

pub const USER_ID: &str = "U1234";

#[derive(Default)]
pub struct RecordingPlatform {
    pub replies: Mutex<Vec<Vec<OutboundMessage>>>,
    pub pushes: Mutex<Vec<Vec<OutboundMessage>>>,
    pub fail_replies: bool,
}

impl RecordingPlatform {
    pub fn pushed(&self) -> Vec<Vec<OutboundMessage>> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn replied(&self) -> Vec<Vec<OutboundMessage>> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn reply(
        &self,
        _reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), PlatformError> {
        if self.fail_replies {
            return Err(PlatformError::Api {
                status: 400,
                message: "Invalid reply token".to_string(),
            });
        }
        self.replies.lock().unwrap().push(messages.to_vec());
        Ok(())
    }

    async fn push(&self, _user_id: &str, messages: &[OutboundMessage]) -> Result<(), PlatformError> {
        self.pushes.lock().unwrap().push(messages.to_vec());
        Ok(())
    }

    async fn message_content(&self, _message_id: &str) -> Result<Bytes, PlatformError> {
        Ok(Bytes::from_static(b"raw video"))
    }

    async fn profile_name(&self, _user_id: &str) -> Result<String, PlatformError> {
        Ok("Amy".to_string())
    }
}

/// Conversation backend answering with canned text
#[derive(Default)]
pub struct FakeAi {
    pub created: AtomicUsize,
    pub sent: Mutex<Vec<(String, String)>>,
    pub summaries: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl ConversationBackend for FakeAi {
    async fn create_conversation(&self) -> ServiceResult<String> {
        if self.fail {
            return Err(AiError::EmptyOutput.into());
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("conv-{n}"))
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> ServiceResult<String> {
        if self.fail {
            return Err(AiError::EmptyOutput.into());
        }
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), text.to_string()));
        Ok(format!("coach says: {text}"))
    }

    async fn summarize(&self, content: &str) -> ServiceResult<String> {
        if self.fail {
            return Err(AiError::EmptyOutput.into());
        }
        let n = self.summaries.fetch_add(1, Ordering::SeqCst);
        Ok(format!("summary {n} of {content}"))
    }
}

pub struct FakePose {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PoseEstimator for FakePose {
    async fn analyze(
        &self,
        _video: Bytes,
        _skill: Skill,
        _handedness: Handedness,
    ) -> Result<VideoAnalysis, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(VideoAnalysis {
            processed_video: BASE64.encode(b"processed video"),
            grade: GradingOutcome {
                grading_details: vec![GradingDetail {
                    description: "racket preparation".to_string(),
                    grade: 30.0,
                }],
                total_grade: 72.5,
            },
        })
    }
}

/// Media tools writing marker files instead of running ffmpeg
#[derive(Default)]
pub struct FakeMedia {
    pub fail_stacking: bool,
}

#[async_trait]
impl MediaTools for FakeMedia {
    async fn stack_with_reference(
        &self,
        _input: &Path,
        _reference: &Path,
        output: &Path,
    ) -> Result<(), MediaError> {
        if self.fail_stacking {
            return Err(MediaError::Failed {
                program: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "pro video missing".to_string(),
            });
        }
        tokio::fs::write(output, b"stacked video")
            .await
            .map_err(MediaError::Io)
    }

    async fn extract_thumbnail(&self, _input: &Path, output: &Path) -> Result<(), MediaError> {
        tokio::fs::write(output, b"jpeg").await.map_err(MediaError::Io)
    }
}

pub struct Harness {
    pub _dir: TempDir,
    pub service: CoachService,
    pub db: Arc<Database>,
    pub platform: Arc<RecordingPlatform>,
    pub ai: Arc<FakeAi>,
    pub pose: Arc<FakePose>,
    pub blobs: Arc<LocalBlobStore>,
}

pub struct HarnessOptions {
    pub platform: RecordingPlatform,
    pub ai: FakeAi,
    pub media: FakeMedia,
    pub config: AppConfig,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        let mut config = AppConfig::default();
        config.pose_estimation.retry_delay_secs = 0;
        Self {
            platform: RecordingPlatform::default(),
            ai: FakeAi::default(),
            media: FakeMedia::default(),
            config,
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with(HarnessOptions::default())
    }

    pub fn with(options: HarnessOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("coach.db")).unwrap());
        let platform = Arc::new(options.platform);
        let ai = Arc::new(options.ai);
        let pose = Arc::new(FakePose {
            calls: AtomicUsize::new(0),
        });
        let blobs = Arc::new(LocalBlobStore::new(
            dir.path().join("blobs"),
            "https://coach.example.com",
        ));

        let collaborators = Collaborators {
            db: Arc::clone(&db),
            platform: platform.clone(),
            blobs: blobs.clone(),
            ai: ai.clone(),
            pose: pose.clone(),
            media: Arc::new(options.media),
        };
        let service = CoachService::new(collaborators, Arc::new(options.config));

        Self {
            _dir: dir,
            service,
            db,
            platform,
            ai,
            pose,
            blobs,
        }
    }
}

pub fn event(kind: EventKind) -> InboundEvent {
    InboundEvent {
        user_id: USER_ID.to_string(),
        reply_token: Some("reply-token".to_string()),
        kind,
    }
}

pub fn text(body: &str) -> InboundEvent {
    event(EventKind::Text {
        text: body.to_string(),
    })
}

pub fn postback(data: String) -> InboundEvent {
    event(EventKind::Postback { data })
}

/// Text bodies of a reply, in order
pub fn texts(messages: &[OutboundMessage]) -> Vec<&str> {
    messages.iter().filter_map(OutboundMessage::as_text).collect()
}

/// Stored blob content, if present
pub async fn blob(blobs: &LocalBlobStore, path: &str) -> Option<Bytes> {
    blobs.get(path).await.ok()
}
