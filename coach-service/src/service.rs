//! Coaching service coordinator.
//!
//! [`CoachService`] owns the collaborators behind every external system and
//! drives the per-user session state machine. The submodules split its
//! `impl` by flow.

mod chat;
mod conversations;
mod fanout;
mod onboarding;
mod pipeline;
mod state_machine;
mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::SummaryResult;

use std::sync::Arc;

use tracing::{info, warn};

use crate::ai::{ConversationBackend, OllamaConversations};
use crate::blob::{BlobStore, LocalBlobStore};
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::ServiceResult;
use crate::i18n::I18n;
use crate::line::{ChatPlatform, LineClient, PortfolioLabels};
use crate::media::{FfmpegMedia, MediaTools};
use crate::pose::{PoseEstimationClient, PoseEstimator, RetryPolicy};

/// External systems the coaching flows talk to
#[derive(Clone)]
pub struct Collaborators {
    pub db: Arc<Database>,
    pub platform: Arc<dyn ChatPlatform>,
    pub blobs: Arc<dyn BlobStore>,
    pub ai: Arc<dyn ConversationBackend>,
    pub pose: Arc<dyn PoseEstimator>,
    pub media: Arc<dyn MediaTools>,
}

/// Main service coordinator
pub struct CoachService {
    pub db: Arc<Database>,
    pub platform: Arc<dyn ChatPlatform>,
    pub blobs: Arc<dyn BlobStore>,
    pub ai: Arc<dyn ConversationBackend>,
    pose: Arc<dyn PoseEstimator>,
    media: Arc<dyn MediaTools>,
    pub i18n: Arc<I18n>,
    pub config: Arc<AppConfig>,
    retry_policy: RetryPolicy,
    labels: PortfolioLabels,
}

impl CoachService {
    pub fn new(collaborators: Collaborators, config: Arc<AppConfig>) -> Self {
        let i18n = Arc::new(I18n::new());
        let labels = PortfolioLabels::load(&i18n, &config.locale);
        let retry_policy = RetryPolicy::from(&config.pose_estimation);

        Self {
            db: collaborators.db,
            platform: collaborators.platform,
            blobs: collaborators.blobs,
            ai: collaborators.ai,
            pose: collaborators.pose,
            media: collaborators.media,
            i18n,
            config,
            retry_policy,
            labels,
        }
    }

    /// Wire the production collaborators from configuration
    pub async fn from_config(config: Arc<AppConfig>) -> ServiceResult<Self> {
        info!("Initializing coaching service");

        let db_path = config.storage.database_path();
        let db = Arc::new(Database::open(&db_path)?);
        info!(path = %db_path.display(), "Database initialized");

        let ai = OllamaConversations::new(&config.ollama, Arc::clone(&db))?;
        if ai.health_check().await {
            info!(url = %config.ollama.base_url, "Ollama is available");
        } else {
            warn!(url = %config.ollama.base_url, "Ollama is not available");
        }

        let blob_dir = config.storage.blob_dir();
        info!(path = %blob_dir.display(), "Blob store initialized");

        let collaborators = Collaborators {
            db,
            platform: Arc::new(LineClient::new(&config.line)?),
            blobs: Arc::new(LocalBlobStore::new(
                blob_dir,
                &config.storage.public_base_url,
            )),
            ai: Arc::new(ai),
            pose: Arc::new(PoseEstimationClient::new(&config.pose_estimation)?),
            media: Arc::new(FfmpegMedia::new(config.media.ffmpeg_path.clone())),
        };

        Ok(Self::new(collaborators, config))
    }

    /// Localized text in the configured locale
    pub(crate) fn t(&self, key: &str) -> String {
        self.i18n.get(&self.config.locale, key, None)
    }

    /// Localized text with arguments in the configured locale
    pub(crate) fn tf(&self, key: &str, args: &[(&str, &str)]) -> String {
        self.i18n.format(&self.config.locale, key, args)
    }
}
