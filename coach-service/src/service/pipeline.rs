//! Video analysis pipeline.
//!
//! An uploaded practice video is graded by the pose-estimation service,
//! composed beside the matching expert clip, thumbnailed, uploaded to blob
//! storage and recorded as a new [`Work`] in the learner's portfolio.

use std::path::{Path, PathBuf};
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::Local;
use tracing::{info, warn};

use super::CoachService;
use crate::db::{Handedness, Skill, UserData, UserSession, WORK_DATE_FORMAT, Work};
use crate::error::{MediaError, ServiceError, ServiceResult, format_error_chain};
use crate::pose::analyze_with_retry;

async fn read_file(path: &Path) -> ServiceResult<Bytes> {
    let data = tokio::fs::read(path).await.map_err(MediaError::Io)?;
    Ok(Bytes::from(data))
}

impl CoachService {
    /// Grade and store an uploaded video, returning the new work
    pub async fn process_upload(
        &self,
        user: &mut UserData,
        session: &UserSession,
        video: Bytes,
    ) -> ServiceResult<Work> {
        let (skill, handedness) = match (session.skill, session.handedness) {
            (Some(skill), Some(handedness)) => (skill, handedness),
            _ => {
                return Err(ServiceError::InvalidStep {
                    state: session.user_state.to_string(),
                    step: session.action_step.to_string(),
                });
            }
        };

        let started = Instant::now();
        info!(user_id = %user.id, skill = %skill, handedness = %handedness, bytes = video.len(), "Analyzing video");

        let analysis =
            analyze_with_retry(self.pose.as_ref(), self.retry_policy, video, skill, handedness)
                .await?;
        let processed = BASE64
            .decode(analysis.processed_video.as_bytes())
            .map_err(MediaError::Decode)?;

        let workdir = tempfile::tempdir().map_err(MediaError::Io)?;
        let processed_path = workdir.path().join("processed.mp4");
        tokio::fs::write(&processed_path, &processed)
            .await
            .map_err(MediaError::Io)?;

        let comparison_path = self
            .compose_comparison(&processed_path, workdir.path(), skill, handedness)
            .await;

        let thumbnail_path = workdir.path().join("thumbnail.jpeg");
        let thumbnail_source = comparison_path.as_deref().unwrap_or(processed_path.as_path());
        self.media
            .extract_thumbnail(thumbnail_source, &thumbnail_path)
            .await?;

        let ts = Local::now().format(WORK_DATE_FORMAT).to_string();
        let video_path = format!("{}/{}/{}.mp4", user.id, skill, ts);
        let thumbnail_blob = format!("{}/thumbnail/{}.jpeg", user.id, ts);

        self.blobs.put(&video_path, Bytes::from(processed)).await?;
        let comparison_video = match &comparison_path {
            Some(path) => {
                let blob_path = format!("{}/{}/{}_comparison.mp4", user.id, skill, ts);
                self.blobs.put(&blob_path, read_file(path).await?).await?;
                blob_path
            }
            None => String::new(),
        };
        self.blobs
            .put(&thumbnail_blob, read_file(&thumbnail_path).await?)
            .await?;

        let work = Work {
            date_time: ts.clone(),
            thumbnail: thumbnail_blob,
            video: video_path,
            comparison_video,
            reflection: self.t("work-default-reflection"),
            preview_note: self.t("work-default-preview-note"),
            ai_note: self.t("work-default-ai-note"),
            grading_outcome: analysis.grade,
        };
        user.portfolio.get_mut(skill).insert(ts.clone(), work.clone());
        self.db.put_user(user)?;

        metrics::histogram!("coach_pipeline_seconds").record(started.elapsed().as_secs_f64());
        info!(
            user_id = %user.id,
            skill = %skill,
            work_date = %ts,
            total_grade = work.grading_outcome.total_grade,
            "Work recorded"
        );
        Ok(work)
    }

    /// Compose the processed video beside the expert reference.
    ///
    /// Returns `None` when compositing fails; the work is then stored without
    /// a comparison video.
    async fn compose_comparison(
        &self,
        processed: &Path,
        workdir: &Path,
        skill: Skill,
        handedness: Handedness,
    ) -> Option<PathBuf> {
        let reference = self
            .config
            .media
            .reference_video_dir
            .join(format!("pro_{}_{}.mp4", handedness, skill));
        let output = workdir.join("comparison.mp4");

        match self
            .media
            .stack_with_reference(processed, &reference, &output)
            .await
        {
            Ok(()) => Some(output),
            Err(e) => {
                warn!(
                    reference = %reference.display(),
                    error = %format_error_chain(&e),
                    "Compositing failed, storing work without comparison video"
                );
                None
            }
        }
    }
}
