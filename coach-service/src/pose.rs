//! Pose-estimation inference client.
//!
//! The inference service grades a practice video and returns an annotated
//! copy. It is slow and occasionally unavailable, so calls go through
//! [`analyze_with_retry`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::PoseEstimationConfig;
use crate::db::{GradingOutcome, Handedness, Skill};
use crate::error::InferenceError;

/// Result of grading one video
#[derive(Debug, Clone, Deserialize)]
pub struct VideoAnalysis {
    /// Base64-encoded annotated video
    pub processed_video: String,
    pub grade: GradingOutcome,
}

/// Video grading service
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    /// One grading attempt
    async fn analyze(
        &self,
        video: Bytes,
        skill: Skill,
        handedness: Handedness,
    ) -> Result<VideoAnalysis, InferenceError>;
}

/// Fixed-delay retry schedule
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&PoseEstimationConfig> for RetryPolicy {
    fn from(config: &PoseEstimationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay(),
        }
    }
}

/// Call the estimator until it succeeds, fails permanently, or attempts run out
pub async fn analyze_with_retry(
    estimator: &dyn PoseEstimator,
    policy: RetryPolicy,
    video: Bytes,
    skill: Skill,
    handedness: Handedness,
) -> Result<VideoAnalysis, InferenceError> {
    let mut attempt = 1;
    loop {
        match estimator.analyze(video.clone(), skill, handedness).await {
            Ok(analysis) => {
                metrics::counter!("coach_inference_attempts_total", "outcome" => "success")
                    .increment(1);
                return Ok(analysis);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                metrics::counter!("coach_inference_attempts_total", "outcome" => "retry")
                    .increment(1);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Inference attempt failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                metrics::counter!("coach_inference_attempts_total", "outcome" => "failure")
                    .increment(1);
                if !e.is_retryable() {
                    return Err(e);
                }
                return Err(InferenceError::Exhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
        }
    }
}

/// [`PoseEstimator`] calling the HTTP inference service
pub struct PoseEstimationClient {
    client: Client,
    upload_url: String,
    username: String,
    password: String,
}

impl PoseEstimationClient {
    pub fn new(config: &PoseEstimationConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(InferenceError::Transport)?;

        Ok(Self {
            client,
            upload_url: format!("{}/upload", config.base_url.trim_end_matches('/')),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl PoseEstimator for PoseEstimationClient {
    async fn analyze(
        &self,
        video: Bytes,
        skill: Skill,
        handedness: Handedness,
    ) -> Result<VideoAnalysis, InferenceError> {
        let part = Part::bytes(video.to_vec())
            .file_name("video.mp4")
            .mime_str("video/mp4")
            .map_err(InferenceError::Transport)?;
        let form = Form::new()
            .part("video", part)
            .text("skill", skill.as_str())
            .text("handedness", handedness.as_str());

        let response = self
            .client
            .post(&self.upload_url)
            .basic_auth(&self.username, Some(&self.password))
            .multipart(form)
            .send()
            .await
            .map_err(InferenceError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let analysis: VideoAnalysis =
            response.json().await.map_err(|e| InferenceError::Decode {
                message: e.to_string(),
            })?;

        info!(
            skill = %skill,
            handedness = %handedness,
            total_grade = analysis.grade.total_grade,
            "Video graded"
        );
        Ok(analysis)
    }
}
