use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::Skill;
use crate::i18n::I18n;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("No work recorded for {skill} at {date}")]
    WorkNotFound { skill: Skill, date: String },

    #[error("No portfolio entries for skill {skill}")]
    NoPortfolio { skill: Skill },

    #[error("Invalid action step {step} for state {state}")]
    InvalidStep { state: String, step: String },

    #[error("{0}")]
    Ai(#[from] AiError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Platform(#[from] PlatformError),

    #[error("{0}")]
    Inference(#[from] InferenceError),

    #[error("{0}")]
    Media(#[from] MediaError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Stats(#[from] StatsError),

    #[error("{0}")]
    Postback(#[from] PostbackError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// AI conversation backend errors
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Connection failed to AI backend at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Generation failed (status {status}): {message}")]
    Generation { status: u16, message: String },

    #[error("Invalid response from AI backend")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },

    #[error("Conversation not found: {conversation_id}")]
    ConversationNotFound { conversation_id: String },

    #[error("No assistant text output available")]
    EmptyOutput,
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,
}

/// Chat platform (LINE) errors
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Request to chat platform failed")]
    Request(#[from] reqwest::Error),

    #[error("Chat platform API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed webhook body")]
    MalformedBody(#[source] serde_json::Error),
}

/// Pose-estimation inference errors
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference request failed")]
    Transport(#[source] reqwest::Error),

    #[error("Inference server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode inference response: {message}")]
    Decode { message: String },

    #[error("Inference failed after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<InferenceError>,
    },
}

impl InferenceError {
    /// Transport failures and 5xx responses are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Transport(_) => true,
            InferenceError::Status { status, .. } => *status >= 500,
            InferenceError::Decode { .. } | InferenceError::Exhausted { .. } => false,
        }
    }
}

/// External media tool (ffmpeg) errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Processed video is not valid base64")]
    Decode(#[source] base64::DecodeError),

    #[error("IO error")]
    Io(#[source] std::io::Error),
}

/// Blob storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid blob path: {path}")]
    InvalidPath { path: String },

    #[error("Blob not found: {path}")]
    NotFound { path: String },

    #[error("Blob IO failed for {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Stats aggregation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StatsError {
    #[error("no values to compute stats")]
    NoValues,

    #[error("Stats on {date} cannot be calculated")]
    DateBucket { date: String },

    #[error("failed to parse the work's key as a date string: {key}")]
    InvalidDateKey { key: String },

    #[error("invalid or empty skill portfolio: {skill}")]
    UnknownSkill { skill: String },
}

/// Postback payload decoding errors
#[derive(Error, Debug)]
pub enum PostbackError {
    #[error("Malformed postback payload")]
    Malformed(#[source] serde_json::Error),

    #[error("Postback field {field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("Invalid {field} in postback: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::UserNotFound { .. }
            | ServiceError::WorkNotFound { .. }
            | ServiceError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ServiceError::Storage(StorageError::InvalidPath { .. }) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidRequest { .. }
            | ServiceError::Stats(_)
            | ServiceError::Postback(_) => StatusCode::BAD_REQUEST,
            ServiceError::Platform(PlatformError::InvalidSignature)
            | ServiceError::Platform(PlatformError::MalformedBody(_)) => StatusCode::BAD_REQUEST,
            ServiceError::Ai(_) | ServiceError::Inference(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::UserNotFound { .. } => "user_not_found",
            ServiceError::WorkNotFound { .. } => "work_not_found",
            ServiceError::NoPortfolio { .. } => "no_portfolio",
            ServiceError::InvalidStep { .. } => "invalid_step",
            ServiceError::Ai(AiError::ConversationNotFound { .. }) => "conversation_not_found",
            ServiceError::Ai(_) => "ai_error",
            ServiceError::Database(_) => "database_error",
            ServiceError::Platform(PlatformError::InvalidSignature) => "invalid_signature",
            ServiceError::Platform(_) => "platform_error",
            ServiceError::Inference(_) => "inference_error",
            ServiceError::Media(_) => "media_error",
            ServiceError::Storage(StorageError::NotFound { .. }) => "blob_not_found",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::Stats(_) => "stats_error",
            ServiceError::Postback(_) => "invalid_postback",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }

    /// Chat reply text shown to the learner when this error ends an interaction
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            ServiceError::NoPortfolio { skill } => {
                i18n.format(locale, "reply-no-portfolio", &[("skill", skill.label_zh())])
            }
            _ => i18n.get(locale, "reply-default-error", None),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(code),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error with its full source chain for logging
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
