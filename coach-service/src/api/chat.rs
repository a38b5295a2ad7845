//! Chat history and summary endpoints.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::db::ChatMessage;
use crate::error::ServiceError;
use crate::service::SummaryResult;

/// Chat history query parameters
#[derive(Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub user_id: String,
    pub skill: Option<String>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub data: Vec<ChatMessage>,
}

/// GET /api/chat/history
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ServiceError> {
    if params.user_id.trim().is_empty() {
        return Err(ServiceError::InvalidRequest {
            message: "missing user_id".to_string(),
        });
    }

    let data = state
        .service
        .get_history(&params.user_id, params.skill.as_deref())?;
    Ok(Json(HistoryResponse { data }))
}

/// Summary request body
#[derive(Deserialize)]
pub struct SummarizeRequest {
    pub content: String,
    pub user_id: String,
    pub skill: String,
}

/// POST /api/chat/summarize
pub async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    request: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummaryResult>, ServiceError> {
    let Json(request) = request.map_err(|e| ServiceError::InvalidRequest {
        message: e.body_text(),
    })?;
    if request.content.trim().is_empty() {
        return Err(ServiceError::InvalidRequest {
            message: "content must not be empty".to_string(),
        });
    }

    let result = state
        .service
        .get_or_create_summary(&request.user_id, &request.skill, &request.content)
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::json;

    use crate::api::router;
    use crate::api::test_support::{get, send};
    use crate::db::Exchange;
    use crate::service::testing::{FakeAi, Harness, HarnessOptions, USER_ID};

    use super::*;

    fn post_json(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat/summarize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_history_with_skill_filter() {
        let h = Harness::new();
        for skill in ["serve", "smash"] {
            let exchange = Exchange {
                skill,
                conversation_id: "conv-0",
                user_text: "question",
                assistant_text: "answer",
            };
            h.db.append_exchange(USER_ID, &exchange).unwrap();
        }
        let app = router(Arc::new(h.service), None);

        let (status, body) = send(app.clone(), get("/api/chat/history?user_id=U1234")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 4);

        let (_, body) = send(app, get("/api/chat/history?user_id=U1234&skill=Smash")).await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["skill"], "smash");
    }

    #[tokio::test]
    async fn test_history_requires_user_id() {
        let h = Harness::new();
        let app = router(Arc::new(h.service), None);

        for uri in ["/api/chat/history", "/api/chat/history?user_id="] {
            let (status, body) = send(app.clone(), get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "invalid_request");
            assert_eq!(body["message"], "Invalid request: missing user_id");
        }
    }

    #[tokio::test]
    async fn test_summarize_reports_cache() {
        let h = Harness::new();
        let app = router(Arc::new(h.service), None);
        let body = json!({ "content": "transcript", "user_id": USER_ID, "skill": "clear" });

        let (status, first) = send(app.clone(), post_json(body.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["cached"], false);

        let (_, second) = send(app, post_json(body.to_string())).await;
        assert_eq!(second["cached"], true);
        assert_eq!(second["summary"], first["summary"]);
    }

    #[tokio::test]
    async fn test_summarize_invalid_body() {
        let h = Harness::new();
        let app = router(Arc::new(h.service), None);

        let (status, body) = send(app.clone(), post_json(r#"{"content": 3}"#.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_request");

        let empty = json!({ "content": " ", "user_id": USER_ID, "skill": "clear" });
        let (status, _) = send(app, post_json(empty.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_summarizer_failure_is_bad_gateway() {
        let h = Harness::with(HarnessOptions {
            ai: FakeAi {
                fail: true,
                ..FakeAi::default()
            },
            ..HarnessOptions::default()
        });
        let app = router(Arc::new(h.service), None);
        let body = json!({ "content": "transcript", "user_id": USER_ID, "skill": "clear" });

        let (status, _) = send(app, post_json(body.to_string())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
