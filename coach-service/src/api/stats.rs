//! Grade statistics endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::AppState;
use crate::error::ServiceError;
use crate::stats::DateStats;

#[derive(Deserialize)]
pub struct StatsParams {
    #[serde(default)]
    pub skill: String,
}

/// GET /api/db/stats/users/{id}
pub async fn user_stats_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<Json<DateStats>, ServiceError> {
    Ok(Json(state.service.stats_for_user(&id, &params.skill)?))
}

/// GET /api/db/stats/class
pub async fn class_stats_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsParams>,
) -> Result<Json<DateStats>, ServiceError> {
    Ok(Json(state.service.stats_for_class(&params.skill)?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::api::router;
    use crate::api::test_support::{get, send};
    use crate::db::{GradingOutcome, Skill, Work};
    use crate::service::testing::{Harness, USER_ID};

    use super::*;

    async fn harness_with_work(key: &str, grade: f64) -> Harness {
        let h = Harness::new();
        let mut user = h.service.ensure_user(USER_ID).await.unwrap();
        user.portfolio.get_mut(Skill::Serve).insert(
            key.to_string(),
            Work {
                date_time: key.to_string(),
                thumbnail: String::new(),
                video: String::new(),
                comparison_video: String::new(),
                reflection: String::new(),
                preview_note: String::new(),
                ai_note: String::new(),
                grading_outcome: GradingOutcome {
                    grading_details: Vec::new(),
                    total_grade: grade,
                },
            },
        );
        h.db.put_user(&user).unwrap();
        h
    }

    #[tokio::test]
    async fn test_user_and_class_stats() {
        let h = harness_with_work("2025-04-02-08-15", 55.0).await;
        let app = router(Arc::new(h.service), None);

        let (status, body) = send(app.clone(), get("/api/db/stats/users/U1234?skill=serve")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["2025-04-02"]["avg"], 55.0);
        assert_eq!(body["2025-04-02"]["std"], 0.0);

        let (status, body) = send(app.clone(), get("/api/db/stats/class?skill=serve")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["2025-04-02"]["max"], 55.0);

        let (status, _) = send(app, get("/api/db/stats/users/nobody?skill=serve")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let h = harness_with_work("not-a-date", 55.0).await;
        let app = router(Arc::new(h.service), None);

        let (status, body) = send(app.clone(), get("/api/db/stats/class?skill=serve")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "failed to parse the work's key as a date string: not-a-date"
        );

        let (status, _) = send(app, get("/api/db/stats/class")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
