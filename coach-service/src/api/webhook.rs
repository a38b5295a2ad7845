//! LINE webhook endpoint.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;
use tracing::{debug, info};

use super::AppState;
use crate::error::{PlatformError, ServiceError};
use crate::line::{parse_webhook, verify_signature};

const SIGNATURE_HEADER: &str = "x-line-signature";

/// POST /callback - verify, acknowledge, then process events in the background
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(PlatformError::InvalidSignature)?;
    verify_signature(&state.service.config.line.channel_secret, &body, signature)?;

    let events = parse_webhook(&body)?;
    if events.is_empty() {
        debug!("Webhook delivery without events");
        return Ok(StatusCode::OK);
    }
    info!(count = events.len(), "Webhook events received");

    // Events of one delivery are handled in order, after the acknowledgement
    let service = Arc::clone(&state.service);
    tokio::spawn(async move {
        for event in &events {
            service.handle_event(event).await;
        }
    });

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use crate::api::router;
    use crate::api::test_support::send;
    use crate::service::testing::{Harness, USER_ID};

    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }

    fn callback(body: &'static str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/callback");
        if let Some(signature) = signature {
            builder = builder.header("X-Line-Signature", signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_bad_signature() {
        let h = Harness::new();
        let app = router(Arc::new(h.service), None);

        let (status, body) = send(app.clone(), callback(r#"{"events":[]}"#, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_signature");

        let (status, _) = send(
            app,
            callback(r#"{"events":[]}"#, Some(sign("wrong", b"{\"events\":[]}"))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_accepts_signed_delivery_and_processes_events() {
        let h = Harness::new();
        let secret = h.service.config.line.channel_secret.clone();
        let db = Arc::clone(&h.db);
        let platform = Arc::clone(&h.platform);
        let app = router(Arc::new(h.service), None);

        let body = r#"{"events":[{"type":"follow","replyToken":"t1","source":{"type":"user","userId":"U1234"}}]}"#;
        let (status, _) = send(app, callback(body, Some(sign(&secret, body.as_bytes())))).await;
        assert_eq!(status, StatusCode::OK);

        for _ in 0..50 {
            if !platform.replied().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(platform.replied().len(), 1);
        assert!(db.get_user(USER_ID).unwrap().is_some());
    }
}
