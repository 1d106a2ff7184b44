use crate::server::AppState;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json};
use ce_channels::parse_webhook_update;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/setup-webhook", post(setup_webhook))
}

/// Mounted outside the request timeout so the webhook always answers 200.
pub fn webhook_router() -> axum::Router {
    axum::Router::new().route("/telegram-webhook", post(telegram_webhook))
}

/// Always acknowledges with 200 so Telegram never retries a failing update.
#[tracing::instrument(level = "info", skip_all, fields(bytes = body.len()))]
async fn telegram_webhook(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    match parse_webhook_update(&body) {
        Ok(Some(inbound)) => {
            if let Err(error) = state.gateway.handle_inbound(inbound).await {
                tracing::error!(%error, "webhook update handling failed");
                return (StatusCode::OK, "Handled with error");
            }
        }
        Ok(None) => tracing::debug!("webhook update without text message ignored"),
        Err(error) => {
            tracing::warn!(%error, "malformed webhook update");
            return (StatusCode::OK, "Handled with error");
        }
    }
    (StatusCode::OK, "OK")
}

#[tracing::instrument(level = "info", skip_all)]
async fn setup_webhook(
    Extension(state): Extension<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(url) = state.config.telegram.webhook_url() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "success": false,
                "error": "telegram.webhook_base_url is not configured",
            })),
        );
    };
    match state.telegram.set_webhook(&url).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "webhook_url": url })),
        ),
        Err(error) => {
            tracing::error!(%error, webhook_url = %url, "webhook setup failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "success": false,
                    "webhook_url": url,
                    "error": error.to_string(),
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::assignment::tests::FixtureRegistry;
    use crate::gateway::tests::RecordingChannel;
    use crate::resolver::tests::{FixtureDirectory, clients};
    use crate::server::app;
    use crate::config::ComercialConfig;
    use crate::server::tests::{fixture_state, fixture_state_with};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ce_data::{Dataset, DatasetKind, DirectoryError, DirectoryGateway};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    /// Directory that answers only after `delay`.
    struct SlowDirectory {
        inner: FixtureDirectory,
        delay: Duration,
    }

    #[async_trait]
    impl DirectoryGateway for SlowDirectory {
        async fn fetch(&self, kind: DatasetKind) -> Result<Dataset, DirectoryError> {
            tokio::time::sleep(self.delay).await;
            self.inner.fetch(kind).await
        }
    }

    fn update(text: &str) -> Body {
        Body::from(
            serde_json::json!({
                "update_id": 1,
                "message": {
                    "message_id": 10,
                    "from": { "id": 42, "is_bot": false, "first_name": "Ana" },
                    "chat": { "id": 42, "type": "private" },
                    "date": 1_700_000_000,
                    "text": text,
                }
            })
            .to_string(),
        )
    }

    fn post(uri: &str, body: Body) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn webhook_replies_through_the_channel() {
        let channel = Arc::new(RecordingChannel::default());
        let state = fixture_state(
            Arc::new(FixtureDirectory::new(Some(clients(&[])), Some(clients(&[])))),
            Arc::new(FixtureRegistry::default()),
            channel.clone(),
        );
        let router = app(state.clone());

        let response = router
            .clone()
            .oneshot(post("/telegram-webhook", update("cliente")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.active_dialogs(), 1);

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "42");
        assert!(sent[0].1.content.contains("BÚSQUEDA DE CLIENTE"));
    }

    #[tokio::test]
    async fn malformed_or_textless_updates_are_still_acknowledged() {
        let channel = Arc::new(RecordingChannel::default());
        let state = fixture_state(
            Arc::new(FixtureDirectory::new(None, None)),
            Arc::new(FixtureRegistry::default()),
            channel.clone(),
        );
        let router = app(state);

        for body in [
            Body::from("not json"),
            Body::from(r#"{"update_id": 2}"#),
            Body::from(r#"{"update_id": 3, "message": {"message_id": 1, "chat": {"id": 5}}}"#),
        ] {
            let response = router
                .clone()
                .oneshot(post("/telegram-webhook", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn setup_webhook_requires_a_base_url() {
        let state = fixture_state(
            Arc::new(FixtureDirectory::new(None, None)),
            Arc::new(FixtureRegistry::default()),
            Arc::new(RecordingChannel::default()),
        );
        let response = app(state)
            .oneshot(post("/setup-webhook", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn slow_state(channel: Arc<RecordingChannel>) -> Arc<crate::server::AppState> {
        let mut cfg = ComercialConfig::default();
        cfg.server.http_timeout_seconds = 1;
        fixture_state_with(
            cfg,
            Arc::new(SlowDirectory {
                inner: FixtureDirectory::new(
                    Some(clients(&[("12345678", "Ana Cliente")])),
                    Some(clients(&[])),
                ),
                delay: Duration::from_secs(3),
            }),
            Arc::new(FixtureRegistry::default()),
            channel,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookups_still_get_a_reply_and_a_200() {
        let channel = Arc::new(RecordingChannel::default());
        let state = slow_state(channel.clone());
        let router = app(state.clone());

        for text in ["cliente", "CC", "12345678"] {
            let response = router
                .clone()
                .oneshot(post("/telegram-webhook", update(text)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "after {text:?}");
        }
        assert_eq!(state.active_dialogs(), 0);
        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert!(sent[2].1.content.contains("CLIENTE DISPONIBLE"));
    }

    #[tokio::test(start_paused = true)]
    async fn other_routes_keep_the_request_timeout() {
        let router = app(slow_state(Arc::new(RecordingChannel::default())));
        let response = router
            .oneshot(
                Request::get("/api/clients/search?type=CC&number=12345678")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
