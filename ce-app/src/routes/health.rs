use crate::server::AppState;
use axum::routing::get;
use axum::{Extension, Json};
use chrono::Utc;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/health", get(get_health))
}

/// Informational only: cache freshness plus reachability of Telegram and the
/// registry. Always 200.
#[tracing::instrument(level = "debug", skip_all)]
async fn get_health(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let (token_valid, registry, directory) = tokio::join!(
        state.telegram.validate_token(),
        state.registry.ping(),
        state.resolver.cache().status(),
    );
    let registry_error = registry.err().map(|e| e.to_string());
    let status = if token_valid && registry_error.is_none() {
        "healthy"
    } else {
        "degraded"
    };

    Json(serde_json::json!({
        "status": status,
        "checked_at": Utc::now(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "active_dialogs": state.active_dialogs(),
        "checks": {
            "telegram": {
                "token_valid": token_valid,
                "webhook_url": state.config.telegram.webhook_url(),
            },
            "directory": directory,
            "registry": {
                "reachable": registry_error.is_none(),
                "error": registry_error,
            },
        }
    }))
}
