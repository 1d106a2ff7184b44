use crate::server::AppState;
use axum::routing::get;
use axum::{Extension, Json};
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/", get(get_home))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_home(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "comercial-ext",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "endpoints": [
            "GET /health",
            "POST /telegram-webhook",
            "POST /setup-webhook",
            "GET /api/clients",
            "GET /api/clients/search",
            "GET /api/clients/summary",
        ],
    }))
}
