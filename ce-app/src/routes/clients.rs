use crate::server::AppState;
use crate::validation::{DocumentType, validate_document};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_SAMPLE_SIZE: usize = 10;
const MAX_SAMPLE_SIZE: usize = 100;

type JsonResponse = (StatusCode, Json<serde_json::Value>);

#[derive(Debug, Deserialize)]
struct ClientsQuery {
    limit: Option<usize>,
    #[serde(default)]
    include_sample: bool,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(rename = "type")]
    doc_type: Option<String>,
    number: Option<String>,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/api/clients", get(list_clients))
        .route("/api/clients/search", get(search_client))
        .route("/api/clients/summary", get(clients_summary))
}

fn error(status: StatusCode, message: impl Into<String>) -> JsonResponse {
    (
        status,
        Json(serde_json::json!({ "success": false, "error": message.into() })),
    )
}

#[tracing::instrument(level = "info", skip_all)]
async fn list_clients(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ClientsQuery>,
) -> JsonResponse {
    let sample_size = if query.include_sample {
        query.limit.unwrap_or(DEFAULT_SAMPLE_SIZE).min(MAX_SAMPLE_SIZE)
    } else {
        0
    };
    match state.resolver.summary(sample_size).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "total_clients": summary.total_clients,
                "total_columns": summary.total_columns,
                "cached": summary.cached,
                "freshness": summary.freshness,
                "fetched_at": summary.fetched_at,
                "columns": summary.columns,
                "sample": summary.sample,
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "client listing failed");
            error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn search_client(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> JsonResponse {
    let Some(doc_type) = query.doc_type.as_deref().and_then(DocumentType::parse) else {
        return error(StatusCode::BAD_REQUEST, "type must be NIT or CC");
    };
    let Some(number) = query.number.as_deref() else {
        return error(StatusCode::BAD_REQUEST, "number is required");
    };
    if let Err(e) = validate_document(doc_type, number) {
        return error(StatusCode::BAD_REQUEST, e.message());
    }

    match state.resolver.resolve(doc_type, number).await {
        Ok(resolution) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "found": resolution.found(),
                "unavailable": resolution.unavailable(),
                "resolution": resolution,
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "client search failed");
            error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn clients_summary(Extension(state): Extension<Arc<AppState>>) -> JsonResponse {
    let summary = state.resolver.summary(0).await;
    let cache = state.resolver.cache().status().await;
    match summary {
        Ok(summary) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "total_clients": summary.total_clients,
                "total_columns": summary.total_columns,
                "cached": summary.cached,
                "fetched_at": summary.fetched_at,
                "cache": cache,
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "client summary failed");
            error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}
