//! Comercial bot server.
//!
//! Wires config, the Redash directory, the NocoDB registry and the Telegram
//! adapter into the conversation engine, and mounts the HTTP routes.

use crate::config::ComercialConfig;
use crate::dialog::DialogStore;
use crate::engine::{ConversationEngine, EngineSettings};
use crate::gateway::Gateway;
use crate::resolver::AvailabilityResolver;
use crate::routes;
use crate::validation::{DocumentType, validate_document};
use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use ce_channels::{ChannelAdapter, OutboundMessage, TelegramAdapter};
use ce_data::{
    DatasetKind, DirectoryCache, DirectoryGateway, NocoDbRegistry, RedashDirectory, RedashQuery,
    RegistryFields, RegistryGateway, RegistryTables, SlotPolicy,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub config: ComercialConfig,
    pub started_at: Instant,
    pub gateway: Gateway,
    pub resolver: AvailabilityResolver,
    pub telegram: Arc<TelegramAdapter>,
    pub registry: Arc<dyn RegistryGateway>,
}

impl AppState {
    pub fn active_dialogs(&self) -> usize {
        self.gateway.engine().dialogs().len()
    }
}

/// Remote collaborators. `channel` is where replies go; in production it is
/// the same Telegram adapter.
pub struct Backends {
    pub telegram: Arc<TelegramAdapter>,
    pub channel: Arc<dyn ChannelAdapter>,
    pub directory: Arc<dyn DirectoryGateway>,
    pub registry: Arc<dyn RegistryGateway>,
}

fn telegram_adapter(cfg: &ComercialConfig) -> Result<TelegramAdapter> {
    Ok(TelegramAdapter::new(
        &cfg.telegram.bot_token,
        Duration::from_secs(cfg.telegram.send_timeout_seconds),
    )?
    .with_max_message_length(cfg.telegram.max_message_length)
    .with_webhook_timeout(Duration::from_secs(cfg.telegram.webhook_timeout_seconds)))
}

pub fn connect_backends(cfg: &ComercialConfig) -> Result<Backends> {
    let telegram = Arc::new(telegram_adapter(cfg)?);
    let directory = RedashDirectory::new(
        &cfg.directory.base_url,
        RedashQuery {
            query_id: cfg.directory.primary.query_id.clone(),
            api_key: cfg.directory.primary.api_key.clone(),
        },
        RedashQuery {
            query_id: cfg.directory.unavailable.query_id.clone(),
            api_key: cfg.directory.unavailable.api_key.clone(),
        },
        Duration::from_secs(cfg.directory.timeout_seconds),
    )?;
    let registry = NocoDbRegistry::new(
        &cfg.registry.base_url,
        &cfg.registry.token,
        RegistryTables {
            agents: cfg.registry.agents_table.clone(),
            orders: cfg.registry.orders_table.clone(),
            assignments: cfg.registry.assignments_table.clone(),
        },
        RegistryFields {
            order_number: cfg.registry.order_number_field.clone(),
            assignment_agent: cfg.registry.assignment_agent_field.clone(),
        },
        Duration::from_secs(cfg.registry.timeout_seconds),
    )?;
    Ok(Backends {
        channel: telegram.clone(),
        telegram,
        directory: Arc::new(directory),
        registry: Arc::new(registry),
    })
}

fn directory_cache(cfg: &ComercialConfig, directory: Arc<dyn DirectoryGateway>) -> DirectoryCache {
    DirectoryCache::new(
        directory,
        SlotPolicy::new(cfg.directory.primary_ttl()),
        SlotPolicy::new(cfg.directory.unavailable_ttl()),
    )
}

pub fn build_state(cfg: ComercialConfig, backends: Backends) -> Result<Arc<AppState>> {
    let resolver = AvailabilityResolver::new(Arc::new(directory_cache(&cfg, backends.directory)));
    let engine = ConversationEngine::new(
        Arc::new(DialogStore::new()),
        resolver.clone(),
        backends.registry.clone(),
        EngineSettings {
            preregister_url: cfg.bot.preregister_url.clone(),
            max_results_shown: cfg.bot.max_results_shown,
        },
    )?;
    let gateway = Gateway::new(Arc::new(engine), backends.channel);
    Ok(Arc::new(AppState {
        config: cfg,
        started_at: Instant::now(),
        gateway,
        resolver,
        telegram: backends.telegram,
        registry: backends.registry,
    }))
}

/// The full HTTP stack. Every route shares the concurrency limit, trace span
/// and request id. All but the Telegram webhook are also bounded by the request timeout.
pub fn app(state: Arc<AppState>) -> Router {
    let max_in_flight = state.config.server.http_max_in_flight;
    let timeout = Duration::from_secs(state.config.server.http_timeout_seconds);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    routes::router()
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .merge(routes::telegram::webhook_router())
        .layer(Extension(state))
        .layer(GlobalConcurrencyLimitLayer::new(max_in_flight))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, cfg_path) = ComercialConfig::load_with_path(config_path).await?;
    let addr = cfg.bind_addr()?;
    tracing::info!(
        config_path = %cfg_path.display(),
        bind_addr = %addr,
        http_timeout_seconds = cfg.server.http_timeout_seconds,
        http_max_in_flight = cfg.server.http_max_in_flight,
        webhook_url = ?cfg.telegram.webhook_url(),
        register_webhook_on_start = cfg.telegram.register_webhook_on_start,
        directory_base_url = %cfg.directory.base_url,
        primary_query_id = %cfg.directory.primary.query_id,
        unavailable_query_id = %cfg.directory.unavailable.query_id,
        primary_ttl_seconds = cfg.directory.primary_ttl().as_secs(),
        unavailable_ttl_seconds = cfg.directory.unavailable_ttl().as_secs(),
        registry_base_url = %cfg.registry.base_url,
        preregister_url_configured = !cfg.bot.preregister_url.is_empty(),
        "server configuration loaded"
    );
    let listener = preflight_bind_listener(addr).await?;

    let backends = connect_backends(&cfg)?;
    let state = build_state(cfg, backends)?;

    if state.config.telegram.register_webhook_on_start {
        register_webhook(&state).await;
    }
    preload_directory(&state).await;

    let shutdown = CancellationToken::new();
    let router = app(state);
    tracing::info!(%addr, "comercial bot serving");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;
    tracing::info!("http server shutdown completed");
    Ok(())
}

/// Non-fatal: the bot keeps serving HTTP even if Telegram rejects the webhook.
async fn register_webhook(state: &AppState) {
    let Some(url) = state.config.telegram.webhook_url() else {
        tracing::warn!("telegram.webhook_base_url not set; skipping webhook registration");
        return;
    };
    match state.telegram.set_webhook(&url).await {
        Ok(()) => tracing::info!(webhook_url = %url, "telegram webhook registered"),
        Err(error) => tracing::warn!(%error, webhook_url = %url, "telegram webhook registration failed"),
    }
}

async fn preload_directory(state: &AppState) {
    match state.resolver.cache().dataset(DatasetKind::Primary).await {
        Ok(cached) => tracing::info!(
            rows = cached.dataset().len(),
            columns = cached.dataset().columns.len(),
            "primary directory preloaded"
        ),
        Err(error) => tracing::warn!(%error, "primary directory preload failed; will retry on first lookup"),
    }
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, path) = ComercialConfig::load_with_path(config_path).await?;
    tracing::info!(config_path = %path.display(), bind_addr = %cfg.bind_addr()?, "config ok");

    let backends = connect_backends(&cfg)?;
    let mut failures = 0usize;

    match backends.telegram.get_me().await {
        Ok(bot) => tracing::info!(bot_id = bot.id, username = ?bot.username, "telegram token ok"),
        Err(error) => {
            failures += 1;
            tracing::error!(%error, "telegram token check failed");
        }
    }
    for kind in [DatasetKind::Primary, DatasetKind::Unavailable] {
        match backends.directory.fetch(kind).await {
            Ok(dataset) => tracing::info!(
                dataset = %kind,
                rows = dataset.len(),
                columns = dataset.columns.len(),
                "directory dataset ok"
            ),
            Err(error) => {
                failures += 1;
                tracing::error!(dataset = %kind, %error, "directory dataset check failed");
            }
        }
    }
    match backends.registry.ping().await {
        Ok(()) => tracing::info!("registry reachable"),
        Err(error) => {
            failures += 1;
            tracing::error!(%error, "registry check failed");
        }
    }

    if failures > 0 {
        return Err(anyhow::anyhow!("doctor found {failures} failing check(s)"));
    }
    tracing::info!("doctor ok");
    Ok(())
}

pub async fn setup_webhook(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = ComercialConfig::load(config_path).await?;
    let url = cfg.telegram.webhook_url().ok_or_else(|| {
        anyhow::anyhow!("telegram.webhook_base_url is required (or set WEBHOOK_URL)")
    })?;
    telegram_adapter(&cfg)?.set_webhook(&url).await?;
    tracing::info!(webhook_url = %url, "telegram webhook registered");
    Ok(())
}

/// One resolver call, printed as JSON on stdout.
pub async fn search(config_path: Option<PathBuf>, doc_type: &str, number: &str) -> Result<()> {
    let doc_type = DocumentType::parse(doc_type)
        .ok_or_else(|| anyhow::anyhow!("document type must be NIT or CC, got {doc_type:?}"))?;
    validate_document(doc_type, number)?;

    let cfg = ComercialConfig::load(config_path).await?;
    let backends = connect_backends(&cfg)?;
    let resolver = AvailabilityResolver::new(Arc::new(directory_cache(&cfg, backends.directory)));
    let resolution = resolver.resolve(doc_type, number).await?;
    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}

pub async fn send_one_shot(config_path: Option<PathBuf>, chat_id: &str, message: &str) -> Result<()> {
    let cfg = ComercialConfig::load(config_path).await?;
    telegram_adapter(&cfg)?
        .send(chat_id, OutboundMessage::plain(message))
        .await?;
    tracing::info!(chat_id, "message sent");
    Ok(())
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
    shutdown.cancel();
}
