pub mod clients;
pub mod health;
pub mod home;
pub mod telegram;

use axum::Router;

/// Routes bounded by the HTTP request timeout. The Telegram webhook is
/// mounted separately, see `telegram::webhook_router`.
pub fn router() -> Router {
    Router::new()
        .merge(home::router())
        .merge(health::router())
        .merge(telegram::router())
        .merge(clients::router())
}
