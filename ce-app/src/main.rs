//! comercial-ext: Telegram assistant for the external sales force.

mod assignment;
mod commands;
mod config;
mod dialog;
mod engine;
mod gateway;
mod matcher;
mod replies;
mod resolver;
mod routes;
mod server;
mod validation;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(
    name = "comercial-ext",
    version,
    about = "Telegram assistant for external commercial agents"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, env = "COMERCIAL_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the webhook server (default).
    Serve,
    /// Validate config and check Telegram, Redash and NocoDB connectivity.
    Doctor,
    /// Register the configured webhook URL with Telegram.
    SetupWebhook,
    /// Run a client lookup against the live directory and print the result.
    Search {
        /// NIT or CC.
        doc_type: String,
        number: String,
    },
    /// One-shot send to a Telegram chat.
    Send { chat_id: String, message: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();
    let config_path = cli.config;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(config_path).await,
        Command::Doctor => server::doctor(config_path).await,
        Command::SetupWebhook => server::setup_webhook(config_path).await,
        Command::Search { doc_type, number } => {
            server::search(config_path, &doc_type, &number).await
        }
        Command::Send { chat_id, message } => {
            server::send_one_shot(config_path, &chat_id, &message).await
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new(
            "info,comercial_ext=debug,ce_app=debug,ce_channels=debug,ce_data=debug,tower_http=info",
        ),
    };
    let log_format = std::env::var("COMERCIAL_LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .to_ascii_lowercase();

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .pretty()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .compact()
                .init();
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported COMERCIAL_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    tracing::info!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_to_string(panic_info.payload());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
