//! Taskbot - Telegram task manager
//!
//! A chat bot that collects tasks through a step-by-step wizard, keeps them
//! per chat in `SQLite` and reminds chats of upcoming deadlines.

mod calendar;
mod callback;
mod config;
mod db;
mod notifier;
mod runtime;
mod state_machine;
mod transport;
mod ui;

use config::BotConfig;
use db::Database;
use notifier::Notifier;
use runtime::{
    ConversationStore, DatabaseStorage, Dispatcher, EventSink, ProductionRuntime,
    WIZARD_SWEEP_INTERVAL,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use transport::telegram::{run_polling, TelegramClient};
use transport::webhook::create_router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskbot=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;
    tracing::debug!(?config, "Loaded configuration");

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let store = Arc::new(DatabaseStorage::new(Database::open(&config.db_path)?));
    let client = TelegramClient::new(&config.api_base_url, &config.bot_token)?;
    let outbox = Arc::new(client.clone());

    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&outbox),
        Arc::new(ConversationStore::new()),
    )
    .with_upload_dir(config.upload_dir.clone());
    let runtime = Arc::new(ProductionRuntime::new(dispatcher, config.actor_idle));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
            }
            cancel.cancel();
        });
    }

    let mut background = vec![runtime.spawn_wizard_sweeper(
        WIZARD_SWEEP_INTERVAL,
        config.wizard_idle,
        cancel.clone(),
    )];
    match config.notify_interval {
        Some(interval) => background.push(
            Notifier::new(Arc::clone(&store), Arc::clone(&outbox)).spawn(interval, cancel.clone()),
        ),
        None => tracing::info!("Deadline reminders disabled"),
    }

    let sink: Arc<dyn EventSink> = runtime;
    if let Some(addr) = config.webhook_addr {
        let app = create_router(sink, config.webhook_secret.clone()).layer(TraceLayer::new_for_http());

        tracing::info!("Taskbot webhook listening on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .await?;
        cancel.cancel();
    } else {
        run_polling(client, sink, cancel.clone()).await;
    }

    for handle in background {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Background task ended abnormally");
        }
    }

    tracing::info!("Taskbot stopped");
    Ok(())
}
