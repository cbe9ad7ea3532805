//! Runtime for chat event processing
//!
//! Every chat gets its own actor task so its events are handled strictly in
//! arrival order while different chats run in parallel. Idle actors retire
//! and are respawned on the next event.

mod commands;
pub mod conversations;
mod dispatch;
mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use conversations::ConversationStore;
pub use executor::Dispatcher;
pub use traits::*;

use crate::db::ChatId;
use crate::transport::telegram::TelegramClient;
use crate::transport::InboundEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = RuntimeManager<DatabaseStorage, TelegramClient>;

/// How often idle wizards are swept
pub const WIZARD_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

type Registry = Arc<RwLock<HashMap<ChatId, ChatHandle>>>;

/// Handle to a running chat actor
struct ChatHandle {
    event_tx: mpsc::UnboundedSender<InboundEvent>,
}

/// Manager for all chat runtimes
pub struct RuntimeManager<S, O>
where
    S: TaskStore + 'static,
    O: Outbox + 'static,
{
    dispatcher: Arc<Dispatcher<S, O>>,
    runtimes: Registry,
    actor_idle: Duration,
}

impl<S, O> RuntimeManager<S, O>
where
    S: TaskStore + 'static,
    O: Outbox + 'static,
{
    pub fn new(dispatcher: Dispatcher<S, O>, actor_idle: Duration) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            runtimes: Arc::new(RwLock::new(HashMap::new())),
            actor_idle,
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn dispatcher(&self) -> &Arc<Dispatcher<S, O>> {
        &self.dispatcher
    }

    /// Number of live chat actors
    #[allow(dead_code)] // Used in tests
    pub async fn active_runtimes(&self) -> usize {
        self.runtimes.read().await.len()
    }

    /// Queue an event on its chat's actor, spawning the actor if needed
    pub async fn submit(&self, event: InboundEvent) {
        let chat_id = event.chat_id;

        // Fast path: actor exists and is alive
        let event = {
            let runtimes = self.runtimes.read().await;
            match runtimes.get(&chat_id) {
                Some(handle) => match handle.event_tx.send(event) {
                    Ok(()) => return,
                    Err(mpsc::error::SendError(event)) => event,
                },
                None => event,
            }
        };

        let mut runtimes = self.runtimes.write().await;
        // Another submit may have spawned the actor meanwhile
        let event = match runtimes.get(&chat_id) {
            Some(handle) => match handle.event_tx.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let runtime = ChatRuntime {
            chat_id,
            dispatcher: Arc::clone(&self.dispatcher),
            runtimes: Arc::clone(&self.runtimes),
            event_rx,
            idle: self.actor_idle,
        };
        if event_tx.send(event).is_err() {
            return;
        }
        runtimes.insert(chat_id, ChatHandle { event_tx });
        tokio::spawn(runtime.run());
    }

    /// Every `interval`, drop wizards idle for at least `max_idle`
    pub fn spawn_wizard_sweeper(
        &self,
        interval: Duration,
        max_idle: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let conversations = Arc::clone(self.dispatcher.conversations());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {
                        let expired = conversations.expire_idle(max_idle, Instant::now());
                        if !expired.is_empty() {
                            tracing::info!(count = expired.len(), "Expired idle wizards");
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl<S, O> EventSink for RuntimeManager<S, O>
where
    S: TaskStore + 'static,
    O: Outbox + 'static,
{
    async fn deliver(&self, event: InboundEvent) {
        self.submit(event).await;
    }
}

/// Actor processing one chat's events in order
struct ChatRuntime<S, O>
where
    S: TaskStore + 'static,
    O: Outbox + 'static,
{
    chat_id: ChatId,
    dispatcher: Arc<Dispatcher<S, O>>,
    runtimes: Registry,
    event_rx: mpsc::UnboundedReceiver<InboundEvent>,
    idle: Duration,
}

impl<S, O> ChatRuntime<S, O>
where
    S: TaskStore + 'static,
    O: Outbox + 'static,
{
    async fn run(mut self) {
        tracing::debug!(chat_id = %self.chat_id, "Starting chat runtime");

        loop {
            match tokio::time::timeout(self.idle, self.event_rx.recv()).await {
                Ok(Some(event)) => self.dispatcher.dispatch(event).await,
                Ok(None) => break,
                Err(_) => {
                    // Senders hold the read lock, so nothing can be queued
                    // while we decide to retire
                    let mut runtimes = self.runtimes.write().await;
                    if let Ok(event) = self.event_rx.try_recv() {
                        drop(runtimes);
                        self.dispatcher.dispatch(event).await;
                    } else {
                        runtimes.remove(&self.chat_id);
                        break;
                    }
                }
            }
        }

        tracing::debug!(chat_id = %self.chat_id, "Chat runtime stopped");
    }
}
