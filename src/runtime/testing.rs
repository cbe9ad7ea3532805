//! Mock implementations for testing
//!
//! These mocks enable dispatcher and runtime tests without real I/O.

use super::traits::*;
use crate::db::{ChatId, DbResult, StoreError, TaskField, TaskItem};
use crate::transport::{MessageId, TransportError};
use crate::ui::Outgoing;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// In-memory TaskStore
// ============================================================================

/// TaskStore with the same semantics as the SQLite one
#[derive(Default)]
pub struct InMemoryTaskStore {
    chats: Mutex<BTreeMap<ChatId, Vec<TaskItem>>>,
    /// Artificial latency for interleaving tests
    delay: Option<Duration>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Seed a task without going through the trait
    pub fn insert(&self, chat_id: ChatId, task: TaskItem) {
        self.chats
            .lock()
            .unwrap()
            .entry(chat_id)
            .or_default()
            .push(task);
    }

    pub fn tasks(&self, chat_id: ChatId) -> Vec<TaskItem> {
        self.chats
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn add_task(&self, chat_id: ChatId, task: &TaskItem) -> DbResult<()> {
        self.pause().await;
        let mut chats = self.chats.lock().unwrap();
        let tasks = chats.entry(chat_id).or_default();
        if tasks.iter().any(|t| t.name == task.name) {
            return Err(StoreError::Duplicate(task.name.clone()));
        }
        tasks.push(task.clone());
        Ok(())
    }

    async fn get_tasks(&self, chat_id: ChatId) -> DbResult<Vec<TaskItem>> {
        self.pause().await;
        Ok(self.tasks(chat_id))
    }

    async fn get_task(&self, chat_id: ChatId, name: &str) -> DbResult<TaskItem> {
        self.pause().await;
        self.tasks(chat_id)
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| StoreError::TaskNotFound(name.to_string()))
    }

    async fn remove_task(&self, chat_id: ChatId, task: &TaskItem) -> DbResult<()> {
        self.pause().await;
        let mut chats = self.chats.lock().unwrap();
        let tasks = chats.entry(chat_id).or_default();
        let before = tasks.len();
        tasks.retain(|t| t.name != task.name);
        if tasks.len() == before {
            return Err(StoreError::TaskNotFound(task.name.clone()));
        }
        Ok(())
    }

    async fn remove_all_tasks(&self, chat_id: ChatId) -> DbResult<usize> {
        self.pause().await;
        let mut chats = self.chats.lock().unwrap();
        Ok(chats.get_mut(&chat_id).map_or(0, |tasks| tasks.drain(..).count()))
    }

    async fn update_task_details(
        &self,
        chat_id: ChatId,
        name: &str,
        field: TaskField,
        value: &str,
    ) -> DbResult<()> {
        self.pause().await;
        let mut chats = self.chats.lock().unwrap();
        let task = chats
            .get_mut(&chat_id)
            .and_then(|tasks| tasks.iter_mut().find(|t| t.name == name))
            .ok_or_else(|| StoreError::TaskNotFound(name.to_string()))?;
        match field {
            TaskField::Description => task.description = Some(value.to_string()),
            TaskField::Comments => task.comments.push(value.to_string()),
            TaskField::Links => task.links.push(value.to_string()),
        }
        Ok(())
    }

    async fn get_all_chat_ids(&self) -> DbResult<BTreeSet<ChatId>> {
        Ok(self.chats.lock().unwrap().keys().copied().collect())
    }
}

// ============================================================================
// Failing TaskStore
// ============================================================================

/// TaskStore whose every call fails
#[derive(Default)]
pub struct FailingTaskStore;

impl FailingTaskStore {
    fn err() -> StoreError {
        StoreError::Unavailable("store is down".to_string())
    }
}

#[async_trait]
impl TaskStore for FailingTaskStore {
    async fn add_task(&self, _chat_id: ChatId, _task: &TaskItem) -> DbResult<()> {
        Err(Self::err())
    }

    async fn get_tasks(&self, _chat_id: ChatId) -> DbResult<Vec<TaskItem>> {
        Err(Self::err())
    }

    async fn get_task(&self, _chat_id: ChatId, _name: &str) -> DbResult<TaskItem> {
        Err(Self::err())
    }

    async fn remove_task(&self, _chat_id: ChatId, _task: &TaskItem) -> DbResult<()> {
        Err(Self::err())
    }

    async fn remove_all_tasks(&self, _chat_id: ChatId) -> DbResult<usize> {
        Err(Self::err())
    }

    async fn update_task_details(
        &self,
        _chat_id: ChatId,
        _name: &str,
        _field: TaskField,
        _value: &str,
    ) -> DbResult<()> {
        Err(Self::err())
    }

    async fn get_all_chat_ids(&self) -> DbResult<BTreeSet<ChatId>> {
        Err(Self::err())
    }
}

// ============================================================================
// Recording Outbox
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxCall {
    Send {
        chat_id: ChatId,
        message_id: MessageId,
        message: Outgoing,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        message: Outgoing,
    },
    AnswerCallback {
        callback_id: String,
        text: Option<String>,
    },
    Download {
        file_id: String,
        dest: PathBuf,
    },
}

impl OutboxCall {
    /// Whether the call is visible in the chat (acks are not)
    pub fn is_chat_message(&self) -> bool {
        matches!(self, OutboxCall::Send { .. } | OutboxCall::Edit { .. })
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            OutboxCall::Send { chat_id, .. } | OutboxCall::Edit { chat_id, .. } => Some(*chat_id),
            OutboxCall::AnswerCallback { .. } | OutboxCall::Download { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            OutboxCall::Send { message, .. } | OutboxCall::Edit { message, .. } => {
                Some(&message.text)
            }
            OutboxCall::AnswerCallback { .. } | OutboxCall::Download { .. } => None,
        }
    }
}

/// Outbox that records every call and hands out increasing message ids
pub struct RecordingOutbox {
    calls: Mutex<Vec<OutboxCall>>,
    next_id: AtomicI64,
    fail_downloads: AtomicBool,
}

impl Default for RecordingOutbox {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            fail_downloads: AtomicBool::new(false),
        }
    }
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_downloads(&self) {
        self.fail_downloads.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<OutboxCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls visible in `chat_id`
    pub fn chat_calls(&self, chat_id: ChatId) -> Vec<OutboxCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.chat_id() == Some(chat_id))
            .collect()
    }

    /// Text of the last message sent or edited in `chat_id`
    pub fn last_text(&self, chat_id: ChatId) -> Option<String> {
        self.chat_calls(chat_id)
            .last()
            .and_then(|c| c.text().map(str::to_string))
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn send(&self, chat_id: ChatId, message: Outgoing) -> Result<MessageId, TransportError> {
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.calls.lock().unwrap().push(OutboxCall::Send {
            chat_id,
            message_id,
            message,
        });
        Ok(message_id)
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: Outgoing,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(OutboxCall::Edit {
            chat_id,
            message_id,
            message,
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(OutboxCall::AnswerCallback {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(OutboxCall::Download {
            file_id: file_id.to_string(),
            dest: dest.to_path_buf(),
        });
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                method: "getFile",
                description: "file is too big".to_string(),
            });
        }
        Ok(())
    }
}
