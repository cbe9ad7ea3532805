//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the dispatcher with mock implementations.

use crate::db::{ChatId, Database, DbResult, StoreError, TaskField, TaskItem};
use crate::transport::{InboundEvent, MessageId, TransportError};
use crate::ui::Outgoing;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Persistent task storage keyed by chat
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Register the chat if unknown, then insert the task
    async fn add_task(&self, chat_id: ChatId, task: &TaskItem) -> DbResult<()>;

    /// All tasks of a chat, in no particular order
    async fn get_tasks(&self, chat_id: ChatId) -> DbResult<Vec<TaskItem>>;

    async fn get_task(&self, chat_id: ChatId, name: &str) -> DbResult<TaskItem>;

    async fn remove_task(&self, chat_id: ChatId, task: &TaskItem) -> DbResult<()>;

    /// Returns how many tasks were removed
    async fn remove_all_tasks(&self, chat_id: ChatId) -> DbResult<usize>;

    /// `description` replaces, `comments` and `links` append
    async fn update_task_details(
        &self,
        chat_id: ChatId,
        name: &str,
        field: TaskField,
        value: &str,
    ) -> DbResult<()>;

    async fn get_all_chat_ids(&self) -> DbResult<BTreeSet<ChatId>>;
}

/// Outbound side of the chat transport
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send(&self, chat_id: ChatId, message: Outgoing) -> Result<MessageId, TransportError>;

    /// Replace text and keyboard of an existing message
    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: Outgoing,
    ) -> Result<(), TransportError>;

    /// Acknowledge a button press, optionally with a toast
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Fetch an uploaded file into `dest`
    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), TransportError>;
}

/// Receiver for inbound events from the transport
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: InboundEvent);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: TaskStore + ?Sized> TaskStore for Arc<T> {
    async fn add_task(&self, chat_id: ChatId, task: &TaskItem) -> DbResult<()> {
        (**self).add_task(chat_id, task).await
    }

    async fn get_tasks(&self, chat_id: ChatId) -> DbResult<Vec<TaskItem>> {
        (**self).get_tasks(chat_id).await
    }

    async fn get_task(&self, chat_id: ChatId, name: &str) -> DbResult<TaskItem> {
        (**self).get_task(chat_id, name).await
    }

    async fn remove_task(&self, chat_id: ChatId, task: &TaskItem) -> DbResult<()> {
        (**self).remove_task(chat_id, task).await
    }

    async fn remove_all_tasks(&self, chat_id: ChatId) -> DbResult<usize> {
        (**self).remove_all_tasks(chat_id).await
    }

    async fn update_task_details(
        &self,
        chat_id: ChatId,
        name: &str,
        field: TaskField,
        value: &str,
    ) -> DbResult<()> {
        (**self)
            .update_task_details(chat_id, name, field, value)
            .await
    }

    async fn get_all_chat_ids(&self) -> DbResult<BTreeSet<ChatId>> {
        (**self).get_all_chat_ids().await
    }
}

#[async_trait]
impl<T: Outbox + ?Sized> Outbox for Arc<T> {
    async fn send(&self, chat_id: ChatId, message: Outgoing) -> Result<MessageId, TransportError> {
        (**self).send(chat_id, message).await
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: Outgoing,
    ) -> Result<(), TransportError> {
        (**self).edit(chat_id, message_id, message).await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id, text).await
    }

    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), TransportError> {
        (**self).download(file_id, dest).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as TaskStore
///
/// SQLite calls are blocking, so each one runs on the blocking pool.
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn blocking<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

#[async_trait]
impl TaskStore for DatabaseStorage {
    async fn add_task(&self, chat_id: ChatId, task: &TaskItem) -> DbResult<()> {
        let task = task.clone();
        self.blocking(move |db| db.add_task(chat_id, &task)).await
    }

    async fn get_tasks(&self, chat_id: ChatId) -> DbResult<Vec<TaskItem>> {
        self.blocking(move |db| db.get_tasks(chat_id)).await
    }

    async fn get_task(&self, chat_id: ChatId, name: &str) -> DbResult<TaskItem> {
        let name = name.to_string();
        self.blocking(move |db| db.get_task(chat_id, &name)).await
    }

    async fn remove_task(&self, chat_id: ChatId, task: &TaskItem) -> DbResult<()> {
        let name = task.name.clone();
        self.blocking(move |db| db.remove_task(chat_id, &name)).await
    }

    async fn remove_all_tasks(&self, chat_id: ChatId) -> DbResult<usize> {
        self.blocking(move |db| db.remove_all_tasks(chat_id)).await
    }

    async fn update_task_details(
        &self,
        chat_id: ChatId,
        name: &str,
        field: TaskField,
        value: &str,
    ) -> DbResult<()> {
        let name = name.to_string();
        let value = value.to_string();
        self.blocking(move |db| db.update_task_details(chat_id, &name, field, &value))
            .await
    }

    async fn get_all_chat_ids(&self) -> DbResult<BTreeSet<ChatId>> {
        self.blocking(Database::chat_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Importance;
    use chrono::NaiveDate;

    fn storage() -> DatabaseStorage {
        DatabaseStorage::new(Database::open_in_memory().unwrap())
    }

    fn task(name: &str) -> TaskItem {
        TaskItem::new(
            name,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            Importance::Blue,
        )
    }

    #[tokio::test]
    async fn test_database_storage_roundtrip() {
        let store = storage();
        store.add_task(ChatId(7), &task("Pay rent")).await.unwrap();

        let loaded = store.get_task(ChatId(7), "Pay rent").await.unwrap();
        assert_eq!(loaded, task("Pay rent"));
        assert_eq!(
            store.get_all_chat_ids().await.unwrap(),
            BTreeSet::from([ChatId(7)])
        );

        store.remove_task(ChatId(7), &loaded).await.unwrap();
        assert!(matches!(
            store.get_task(ChatId(7), "Pay rent").await,
            Err(StoreError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_database_storage_field_updates() {
        let store = storage();
        store.add_task(ChatId(1), &task("Trip")).await.unwrap();

        for value in ["first", "second"] {
            store
                .update_task_details(ChatId(1), "Trip", TaskField::Comments, value)
                .await
                .unwrap();
            store
                .update_task_details(ChatId(1), "Trip", TaskField::Description, value)
                .await
                .unwrap();
        }

        let loaded = store.get_task(ChatId(1), "Trip").await.unwrap();
        assert_eq!(loaded.comments, vec!["first", "second"]);
        assert_eq!(loaded.description.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_arc_dyn_store_delegates() {
        let store: Arc<dyn TaskStore> = Arc::new(storage());
        store.add_task(ChatId(2), &task("a")).await.unwrap();
        assert_eq!(store.remove_all_tasks(ChatId(2)).await.unwrap(), 1);
    }
}
