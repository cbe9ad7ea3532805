//! Event executor
//!
//! Routes one inbound event, runs the pure transition for wizard events, and
//! performs the resulting effects against the task store and the outbox.

use super::commands::{self, FALLBACK, STORE_FAILURE};
use super::conversations::ConversationStore;
use super::dispatch::{route, Route};
use super::traits::{Outbox, TaskStore};
use crate::calendar::{self, YearMonth};
use crate::db::{ChatId, StoreError, TaskField};
use crate::state_machine::{transition, ChatContext, Effect, Event, Prompt, TransitionError};
use crate::transport::{InboundEvent, MessageId};
use crate::ui::{importance_keyboard, Outgoing};
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TASK_ADDED: &str = "Task added successfully.";
pub const DOCUMENT_ACCEPTED: &str = "Accepted, waiting for review.";
const EXPIRED_BUTTON: &str = "This button is no longer active.";
const MONTH_OUT_OF_RANGE: &str = "Can't navigate any further.";

/// Handles inbound events for every chat. One instance is shared by all
/// chat actors; per-chat ordering is the caller's responsibility.
pub struct Dispatcher<S, O>
where
    S: TaskStore + 'static,
    O: Outbox + 'static,
{
    store: Arc<S>,
    outbox: Arc<O>,
    conversations: Arc<ConversationStore>,
    upload_dir: Option<PathBuf>,
    /// Fixed date for tests; the local date otherwise
    today: Option<NaiveDate>,
}

impl<S, O> Dispatcher<S, O>
where
    S: TaskStore + 'static,
    O: Outbox + 'static,
{
    pub fn new(store: Arc<S>, outbox: Arc<O>, conversations: Arc<ConversationStore>) -> Self {
        Self {
            store,
            outbox,
            conversations,
            upload_dir: None,
            today: None,
        }
    }

    /// Save uploaded documents under `dir/<chat_id>/`
    #[must_use]
    pub fn with_upload_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.upload_dir = dir;
        self
    }

    #[allow(dead_code)] // Used in tests
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Handle one event to completion
    pub async fn dispatch(&self, event: InboundEvent) {
        let chat_id = event.chat_id;
        let has_wizard = self.conversations.contains(chat_id);
        tracing::debug!(chat_id = %chat_id, kind = event.kind.name(), has_wizard, "Inbound event");

        match route(&event, has_wizard) {
            Route::Wizard { event, callback_id } => {
                self.run_transition(chat_id, event, callback_id.as_deref())
                    .await;
            }
            Route::Command(command) => {
                let reply = commands::execute(&*self.store, chat_id, &command, self.today()).await;
                self.send(chat_id, reply).await;
            }
            Route::Ack { callback_id } => self.answer(&callback_id, None).await,
            Route::Malformed { callback_id, error } => {
                tracing::warn!(chat_id = %chat_id, error = %error, "Ignoring malformed callback");
                self.answer(&callback_id, None).await;
            }
            Route::Document { file_id, file_name } => {
                self.accept_document(chat_id, &file_id, file_name.as_deref())
                    .await;
            }
            Route::Dice { value } => {
                self.send(
                    chat_id,
                    Outgoing::text(format!("You threw dice with value: {value}")),
                )
                .await;
            }
            Route::Fallback => {
                self.send(chat_id, Outgoing::text(FALLBACK)).await;
            }
        }
    }

    async fn run_transition(&self, chat_id: ChatId, event: Event, callback_id: Option<&str>) {
        let ctx = ChatContext::new(chat_id, self.today());
        let event_name = event.name();

        // State is written before any effect awaits I/O
        let outcome = self
            .conversations
            .update(chat_id, |current| match transition(current, &ctx, event) {
                Ok(result) => (result.new_state, Ok(result.effects)),
                Err(e) => (current.cloned(), Err(e)),
            });

        let effects = match outcome {
            Ok(effects) => effects,
            Err(e) => {
                tracing::debug!(chat_id = %chat_id, event = event_name, error = %e, "Transition rejected");
                self.reject(chat_id, &e, callback_id).await;
                return;
            }
        };

        if let Some(id) = callback_id {
            self.answer(id, None).await;
        }
        for effect in effects {
            self.execute_effect(chat_id, effect).await;
        }
    }

    async fn reject(&self, chat_id: ChatId, error: &TransitionError, callback_id: Option<&str>) {
        let reply = match (error, callback_id) {
            // A button from a finished wizard: toast only
            (TransitionError::NoActiveWizard, Some(id)) => {
                self.answer(id, Some(EXPIRED_BUTTON)).await;
                return;
            }
            (TransitionError::NoActiveWizard, None) => Outgoing::text(FALLBACK),
            (TransitionError::Calendar(_), _) => Outgoing::text(MONTH_OUT_OF_RANGE),
            (TransitionError::Unexpected { .. }, _) => match error.hint() {
                Some(Prompt::DueDate) => {
                    if let Some(id) = callback_id {
                        self.answer(id, None).await;
                    }
                    self.resend_calendar(chat_id).await;
                    return;
                }
                Some(prompt) => prompt_message(&prompt),
                None => Outgoing::text(FALLBACK),
            },
        };
        if let Some(id) = callback_id {
            self.answer(id, None).await;
        }
        self.send(chat_id, reply).await;
    }

    async fn execute_effect(&self, chat_id: ChatId, effect: Effect) {
        match effect {
            Effect::Prompt(prompt) => {
                self.send(chat_id, prompt_message(&prompt)).await;
            }

            Effect::SendCalendar { month } => {
                if let Some(message_id) = self.send(chat_id, calendar_message(month)).await {
                    self.conversations
                        .record_calendar_message(chat_id, message_id);
                }
            }

            Effect::EditCalendar { message_id, month } => {
                self.edit(chat_id, message_id, calendar_message(month))
                    .await;
            }

            Effect::AskImportance => {
                self.send(chat_id, prompt_message(&Prompt::Importance))
                    .await;
            }

            Effect::CommitTask(task) => {
                let reply = match self.store.add_task(chat_id, &task).await {
                    Ok(()) => {
                        tracing::info!(chat_id = %chat_id, task = %task.name, "Task added");
                        TASK_ADDED.to_string()
                    }
                    Err(StoreError::Duplicate(name)) => {
                        format!("A task named '{name}' already exists.")
                    }
                    Err(e) => {
                        tracing::error!(chat_id = %chat_id, error = %e, "Failed to add task");
                        STORE_FAILURE.to_string()
                    }
                };
                self.send(chat_id, Outgoing::text(reply)).await;
            }

            Effect::WriteField {
                task_name,
                field,
                value,
            } => {
                let reply = match self
                    .store
                    .update_task_details(chat_id, &task_name, field, &value)
                    .await
                {
                    Ok(()) => field_updated(field, &task_name),
                    Err(StoreError::TaskNotFound(name)) => format!("Task '{name}' not found."),
                    Err(e) => {
                        tracing::error!(chat_id = %chat_id, field = %field, error = %e, "Failed to update task");
                        STORE_FAILURE.to_string()
                    }
                };
                self.send(chat_id, Outgoing::text(reply)).await;
            }
        }
    }

    async fn accept_document(&self, chat_id: ChatId, file_id: &str, file_name: Option<&str>) {
        self.send(chat_id, Outgoing::text(DOCUMENT_ACCEPTED)).await;

        let Some(dir) = &self.upload_dir else {
            return;
        };
        let name = file_name
            .and_then(safe_file_name)
            .unwrap_or_else(|| file_id.to_string());
        let dest = dir.join(chat_id.to_string()).join(name);

        match self.outbox.download(file_id, &dest).await {
            Ok(()) => tracing::info!(chat_id = %chat_id, path = %dest.display(), "Document saved"),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, file_id, error = %e, "Document download failed");
            }
        }
    }

    async fn send(&self, chat_id: ChatId, message: Outgoing) -> Option<MessageId> {
        match self.outbox.send(chat_id, message).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Failed to send message");
                None
            }
        }
    }

    async fn edit(&self, chat_id: ChatId, message_id: MessageId, message: Outgoing) {
        if let Err(e) = self.outbox.edit(chat_id, message_id, message).await {
            tracing::warn!(chat_id = %chat_id, message_id = %message_id, error = %e, "Failed to edit message");
        }
    }

    /// Send a fresh calendar at the wizard's current month and make it the
    /// one navigation applies to
    async fn resend_calendar(&self, chat_id: ChatId) {
        let month = self
            .conversations
            .get(chat_id)
            .and_then(|state| state.calendar)
            .map_or_else(|| YearMonth::of(self.today()), |view| view.month);
        if let Some(message_id) = self.send(chat_id, calendar_message(month)).await {
            self.conversations.move_calendar_message(chat_id, message_id);
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.outbox.answer_callback(callback_id, text).await {
            tracing::warn!(callback_id, error = %e, "Failed to answer callback");
        }
    }
}

fn prompt_message(prompt: &Prompt) -> Outgoing {
    let message = Outgoing::text(prompt.text());
    match prompt {
        Prompt::Importance | Prompt::InvalidImportance { .. } => {
            message.with_keyboard(importance_keyboard())
        }
        _ => message,
    }
}

fn calendar_message(month: YearMonth) -> Outgoing {
    Outgoing::text(Prompt::DueDate.text()).with_keyboard(calendar::generate(month).keyboard())
}

fn field_updated(field: TaskField, task_name: &str) -> String {
    match field {
        TaskField::Description => format!("Description of '{task_name}' updated."),
        TaskField::Comments => format!("Comment added to '{task_name}'."),
        TaskField::Links => format!("Link added to '{task_name}'."),
    }
}

/// Last path component of an uploaded file name, if usable
fn safe_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
}
