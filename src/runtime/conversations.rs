//! Per-chat wizard state
//!
//! The only shared mutable state in the core. Every operation takes a short
//! synchronous lock; callers never hold it across an `.await`.

use crate::db::ChatId;
use crate::state_machine::{ConversationState, WizardStep};
use crate::transport::MessageId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ConversationStore {
    states: Mutex<HashMap<ChatId, ConversationState>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, ConversationState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, chat_id: ChatId) -> Option<ConversationState> {
        self.lock().get(&chat_id).cloned()
    }

    pub fn contains(&self, chat_id: ChatId) -> bool {
        self.lock().contains_key(&chat_id)
    }

    #[allow(dead_code)] // Used in tests
    pub fn remove(&self, chat_id: ChatId) -> Option<ConversationState> {
        self.lock().remove(&chat_id)
    }

    /// Atomic read-modify-write of one chat's state.
    ///
    /// `f` sees the current state and returns the replacement (`None` clears
    /// it) plus a value handed back to the caller. Written states are stamped
    /// with the current time.
    pub fn update<R>(
        &self,
        chat_id: ChatId,
        f: impl FnOnce(Option<&ConversationState>) -> (Option<ConversationState>, R),
    ) -> R {
        let mut states = self.lock();
        let (next, out) = f(states.get(&chat_id));
        match next {
            Some(mut state) => {
                state.chat_id = chat_id;
                state.touched_at = Instant::now();
                states.insert(chat_id, state);
            }
            None => {
                states.remove(&chat_id);
            }
        }
        out
    }

    /// Tag the wizard's pending calendar with the message that displays it.
    ///
    /// Returns false when the chat moved on before the send completed.
    pub fn record_calendar_message(&self, chat_id: ChatId, message_id: MessageId) -> bool {
        let mut states = self.lock();
        let Some(state) = states.get_mut(&chat_id) else {
            return false;
        };
        if !matches!(state.step, WizardStep::AwaitingDueDate { .. }) {
            return false;
        }
        match state.calendar.as_mut() {
            Some(view) if view.message_id.is_none() => {
                view.message_id = Some(message_id);
                true
            }
            _ => false,
        }
    }

    /// Point the wizard's calendar at a newly sent message, keeping its month.
    ///
    /// Returns false when no date is being picked.
    pub fn move_calendar_message(&self, chat_id: ChatId, message_id: MessageId) -> bool {
        let mut states = self.lock();
        let Some(state) = states.get_mut(&chat_id) else {
            return false;
        };
        if !matches!(state.step, WizardStep::AwaitingDueDate { .. }) {
            return false;
        }
        match state.calendar.as_mut() {
            Some(view) => {
                view.message_id = Some(message_id);
                true
            }
            None => false,
        }
    }

    /// Drop wizards untouched for at least `max_idle`; returns their chats
    pub fn expire_idle(&self, max_idle: Duration, now: Instant) -> Vec<ChatId> {
        let mut states = self.lock();
        let expired: Vec<ChatId> = states
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.touched_at) >= max_idle)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            states.remove(id);
        }
        expired
    }

    #[allow(dead_code)] // Used in tests
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
