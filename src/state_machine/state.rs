//! Conversation state types

use crate::calendar::YearMonth;
use crate::db::{ChatId, TaskField};
use crate::transport::MessageId;
use chrono::NaiveDate;
use std::time::Instant;

/// Where a chat is in its wizard. Each step carries the draft collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStep {
    AwaitingName,
    AwaitingDueDate {
        name: String,
    },
    AwaitingImportance {
        name: String,
        due_date: NaiveDate,
    },
    /// Next plain text becomes the value of `field` on `task_name`
    EditingField {
        field: TaskField,
        task_name: String,
    },
}

impl WizardStep {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            WizardStep::AwaitingName => "awaiting_name",
            WizardStep::AwaitingDueDate { .. } => "awaiting_due_date",
            WizardStep::AwaitingImportance { .. } => "awaiting_importance",
            WizardStep::EditingField { .. } => "editing_field",
        }
    }
}

/// Month shown on a specific calendar message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarView {
    /// `None` until the calendar message has been sent
    pub message_id: Option<MessageId>,
    pub month: YearMonth,
}

/// Active wizard for one chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    pub chat_id: ChatId,
    pub step: WizardStep,
    pub calendar: Option<CalendarView>,
    /// Stamped by the conversation store whenever the state is written
    pub touched_at: Instant,
}

impl ConversationState {
    pub fn new(chat_id: ChatId, step: WizardStep) -> Self {
        Self {
            chat_id,
            step,
            calendar: None,
            touched_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_step(&self, step: WizardStep) -> Self {
        Self {
            step,
            ..self.clone()
        }
    }

    /// Whether a navigation press on `message_id` belongs to this wizard's calendar
    pub fn owns_calendar(&self, message_id: MessageId) -> bool {
        matches!(self.step, WizardStep::AwaitingDueDate { .. })
            && self
                .calendar
                .is_some_and(|view| view.message_id.map_or(true, |id| id == message_id))
    }
}

#[cfg(test)]
impl ConversationState {
    pub fn draft_name(&self) -> Option<&str> {
        match &self.step {
            WizardStep::AwaitingDueDate { name } | WizardStep::AwaitingImportance { name, .. } => {
                Some(name)
            }
            WizardStep::AwaitingName | WizardStep::EditingField { .. } => None,
        }
    }

    pub fn draft_due_date(&self) -> Option<NaiveDate> {
        match &self.step {
            WizardStep::AwaitingImportance { due_date, .. } => Some(*due_date),
            _ => None,
        }
    }

    pub fn target_task_name(&self) -> Option<&str> {
        match &self.step {
            WizardStep::EditingField { task_name, .. } => Some(task_name),
            _ => None,
        }
    }

    pub fn target_field(&self) -> Option<TaskField> {
        match &self.step {
            WizardStep::EditingField { field, .. } => Some(*field),
            _ => None,
        }
    }
}

/// Per-event context (immutable)
#[derive(Debug, Clone, Copy)]
pub struct ChatContext {
    pub chat_id: ChatId,
    /// Date used to pick the calendar's initial month
    pub today: NaiveDate,
}

impl ChatContext {
    pub fn new(chat_id: ChatId, today: NaiveDate) -> Self {
        Self { chat_id, today }
    }
}
