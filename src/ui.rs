//! Outbound message and inline keyboard types
//!
//! Transport-neutral; the Telegram adapter serializes them as `reply_markup`.

use crate::callback::{CallbackData, MAX_PAYLOAD_BYTES};
use crate::db::{Importance, TaskField};
use serde::Serialize;

/// A single inline button
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, data: &CallbackData) -> Self {
        Self {
            text: text.into(),
            callback_data: data.to_string(),
        }
    }
}

/// Inline keyboard attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    #[serde(rename = "inline_keyboard")]
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Iterate over every button, row by row
    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

/// Message body plus optional keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

impl Outgoing {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    #[must_use]
    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// One button per importance value
pub fn importance_keyboard() -> InlineKeyboard {
    InlineKeyboard {
        rows: vec![Importance::ALL
            .iter()
            .map(|&i| InlineButton::new(i.label(), &CallbackData::Importance(i)))
            .collect()],
    }
}

/// Edit buttons for the task details view.
///
/// Returns `None` when the task name is too long to fit in a callback payload.
pub fn task_details_keyboard(task_name: &str) -> Option<InlineKeyboard> {
    let row = TaskField::ALL
        .iter()
        .map(|&field| {
            let data = CallbackData::Edit {
                field,
                task_name: task_name.to_string(),
            };
            let label = match field {
                TaskField::Description => "✏️ Description",
                TaskField::Comments => "💬 Add comment",
                TaskField::Links => "🔗 Add link",
            };
            (data.encoded_len() <= MAX_PAYLOAD_BYTES).then(|| InlineButton::new(label, &data))
        })
        .collect::<Option<Vec<_>>>()?;

    Some(InlineKeyboard { rows: vec![row] })
}
