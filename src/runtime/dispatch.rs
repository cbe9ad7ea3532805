//! Inbound event routing
//!
//! Decides what an event is before anything is executed: a wizard event, a
//! standalone command, a callback to acknowledge, or a plain message kind.

use super::commands::Command;
use crate::callback::{CallbackData, CallbackError};
use crate::state_machine::{Direction, Event};
use crate::transport::{InboundEvent, InboundKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Feed the state machine; `callback_id` is set for button presses
    Wizard {
        event: Event,
        callback_id: Option<String>,
    },
    Command(Command),
    /// Button with nothing to do (blank calendar cell, month label)
    Ack { callback_id: String },
    /// Payload that could not be decoded
    Malformed {
        callback_id: String,
        error: CallbackError,
    },
    Document {
        file_id: String,
        file_name: Option<String>,
    },
    Dice { value: u8 },
    /// Plain text with no wizard running
    Fallback,
}

/// Route one event. `has_wizard` tells whether the chat has an active wizard.
pub fn route(event: &InboundEvent, has_wizard: bool) -> Route {
    match &event.kind {
        InboundKind::Callback {
            id,
            data,
            message_id,
        } => {
            let wizard = |event: Event| Route::Wizard {
                event,
                callback_id: Some(id.clone()),
            };
            match data.parse::<CallbackData>() {
                Ok(CallbackData::Noop) => Route::Ack {
                    callback_id: id.clone(),
                },
                Ok(CallbackData::Date(date)) => wizard(Event::DateSelected(date)),
                Ok(CallbackData::Importance(importance)) => {
                    wizard(Event::ImportanceSelected(importance))
                }
                Ok(CallbackData::Prev(from)) => wizard(Event::NavigateCalendar {
                    from,
                    direction: Direction::Prev,
                    message_id: *message_id,
                }),
                Ok(CallbackData::Next(from)) => wizard(Event::NavigateCalendar {
                    from,
                    direction: Direction::Next,
                    message_id: *message_id,
                }),
                Ok(CallbackData::Edit { field, task_name }) => {
                    wizard(Event::EditRequested { field, task_name })
                }
                // A broken day button while picking a date is user-facing
                Err(CallbackError::InvalidDate(input)) if has_wizard => {
                    wizard(Event::DateRejected { input })
                }
                Err(error) => Route::Malformed {
                    callback_id: id.clone(),
                    error,
                },
            }
        }

        InboundKind::Text { text, .. } => match Command::parse(text) {
            Some(Command::AddTask) => Route::Wizard {
                event: Event::StartWizard,
                callback_id: None,
            },
            Some(Command::Cancel) => Route::Wizard {
                event: Event::Cancel,
                callback_id: None,
            },
            Some(command) => Route::Command(command),
            None if has_wizard => Route::Wizard {
                event: Event::Text(text.clone()),
                callback_id: None,
            },
            None => Route::Fallback,
        },

        InboundKind::Document { file_id, file_name } => Route::Document {
            file_id: file_id.clone(),
            file_name: file_name.clone(),
        },

        InboundKind::Dice { value } => Route::Dice { value: *value },
    }
}
