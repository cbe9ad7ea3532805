//! Pure state transition function
//!
//! Given the chat's current wizard (if any) and one event, decide the next
//! wizard state and the effects to run. No I/O happens here.

use super::effect::Prompt;
use super::event::Direction;
use super::state::{CalendarView, ChatContext, ConversationState, WizardStep};
use super::{Effect, Event};
use crate::calendar::{self, CalendarError, YearMonth};
use crate::db::{Importance, TaskItem, DATE_FORMAT};
use chrono::NaiveDate;
use thiserror::Error;

/// Typed-date formats accepted besides the calendar buttons
const TYPED_DATE_FORMATS: [&str; 3] = [DATE_FORMAT, "%d.%m.%Y", "%d/%m/%Y"];

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    /// `None` means the chat has no wizard afterwards
    pub new_state: Option<ConversationState>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Option<ConversationState>) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// Keep the current state as-is
    pub fn unchanged(state: &ConversationState) -> Self {
        Self::new(Some(state.clone()))
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("No task creation in progress")]
    NoActiveWizard,
    #[error("Unexpected {event} while {}", step.name())]
    Unexpected {
        step: WizardStep,
        event: &'static str,
    },
    #[error("Calendar navigation failed: {0}")]
    Calendar(#[from] CalendarError),
}

impl TransitionError {
    /// Prompt that tells the user what the wizard is waiting for
    pub fn hint(&self) -> Option<Prompt> {
        match self {
            TransitionError::Unexpected { step, .. } => Some(prompt_for(step)),
            TransitionError::NoActiveWizard | TransitionError::Calendar(_) => None,
        }
    }
}

/// Pure transition function
pub fn transition(
    state: Option<&ConversationState>,
    ctx: &ChatContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Wizard entry points (replace any wizard in progress)
        // ============================================================
        (_, Event::StartWizard) => Ok(TransitionResult::new(Some(ConversationState::new(
            ctx.chat_id,
            WizardStep::AwaitingName,
        )))
        .with_effect(Effect::prompt(Prompt::TaskName))),

        (_, Event::EditRequested { field, task_name }) => {
            let prompt = Prompt::FieldValue {
                field,
                task_name: task_name.clone(),
            };
            Ok(TransitionResult::new(Some(ConversationState::new(
                ctx.chat_id,
                WizardStep::EditingField { field, task_name },
            )))
            .with_effect(Effect::prompt(prompt)))
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (Some(_), Event::Cancel) => {
            Ok(TransitionResult::new(None).with_effect(Effect::prompt(Prompt::Cancelled)))
        }
        (None, Event::Cancel) => {
            Ok(TransitionResult::new(None).with_effect(Effect::prompt(Prompt::NothingToCancel)))
        }

        // ============================================================
        // Calendar navigation: re-render the pressed message; only the
        // wizard that owns that message tracks the new month
        // ============================================================
        (
            state,
            Event::NavigateCalendar {
                from,
                direction,
                message_id,
            },
        ) => {
            let month = match direction {
                Direction::Prev => from.prev()?,
                Direction::Next => from.next()?,
            };
            let new_state = state.map(|s| {
                let mut next = s.clone();
                if s.owns_calendar(message_id) {
                    next.calendar = Some(CalendarView {
                        message_id: Some(message_id),
                        month,
                    });
                }
                next
            });
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::EditCalendar { message_id, month }))
        }

        // ============================================================
        // Wizard input
        // ============================================================
        (Some(s), Event::Text(text)) => Ok(handle_text(s, ctx, &text)),

        (Some(s), Event::DateSelected(date)) => match &s.step {
            WizardStep::AwaitingDueDate { name } => Ok(accept_due_date(s, name, date)),
            _ => Err(unexpected(s, "date_selected")),
        },

        (Some(s), Event::DateRejected { input }) => match &s.step {
            WizardStep::AwaitingDueDate { .. } => Ok(TransitionResult::unchanged(s)
                .with_effect(Effect::prompt(Prompt::InvalidDate { input }))),
            _ => Err(unexpected(s, "date_rejected")),
        },

        (Some(s), Event::ImportanceSelected(importance)) => match &s.step {
            WizardStep::AwaitingImportance { name, due_date } => {
                Ok(commit(name, *due_date, importance))
            }
            _ => Err(unexpected(s, "importance_selected")),
        },

        (None, _) => Err(TransitionError::NoActiveWizard),
    }
}

fn handle_text(s: &ConversationState, ctx: &ChatContext, text: &str) -> TransitionResult {
    let trimmed = text.trim();
    match &s.step {
        WizardStep::AwaitingName if trimmed.is_empty() => {
            TransitionResult::unchanged(s).with_effect(Effect::prompt(Prompt::EmptyName))
        }
        WizardStep::AwaitingName => {
            let month = YearMonth::of(ctx.today);
            let mut next = s.with_step(WizardStep::AwaitingDueDate {
                name: trimmed.to_string(),
            });
            next.calendar = Some(CalendarView {
                message_id: None,
                month,
            });
            TransitionResult::new(Some(next)).with_effect(Effect::SendCalendar { month })
        }

        WizardStep::AwaitingDueDate { name } => match parse_due_date(trimmed) {
            Some(date) => accept_due_date(s, name, date),
            None => TransitionResult::unchanged(s).with_effect(Effect::prompt(Prompt::InvalidDate {
                input: trimmed.to_string(),
            })),
        },

        WizardStep::AwaitingImportance { name, due_date } => match trimmed.parse::<Importance>() {
            Ok(importance) => commit(name, *due_date, importance),
            Err(_) => TransitionResult::unchanged(s).with_effect(Effect::prompt(
                Prompt::InvalidImportance {
                    input: trimmed.to_string(),
                },
            )),
        },

        WizardStep::EditingField { field, .. } if trimmed.is_empty() => {
            TransitionResult::unchanged(s)
                .with_effect(Effect::prompt(Prompt::EmptyFieldValue { field: *field }))
        }
        WizardStep::EditingField { field, task_name } => {
            TransitionResult::new(None).with_effect(Effect::WriteField {
                task_name: task_name.clone(),
                field: *field,
                value: trimmed.to_string(),
            })
        }
    }
}

fn accept_due_date(s: &ConversationState, name: &str, due_date: NaiveDate) -> TransitionResult {
    let mut next = s.with_step(WizardStep::AwaitingImportance {
        name: name.to_string(),
        due_date,
    });
    next.calendar = None;
    TransitionResult::new(Some(next)).with_effect(Effect::AskImportance)
}

fn commit(name: &str, due_date: NaiveDate, importance: Importance) -> TransitionResult {
    TransitionResult::new(None).with_effect(Effect::CommitTask(TaskItem::new(
        name, due_date, importance,
    )))
}

fn unexpected(s: &ConversationState, event: &'static str) -> TransitionError {
    TransitionError::Unexpected {
        step: s.step.clone(),
        event,
    }
}

fn prompt_for(step: &WizardStep) -> Prompt {
    match step {
        WizardStep::AwaitingName => Prompt::TaskName,
        WizardStep::AwaitingDueDate { .. } => Prompt::DueDate,
        WizardStep::AwaitingImportance { .. } => Prompt::Importance,
        WizardStep::EditingField { field, task_name } => Prompt::FieldValue {
            field: *field,
            task_name: task_name.clone(),
        },
    }
}

/// Parse a typed due date within the calendar's year range
pub fn parse_due_date(input: &str) -> Option<NaiveDate> {
    TYPED_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input.trim(), fmt).ok())
        .filter(|date| calendar::supports(*date))
}
