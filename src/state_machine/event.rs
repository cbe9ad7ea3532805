//! Events that drive the wizard

use crate::calendar::YearMonth;
use crate::db::{Importance, TaskField};
use crate::transport::MessageId;
use chrono::NaiveDate;

/// Calendar navigation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Commands
    StartWizard,
    Cancel,

    // Plain text while a wizard is active
    Text(String),

    // Button presses
    DateSelected(NaiveDate),
    /// A date button whose payload did not parse
    DateRejected { input: String },
    ImportanceSelected(Importance),
    EditRequested {
        field: TaskField,
        task_name: String,
    },
    NavigateCalendar {
        from: YearMonth,
        direction: Direction,
        message_id: MessageId,
    },
}

impl Event {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::StartWizard => "start_wizard",
            Event::Cancel => "cancel",
            Event::Text(_) => "text",
            Event::DateSelected(_) => "date_selected",
            Event::DateRejected { .. } => "date_rejected",
            Event::ImportanceSelected(_) => "importance_selected",
            Event::EditRequested { .. } => "edit_requested",
            Event::NavigateCalendar { .. } => "navigate_calendar",
        }
    }
}
