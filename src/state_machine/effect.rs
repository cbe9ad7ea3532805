//! Effects produced by state transitions

use crate::calendar::YearMonth;
use crate::db::{TaskField, TaskItem};
use crate::transport::MessageId;

/// Text prompts sent back to the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    TaskName,
    EmptyName,
    DueDate,
    InvalidDate { input: String },
    Importance,
    InvalidImportance { input: String },
    FieldValue { field: TaskField, task_name: String },
    EmptyFieldValue { field: TaskField },
    Cancelled,
    NothingToCancel,
}

impl Prompt {
    pub fn text(&self) -> String {
        match self {
            Prompt::TaskName => "Please enter the title of the task:".to_string(),
            Prompt::EmptyName => "The title can't be empty. Please enter the title of the task:".to_string(),
            Prompt::DueDate => "Please pick the deadline date (or type it as yyyy-MM-dd):".to_string(),
            Prompt::InvalidDate { input } => {
                format!("Invalid date \"{input}\". Please pick a day on the calendar or use yyyy-MM-dd.")
            }
            Prompt::Importance => "Please choose the importance:".to_string(),
            Prompt::InvalidImportance { input } => {
                format!("Invalid importance \"{input}\". Please use red, blue, or green.")
            }
            Prompt::FieldValue { field, task_name } => match field {
                TaskField::Description => {
                    format!("Send the new description for \"{task_name}\":")
                }
                TaskField::Comments => format!("Send a comment to add to \"{task_name}\":"),
                TaskField::Links => format!("Send a link to add to \"{task_name}\":"),
            },
            Prompt::EmptyFieldValue { field } => format!("The {field} value can't be empty. Please send it again:"),
            Prompt::Cancelled => "Task creation cancelled.".to_string(),
            Prompt::NothingToCancel => "No task creation in progress.".to_string(),
        }
    }
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a plain prompt
    Prompt(Prompt),

    /// Send a new calendar message and remember its id on the wizard
    SendCalendar { month: YearMonth },

    /// Re-render an existing calendar message in place
    EditCalendar {
        message_id: MessageId,
        month: YearMonth,
    },

    /// Send the importance keyboard
    AskImportance,

    /// Insert the finished task and confirm
    CommitTask(TaskItem),

    /// Write one detail field and confirm
    WriteField {
        task_name: String,
        field: TaskField,
        value: String,
    },
}

impl Effect {
    pub fn prompt(prompt: Prompt) -> Self {
        Effect::Prompt(prompt)
    }
}
