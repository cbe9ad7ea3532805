//! Inline button callback payloads
//!
//! Wire format (at most 64 bytes, a Telegram limit):
//! `date_<yyyy-MM-dd>`, `importance_<red|blue|green>`, `prev_<yyyy-MM>`,
//! `next_<yyyy-MM>`, `edit_<field>_<taskName>`, `noop`.

use crate::calendar::{self, YearMonth};
use crate::db::{Importance, TaskField, DATE_FORMAT};
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum callback payload size accepted by Telegram
pub const MAX_PAYLOAD_BYTES: usize = 64;

/// Decoded button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    /// A day on the calendar grid
    Date(NaiveDate),
    Importance(Importance),
    /// Navigate one month back from the carried month
    Prev(YearMonth),
    /// Navigate one month forward from the carried month
    Next(YearMonth),
    Edit { field: TaskField, task_name: String },
    /// Blank cells and labels
    Noop,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallbackError {
    #[error("empty callback payload")]
    Empty,
    #[error("unrecognized callback payload: {0}")]
    Unrecognized(String),
    #[error("invalid date in callback payload: {0}")]
    InvalidDate(String),
    #[error("invalid month in callback payload: {0}")]
    InvalidMonth(String),
    #[error("unknown importance: {0}")]
    UnknownImportance(String),
    #[error("unknown task field: {0}")]
    UnknownField(String),
    #[error("edit payload without task name")]
    MissingTaskName,
}

impl CallbackData {
    pub fn encoded_len(&self) -> usize {
        self.to_string().len()
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackData::Date(date) => write!(f, "date_{}", date.format(DATE_FORMAT)),
            CallbackData::Importance(i) => write!(f, "importance_{i}"),
            CallbackData::Prev(month) => write!(f, "prev_{month}"),
            CallbackData::Next(month) => write!(f, "next_{month}"),
            CallbackData::Edit { field, task_name } => write!(f, "edit_{field}_{task_name}"),
            CallbackData::Noop => f.write_str("noop"),
        }
    }
}

impl FromStr for CallbackData {
    type Err = CallbackError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        if payload.is_empty() {
            return Err(CallbackError::Empty);
        }
        if payload == "noop" {
            return Ok(CallbackData::Noop);
        }

        let (kind, rest) = payload
            .split_once('_')
            .ok_or_else(|| CallbackError::Unrecognized(payload.to_string()))?;

        match kind {
            "date" => NaiveDate::parse_from_str(rest, DATE_FORMAT)
                .ok()
                .filter(|date| calendar::supports(*date))
                .map(CallbackData::Date)
                .ok_or_else(|| CallbackError::InvalidDate(rest.to_string())),
            "importance" => rest
                .parse::<Importance>()
                .map(CallbackData::Importance)
                .map_err(|_| CallbackError::UnknownImportance(rest.to_string())),
            "prev" => parse_month(rest).map(CallbackData::Prev),
            "next" => parse_month(rest).map(CallbackData::Next),
            "edit" => {
                let (field, task_name) = rest
                    .split_once('_')
                    .ok_or(CallbackError::MissingTaskName)?;
                let field = field
                    .parse::<TaskField>()
                    .map_err(CallbackError::UnknownField)?;
                if task_name.is_empty() {
                    return Err(CallbackError::MissingTaskName);
                }
                Ok(CallbackData::Edit {
                    field,
                    task_name: task_name.to_string(),
                })
            }
            _ => Err(CallbackError::Unrecognized(payload.to_string())),
        }
    }
}

fn parse_month(s: &str) -> Result<YearMonth, CallbackError> {
    s.parse::<YearMonth>()
        .map_err(|_| CallbackError::InvalidMonth(s.to_string()))
}
