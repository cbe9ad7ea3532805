//! Month-grid calendar widget
//!
//! Pure rendering: no knowledge of wizards. Day buttons carry the full ISO
//! date and navigation buttons carry the month being navigated from, so a
//! button press can be handled without any stored calendar state.

use crate::callback::CallbackData;
use crate::ui::{InlineButton, InlineKeyboard};
use chrono::{Datelike, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const WEEKDAY_HEADER: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("month out of range: {year}-{month}")]
    OutOfRange { year: i32, month: u32 },
    #[error("invalid month: {0}")]
    Parse(String),
}

/// Whether `date` falls in a year the calendar can show
pub fn supports(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

/// A calendar month, always valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    first: NaiveDate,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, CalendarError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(CalendarError::OutOfRange { year, month });
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first| Self { first })
            .ok_or(CalendarError::OutOfRange { year, month })
    }

    /// The month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(self) -> i32 {
        self.first.year()
    }

    pub fn month(self) -> u32 {
        self.first.month()
    }

    pub fn first_day(self) -> NaiveDate {
        self.first
    }

    pub fn next(self) -> Result<Self, CalendarError> {
        self.offset(true)
    }

    pub fn prev(self) -> Result<Self, CalendarError> {
        self.offset(false)
    }

    fn offset(self, forward: bool) -> Result<Self, CalendarError> {
        let shifted = if forward {
            self.first.checked_add_months(Months::new(1))
        } else {
            self.first.checked_sub_months(Months::new(1))
        };
        match shifted {
            Some(first) if (MIN_YEAR..=MAX_YEAR).contains(&first.year()) => Ok(Self { first }),
            _ => Err(CalendarError::OutOfRange {
                year: self.year(),
                month: self.month(),
            }),
        }
    }

    pub fn days_in_month(self) -> u32 {
        let next_first = self
            .first
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX);
        u32::try_from((next_first - self.first).num_days()).unwrap_or(31)
    }

    /// Blank cells before day 1 in a Monday-first week
    pub fn first_weekday_offset(self) -> usize {
        self.first.weekday().num_days_from_monday() as usize
    }

    /// Human label, e.g. `February 2024`
    pub fn label(self) -> String {
        self.first.format("%B %Y").to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for YearMonth {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || CalendarError::Parse(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(parse_err)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(parse_err());
        }
        let year = year.parse::<i32>().map_err(|_| parse_err())?;
        let month = month.parse::<u32>().map_err(|_| parse_err())?;
        Self::new(year, month)
    }
}

/// One cell of a week row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Blank,
    Day(NaiveDate),
}

/// Rendered month: navigation row, weekday header, and week rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarGrid {
    pub month: YearMonth,
    /// Week rows; the last one may be shorter than 7 cells
    pub weeks: Vec<Vec<Cell>>,
}

/// Build the grid for a month
pub fn generate(month: YearMonth) -> CalendarGrid {
    let offset = month.first_weekday_offset();
    let cells = std::iter::repeat(Cell::Blank)
        .take(offset)
        .chain(
            month
                .first_day()
                .iter_days()
                .take(month.days_in_month() as usize)
                .map(Cell::Day),
        )
        .collect::<Vec<_>>();

    CalendarGrid {
        month,
        weeks: cells.chunks(7).map(<[Cell]>::to_vec).collect(),
    }
}

impl CalendarGrid {
    #[allow(dead_code)] // Used in tests
    pub fn day_count(&self) -> usize {
        self.weeks
            .iter()
            .flatten()
            .filter(|c| matches!(c, Cell::Day(_)))
            .count()
    }

    /// Inline keyboard for this grid
    pub fn keyboard(&self) -> InlineKeyboard {
        let noop = |text: &str| InlineButton::new(text, &CallbackData::Noop);

        let mut rows = Vec::with_capacity(self.weeks.len() + 2);
        rows.push(vec![
            InlineButton::new("‹", &CallbackData::Prev(self.month)),
            noop(&self.month.label()),
            InlineButton::new("›", &CallbackData::Next(self.month)),
        ]);
        rows.push(WEEKDAY_HEADER.iter().map(|d| noop(d)).collect());
        for week in &self.weeks {
            rows.push(
                week.iter()
                    .map(|cell| match cell {
                        Cell::Blank => noop(" "),
                        Cell::Day(date) => {
                            InlineButton::new(date.day().to_string(), &CallbackData::Date(*date))
                        }
                    })
                    .collect(),
            );
        }

        InlineKeyboard { rows }
    }
}
