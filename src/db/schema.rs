//! Database schema and task types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS chats (
    chat_id INTEGER PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    due_date TEXT NOT NULL,
    importance TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,

    UNIQUE (chat_id, name),
    FOREIGN KEY (chat_id) REFERENCES chats(chat_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(chat_id, due_date);

CREATE TABLE IF NOT EXISTS task_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('comments', 'links')),
    value TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_task_entries_task ON task_entries(task_id, id);
";

/// Date format used for storage, listings and typed due dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Opaque chat identity; owns one set of tasks and at most one wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task importance, shown to users as a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Red,
    Blue,
    Green,
}

impl Importance {
    pub const ALL: [Importance; 3] = [Importance::Red, Importance::Blue, Importance::Green];

    pub fn as_str(self) -> &'static str {
        match self {
            Importance::Red => "red",
            Importance::Blue => "blue",
            Importance::Green => "green",
        }
    }

    /// Button label
    pub fn label(self) -> &'static str {
        match self {
            Importance::Red => "🔴 Red",
            Importance::Blue => "🔵 Blue",
            Importance::Green => "🟢 Green",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Importance::Red),
            "blue" => Ok(Importance::Blue),
            "green" => Ok(Importance::Green),
            other => Err(other.to_string()),
        }
    }
}

/// Editable task detail fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    /// Single value, replaced on write
    Description,
    /// Append-only list
    Comments,
    /// Append-only list
    Links,
}

impl TaskField {
    pub const ALL: [TaskField; 3] = [TaskField::Description, TaskField::Comments, TaskField::Links];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskField::Description => "description",
            TaskField::Comments => "comments",
            TaskField::Links => "links",
        }
    }
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(TaskField::Description),
            "comments" => Ok(TaskField::Comments),
            "links" => Ok(TaskField::Links),
            other => Err(other.to_string()),
        }
    }
}

/// Task record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub name: String,
    pub due_date: NaiveDate,
    pub importance: Importance,
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

impl TaskItem {
    pub fn new(name: impl Into<String>, due_date: NaiveDate, importance: Importance) -> Self {
        Self {
            name: name.into(),
            due_date,
            importance,
            description: None,
            comments: Vec::new(),
            links: Vec::new(),
        }
    }

    /// One line for task listings: `name - yyyy-MM-dd - importance`
    pub fn summary_line(&self) -> String {
        format!(
            "{} - {} - {}",
            self.name,
            self.due_date.format(DATE_FORMAT),
            self.importance
        )
    }

    /// Multi-line details view
    pub fn details(&self) -> String {
        let mut out = format!(
            "📌 {}\nDue: {}\nImportance: {}\nDescription: {}",
            self.name,
            self.due_date.format(DATE_FORMAT),
            self.importance,
            self.description.as_deref().unwrap_or("—"),
        );
        append_list(&mut out, "Comments", &self.comments);
        append_list(&mut out, "Links", &self.links);
        out
    }
}

fn append_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        out.push_str(&format!("\n{title}: —"));
        return;
    }
    out.push_str(&format!("\n{title}:"));
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("\n  {}. {item}", i + 1));
    }
}
