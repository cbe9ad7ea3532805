//! Standalone slash commands
//!
//! Everything here runs independently of the wizard; `/addtask` and
//! `/cancel` are parsed here but handled by the state machine.

use super::traits::TaskStore;
use crate::db::{ChatId, StoreError, TaskItem};
use crate::ui::{task_details_keyboard, Outgoing};
use chrono::NaiveDate;

/// How many tasks `/shownearest` lists
pub const NEAREST_LIMIT: usize = 5;

pub const NO_TASKS: &str = "No tasks found.";
pub const STORE_FAILURE: &str = "Something went wrong while talking to the task storage. Please try again later.";
pub const FALLBACK: &str = "I didn't understand that. Send /menu to see what I can do.";

const MENU: &str = "Available commands:\n\
/addtask - create a new task\n\
/showtasks - list all tasks\n\
/shownearest - list the upcoming tasks\n\
/task <name> - show task details and edit them\n\
/done <name> - mark a task as completed\n\
/deletetask <name> - delete a task (/deletetask all deletes every task)\n\
/cancel - abort task creation";

const WELCOME: &str = "Hi! I keep track of your tasks and remind you about deadlines.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddTask,
    Cancel,
    ShowTasks,
    ShowNearest,
    DeleteTask(String),
    DeleteAll,
    Done(String),
    Task(String),
    Start,
    Menu,
    /// Known command sent without its required argument
    MissingArgument {
        usage: &'static str,
    },
    Unknown(String),
}

impl Command {
    /// Parse a message as a command; `None` when it is not one
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let (head, arg) = match body.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (body, ""),
        };
        // `/cmd@botname` in group chats
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        let with_arg = |usage: &'static str, make: fn(String) -> Command| {
            if arg.is_empty() {
                Command::MissingArgument { usage }
            } else {
                make(arg.to_string())
            }
        };

        let command = match name.as_str() {
            "addtask" => Command::AddTask,
            "cancel" => Command::Cancel,
            "showtasks" => Command::ShowTasks,
            "shownearest" => Command::ShowNearest,
            "deletetask" if arg.eq_ignore_ascii_case("all") => Command::DeleteAll,
            "deletetask" => with_arg(
                "Usage: /deletetask <task name> or /deletetask all",
                Command::DeleteTask,
            ),
            "done" => with_arg("Usage: /done <task name>", Command::Done),
            "task" => with_arg("Usage: /task <task name>", Command::Task),
            "start" => Command::Start,
            "menu" | "help" => Command::Menu,
            _ => Command::Unknown(head.to_string()),
        };
        Some(command)
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddTask => "addtask",
            Command::Cancel => "cancel",
            Command::ShowTasks => "showtasks",
            Command::ShowNearest => "shownearest",
            Command::DeleteTask(_) => "deletetask",
            Command::DeleteAll => "deletetask_all",
            Command::Done(_) => "done",
            Command::Task(_) => "task",
            Command::Start => "start",
            Command::Menu => "menu",
            Command::MissingArgument { .. } => "missing_argument",
            Command::Unknown(_) => "unknown",
        }
    }
}

/// Run a standalone command and build its single reply
pub async fn execute<S: TaskStore + ?Sized>(
    store: &S,
    chat_id: ChatId,
    command: &Command,
    today: NaiveDate,
) -> Outgoing {
    match run(store, chat_id, command, today).await {
        Ok(reply) => reply,
        Err(StoreError::TaskNotFound(name)) => Outgoing::text(format!("Task '{name}' not found.")),
        Err(e) => {
            tracing::error!(chat_id = %chat_id, command = command.name(), error = %e, "Command failed");
            Outgoing::text(STORE_FAILURE)
        }
    }
}

async fn run<S: TaskStore + ?Sized>(
    store: &S,
    chat_id: ChatId,
    command: &Command,
    today: NaiveDate,
) -> Result<Outgoing, StoreError> {
    let reply = match command {
        Command::ShowTasks => {
            let mut tasks = store.get_tasks(chat_id).await?;
            sort_by_due(&mut tasks);
            listing(&tasks, NO_TASKS)
        }
        Command::ShowNearest => {
            let tasks = store.get_tasks(chat_id).await?;
            if tasks.is_empty() {
                Outgoing::text(NO_TASKS)
            } else {
                listing(&nearest(tasks, today), "No upcoming tasks.")
            }
        }
        Command::DeleteAll => match store.remove_all_tasks(chat_id).await? {
            0 => Outgoing::text(NO_TASKS),
            n => Outgoing::text(format!("All tasks have been deleted ({n}).")),
        },
        Command::DeleteTask(name) => {
            let task = resolve(store, chat_id, name).await?;
            store.remove_task(chat_id, &task).await?;
            Outgoing::text(format!("Task '{}' has been deleted successfully.", task.name))
        }
        Command::Done(name) => {
            let task = resolve(store, chat_id, name).await?;
            store.remove_task(chat_id, &task).await?;
            Outgoing::text(format!("Task '{}' completed. Well done! 🎉", task.name))
        }
        Command::Task(name) => {
            let task = resolve(store, chat_id, name).await?;
            match task_details_keyboard(&task.name) {
                Some(keyboard) => Outgoing::text(task.details()).with_keyboard(keyboard),
                None => Outgoing::text(format!(
                    "{}\n\nThis task's name is too long for edit buttons.",
                    task.details()
                )),
            }
        }
        Command::Start => Outgoing::text(format!("{WELCOME}\n\n{MENU}")),
        Command::Menu => Outgoing::text(MENU),
        Command::MissingArgument { usage } => Outgoing::text(*usage),
        Command::Unknown(head) => Outgoing::text(format!(
            "Unknown command /{head}. Send /menu to see what I can do."
        )),
        // Wizard commands are routed to the state machine
        Command::AddTask | Command::Cancel => Outgoing::text(MENU),
    };
    Ok(reply)
}

/// Look a task up by exact name, then case-insensitively
async fn resolve<S: TaskStore + ?Sized>(
    store: &S,
    chat_id: ChatId,
    name: &str,
) -> Result<TaskItem, StoreError> {
    match store.get_task(chat_id, name).await {
        Err(StoreError::TaskNotFound(_)) => store
            .get_tasks(chat_id)
            .await?
            .into_iter()
            .find(|t| t.name.to_lowercase() == name.to_lowercase())
            .ok_or_else(|| StoreError::TaskNotFound(name.to_string())),
        other => other,
    }
}

fn sort_by_due(tasks: &mut [TaskItem]) {
    tasks.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.name.cmp(&b.name)));
}

/// Up to `NEAREST_LIMIT` tasks due today or later, earliest first
pub fn nearest(mut tasks: Vec<TaskItem>, today: NaiveDate) -> Vec<TaskItem> {
    tasks.retain(|t| t.due_date >= today);
    sort_by_due(&mut tasks);
    tasks.truncate(NEAREST_LIMIT);
    tasks
}

fn listing(tasks: &[TaskItem], empty: &str) -> Outgoing {
    if tasks.is_empty() {
        return Outgoing::text(empty);
    }
    Outgoing::text(
        tasks
            .iter()
            .map(TaskItem::summary_line)
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Importance;
    use crate::runtime::testing::{FailingTaskStore, InMemoryTaskStore};

    const CHAT: ChatId = ChatId(5);

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 3, 10)
    }

    fn seeded() -> InMemoryTaskStore {
        let store = InMemoryTaskStore::new();
        store.insert(CHAT, TaskItem::new("Later", date(2024, 4, 1), Importance::Green));
        store.insert(CHAT, TaskItem::new("Past", date(2024, 1, 1), Importance::Red));
        store.insert(CHAT, TaskItem::new("Soon", date(2024, 3, 10), Importance::Blue));
        store
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/addtask"), Some(Command::AddTask));
        assert_eq!(Command::parse("  /ShowTasks  "), Some(Command::ShowTasks));
        assert_eq!(Command::parse("/shownearest@task_bot"), Some(Command::ShowNearest));
        assert_eq!(
            Command::parse("/deletetask Buy milk"),
            Some(Command::DeleteTask("Buy milk".to_string()))
        );
        assert_eq!(Command::parse("/deletetask ALL"), Some(Command::DeleteAll));
        assert_eq!(Command::parse("/help"), Some(Command::Menu));
        assert_eq!(
            Command::parse("/frobnicate now"),
            Some(Command::Unknown("frobnicate".to_string()))
        );
        assert_eq!(Command::parse("hello"), None);
    }

    #[test]
    fn test_parse_missing_argument() {
        assert!(matches!(
            Command::parse("/done"),
            Some(Command::MissingArgument { usage }) if usage.contains("/done")
        ));
        assert!(matches!(
            Command::parse("/deletetask   "),
            Some(Command::MissingArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_showtasks_sorted_by_due_then_name() {
        let store = seeded();
        store.insert(CHAT, TaskItem::new("Also soon", date(2024, 3, 10), Importance::Red));

        let reply = execute(&store, CHAT, &Command::ShowTasks, today()).await;

        let names: Vec<_> = reply
            .text
            .lines()
            .map(|l| l.split(" - ").next().unwrap())
            .collect();
        assert_eq!(names, vec!["Past", "Also soon", "Soon", "Later"]);
    }

    #[tokio::test]
    async fn test_empty_listing_still_replies() {
        let store = InMemoryTaskStore::new();
        let reply = execute(&store, CHAT, &Command::ShowTasks, today()).await;
        assert_eq!(reply.text, NO_TASKS);

        let reply = execute(&store, CHAT, &Command::ShowNearest, today()).await;
        assert_eq!(reply.text, NO_TASKS);
    }

    #[tokio::test]
    async fn test_shownearest_skips_past_and_limits() {
        let store = seeded();
        for i in 0..6 {
            store.insert(
                CHAT,
                TaskItem::new(format!("Extra {i}"), date(2024, 5, 1 + i), Importance::Blue),
            );
        }

        let reply = execute(&store, CHAT, &Command::ShowNearest, today()).await;

        let lines: Vec<_> = reply.text.lines().collect();
        assert_eq!(lines.len(), NEAREST_LIMIT);
        assert!(lines[0].starts_with("Soon - 2024-03-10"));
        assert!(!reply.text.contains("Past"));
    }

    #[tokio::test]
    async fn test_done_removes_task() {
        let store = seeded();

        let reply = execute(&store, CHAT, &Command::Done("soon".to_string()), today()).await;

        assert!(reply.text.contains("'Soon' completed"));
        assert_eq!(store.tasks(CHAT).len(), 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_task() {
        let store = seeded();
        let reply = execute(&store, CHAT, &Command::DeleteTask("Nope".to_string()), today()).await;
        assert_eq!(reply.text, "Task 'Nope' not found.");
        assert_eq!(store.tasks(CHAT).len(), 3);
    }

    #[tokio::test]
    async fn test_delete_all() {
        let store = seeded();
        let reply = execute(&store, CHAT, &Command::DeleteAll, today()).await;
        assert_eq!(reply.text, "All tasks have been deleted (3).");
        assert!(store.tasks(CHAT).is_empty());
    }

    #[tokio::test]
    async fn test_task_details_has_edit_buttons() {
        let store = seeded();
        let reply = execute(&store, CHAT, &Command::Task("Later".to_string()), today()).await;

        assert!(reply.text.contains("Later"));
        let keyboard = reply.keyboard.unwrap();
        assert!(keyboard
            .buttons()
            .any(|b| b.callback_data == "edit_comments_Later"));
    }

    #[tokio::test]
    async fn test_long_task_name_gets_no_buttons() {
        let store = InMemoryTaskStore::new();
        let name = "x".repeat(80);
        store.insert(CHAT, TaskItem::new(&name, today(), Importance::Blue));

        let reply = execute(&store, CHAT, &Command::Task(name), today()).await;

        assert!(reply.keyboard.is_none());
        assert!(reply.text.contains("too long"));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let reply = execute(&FailingTaskStore, CHAT, &Command::ShowTasks, today()).await;
        assert_eq!(reply.text, STORE_FAILURE);
    }

    #[tokio::test]
    async fn test_other_chats_are_untouched() {
        let store = seeded();
        store.insert(ChatId(6), TaskItem::new("Theirs", today(), Importance::Red));

        execute(&store, CHAT, &Command::DeleteAll, today()).await;

        assert_eq!(store.tasks(ChatId(6)).len(), 1);
    }
}
