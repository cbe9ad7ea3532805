//! Deadline reminders
//!
//! A periodic sweep over every known chat that reminds it of tasks due today
//! or tomorrow. Each task is announced at most once per day.

use crate::db::{ChatId, TaskItem};
use crate::runtime::{Outbox, TaskStore};
use crate::ui::Outgoing;
use chrono::{Local, NaiveDate};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Notifier<S, O>
where
    S: TaskStore + 'static,
    O: Outbox + 'static,
{
    store: Arc<S>,
    outbox: Arc<O>,
    /// Day the `notified` set belongs to
    day: Option<NaiveDate>,
    notified: HashSet<(ChatId, String)>,
}

impl<S, O> Notifier<S, O>
where
    S: TaskStore + 'static,
    O: Outbox + 'static,
{
    pub fn new(store: Arc<S>, outbox: Arc<O>) -> Self {
        Self {
            store,
            outbox,
            day: None,
            notified: HashSet::new(),
        }
    }

    /// Send reminders for `today`; returns the number of chats reminded
    pub async fn sweep(&mut self, today: NaiveDate) -> usize {
        if self.day != Some(today) {
            self.day = Some(today);
            self.notified.clear();
        }

        let chats = match self.store.get_all_chat_ids().await {
            Ok(chats) => chats,
            Err(e) => {
                tracing::error!(error = %e, "Notifier could not list chats");
                return 0;
            }
        };

        let mut reminded = 0;
        for chat_id in chats {
            let tasks = match self.store.get_tasks(chat_id).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    tracing::error!(chat_id = %chat_id, error = %e, "Notifier could not load tasks");
                    continue;
                }
            };

            let mut due: Vec<TaskItem> = tasks
                .into_iter()
                .filter(|t| is_due_soon(t, today))
                .filter(|t| !self.notified.contains(&(chat_id, t.name.clone())))
                .collect();
            if due.is_empty() {
                continue;
            }
            due.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.name.cmp(&b.name)));

            match self
                .outbox
                .send(chat_id, Outgoing::text(reminder_text(&due, today)))
                .await
            {
                Ok(_) => {
                    reminded += 1;
                    self.notified
                        .extend(due.into_iter().map(|t| (chat_id, t.name)));
                }
                Err(e) => tracing::warn!(chat_id = %chat_id, error = %e, "Failed to send reminder"),
            }
        }

        if reminded > 0 {
            tracing::info!(chats = reminded, "Sent deadline reminders");
        }
        reminded
    }

    /// Run `sweep` every `interval` until cancelled
    pub fn spawn(mut self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Notifier started");
            loop {
                self.sweep(Local::now().date_naive()).await;
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
            }
            tracing::info!("Notifier stopped");
        })
    }
}

fn is_due_soon(task: &TaskItem, today: NaiveDate) -> bool {
    task.due_date == today || today.succ_opt() == Some(task.due_date)
}

fn reminder_text(due: &[TaskItem], today: NaiveDate) -> String {
    let mut lines = vec!["⏰ Upcoming deadlines:".to_string()];
    lines.extend(due.iter().map(|t| {
        let when = if t.due_date == today { "today" } else { "tomorrow" };
        format!("{} ({when})", t.summary_line())
    }));
    lines.join("\n")
}
