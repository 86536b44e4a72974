//! Daily reminder cycle.
//!
//! Once per tick the scheduler either fires the daily trigger (everyone tracked
//! goes back to pending and gets a reminder) or sends follow-ups to users who
//! are still pending and haven't been reminded within the interval.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::ReminderConfig;
use crate::line::Messenger;
use crate::store::ReminderStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Trigger,
    FollowUp,
    /// A later tick inside a trigger minute that already fired today.
    Skipped,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub kind: TickKind,
    pub pushed: Vec<String>,
    pub failed: Vec<String>,
}

impl TickReport {
    fn new(kind: TickKind) -> Self {
        Self {
            kind,
            pushed: Vec::new(),
            failed: Vec::new(),
        }
    }
}

pub struct Scheduler {
    store: Arc<ReminderStore>,
    messenger: Arc<dyn Messenger>,
    trigger: NaiveTime,
    interval: chrono::Duration,
    period: std::time::Duration,
    reminder_text: String,
    last_trigger: Option<NaiveDate>,
}

impl Scheduler {
    pub fn new(
        store: Arc<ReminderStore>,
        messenger: Arc<dyn Messenger>,
        config: &ReminderConfig,
        reminder_text: String,
    ) -> Result<Self> {
        Ok(Self {
            store,
            messenger,
            trigger: config.trigger()?,
            interval: config.interval(),
            period: config.tick(),
            reminder_text,
            last_trigger: None,
        })
    }

    fn in_trigger_minute(&self, now: NaiveDateTime) -> bool {
        now.hour() == self.trigger.hour() && now.minute() == self.trigger.minute()
    }

    /// Evaluate one tick against the wall-clock time `now`.
    pub async fn tick(&mut self, now: NaiveDateTime) -> TickReport {
        if self.in_trigger_minute(now) {
            if self.last_trigger == Some(now.date()) {
                return TickReport::new(TickKind::Skipped);
            }
            self.last_trigger = Some(now.date());
            let users = self.store.activate_all();
            tracing::info!("Daily trigger at {}: reminding {} users", now.time(), users.len());
            let mut report = TickReport::new(TickKind::Trigger);
            for user_id in users {
                match self.messenger.push(&user_id, &self.reminder_text).await {
                    Ok(()) => report.pushed.push(user_id),
                    Err(e) => {
                        tracing::error!(user_id = %user_id, "Failed to send initial reminder: {e:#}");
                        report.failed.push(user_id);
                    }
                }
            }
            return report;
        }

        let mut report = TickReport::new(TickKind::FollowUp);
        if self.store.is_empty() {
            return report;
        }
        for user_id in self.store.due_followups(now, self.interval) {
            match self.messenger.push(&user_id, &self.reminder_text).await {
                Ok(()) => {
                    self.store.mark_reminded(&user_id, now);
                    report.pushed.push(user_id);
                }
                Err(e) => {
                    tracing::error!(user_id = %user_id, "Failed to send follow-up reminder: {e:#}");
                    report.failed.push(user_id);
                }
            }
        }
        if !report.pushed.is_empty() {
            tracing::debug!("Sent {} follow-up reminders", report.pushed.len());
        }
        report
    }

    /// Tick on the configured period until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            "Reminder scheduler started (trigger {}, every {} min)",
            self.trigger.format("%H:%M"),
            self.interval.num_minutes()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reminder scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.tick(Local::now().naive_local()).await;
                    tracing::trace!(
                        kind = ?report.kind,
                        pushed = report.pushed.len(),
                        failed = report.failed.len(),
                        "Tick"
                    );
                }
            }
        }
    }

    /// Spawn [`Scheduler::run`] on the runtime.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
