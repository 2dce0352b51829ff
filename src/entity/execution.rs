//! One day's run of a plan and the transitions it can take.
//!
//! ```text
//! (none) --start--> active --complete--> completed
//!                      |
//!                      +-----stop------> stopped
//! ```
//!
//! Completing the last open task completes the run. Completed and stopped
//! runs accept no further actions; starting the plan again on the same date
//! replaces the record instead.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Task;
use crate::error::{DaybookError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Active,
    Completed,
    Stopped,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Active)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Active => write!(f, "active"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// A plan's run on one date. Times are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub status: ExecutionStatus,
    pub start_time: i64,
    #[serde(default)]
    pub end_time: Option<i64>,
    /// Accumulated active time in milliseconds
    #[serde(default)]
    pub total_time: i64,
    /// Snapshot of the plan's tasks taken at start
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionAction {
    CompleteTask {
        task_id: String,
        /// Session time to book if this completes the run
        elapsed: Option<Duration>,
    },
    ReopenTask {
        task_id: String,
    },
    Complete {
        elapsed: Option<Duration>,
    },
    Stop {
        elapsed: Option<Duration>,
    },
}

impl ExecutionAction {
    fn verb(&self) -> &'static str {
        match self {
            ExecutionAction::CompleteTask { .. } => "complete a task of",
            ExecutionAction::ReopenTask { .. } => "reopen a task of",
            ExecutionAction::Complete { .. } => "complete",
            ExecutionAction::Stop { .. } => "stop",
        }
    }
}

/// Something that happened as the result of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    TaskCompleted { task_id: String, at: i64 },
    TaskReopened { task_id: String },
    ExecutionCompleted { total_time: i64 },
    ExecutionStopped { total_time: i64 },
}

/// The record after an action plus everything the action caused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub record: ExecutionRecord,
    pub events: Vec<ExecutionEvent>,
}

impl Transition {
    pub fn completed_execution(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, ExecutionEvent::ExecutionCompleted { .. }))
    }
}

impl ExecutionRecord {
    /// Begin a run from a deep, completion-reset copy of `tasks`.
    pub fn start(tasks: &[Task], now: i64) -> Self {
        Self {
            status: ExecutionStatus::Active,
            start_time: now,
            end_time: None,
            total_time: 0,
            tasks: tasks.iter().map(Task::reset).collect(),
        }
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.completed)
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.total_time.max(0) as u64)
    }

    /// Apply `action` at time `now`, leaving `self` untouched.
    pub fn apply(&self, action: ExecutionAction, now: i64) -> Result<Transition> {
        if self.status.is_terminal() {
            return Err(DaybookError::InvalidTransition {
                action: action.verb().to_string(),
                status: self.status.to_string(),
            });
        }

        let mut record = self.clone();
        let mut events = Vec::new();

        match action {
            ExecutionAction::CompleteTask { task_id, elapsed } => {
                let task = record
                    .tasks
                    .iter_mut()
                    .find(|t| t.id == task_id)
                    .ok_or_else(|| DaybookError::TaskNotFound(task_id.clone()))?;
                if !task.completed {
                    task.completed = true;
                    task.completed_at = Some(now);
                    events.push(ExecutionEvent::TaskCompleted { task_id, at: now });
                }
                if record.all_completed() {
                    events.push(record.finish(ExecutionStatus::Completed, elapsed, now));
                }
            }
            ExecutionAction::ReopenTask { task_id } => {
                let task = record
                    .tasks
                    .iter_mut()
                    .find(|t| t.id == task_id)
                    .ok_or_else(|| DaybookError::TaskNotFound(task_id.clone()))?;
                if task.completed {
                    task.completed = false;
                    task.completed_at = None;
                    events.push(ExecutionEvent::TaskReopened { task_id });
                }
            }
            ExecutionAction::Complete { elapsed } => {
                events.push(record.finish(ExecutionStatus::Completed, elapsed, now));
            }
            ExecutionAction::Stop { elapsed } => {
                events.push(record.finish(ExecutionStatus::Stopped, elapsed, now));
            }
        }

        Ok(Transition { record, events })
    }

    // Both terminal transitions add to total_time. The caller's elapsed time
    // excludes pauses; without it the wall-clock span since start is used.
    fn finish(
        &mut self,
        status: ExecutionStatus,
        elapsed: Option<Duration>,
        now: i64,
    ) -> ExecutionEvent {
        let session = match elapsed {
            Some(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
            None => (now - self.start_time).max(0),
        };
        self.status = status;
        self.end_time = Some(now);
        self.total_time = self.total_time.saturating_add(session);

        match status {
            ExecutionStatus::Stopped => ExecutionEvent::ExecutionStopped {
                total_time: self.total_time,
            },
            _ => ExecutionEvent::ExecutionCompleted {
                total_time: self.total_time,
            },
        }
    }
}
