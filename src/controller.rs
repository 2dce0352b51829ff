//! Drives one plan execution at a time and keeps its stopwatch.
//!
//! All persisted state changes go through [`PlanRepository`]; the controller
//! only adds the pause-aware timer on top.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{format_duration, Clock};
use crate::entity::{ExecutionAction, ExecutionRecord, ExecutionStatus, Task};
use crate::error::{DaybookError, Result};
use crate::repository::{PlanProgress, PlanRepository};

/// What the user gets told when a run finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionSummary {
    pub plan_name: String,
    pub progress: PlanProgress,
    pub elapsed: Duration,
}

/// Active time of one session, excluding pauses.
///
/// `base` is time already booked on the record before this session began;
/// it is shown but never booked again.
#[derive(Debug, Clone, Copy)]
struct Stopwatch {
    base: Duration,
    session: Duration,
    running_since: Option<DateTime<Utc>>,
}

impl Stopwatch {
    fn started(base: Duration, now: DateTime<Utc>) -> Self {
        Self {
            base,
            session: Duration::ZERO,
            running_since: Some(now),
        }
    }

    fn pause(&mut self, now: DateTime<Utc>) {
        self.session = self.session(now);
        self.running_since = None;
    }

    fn resume(&mut self, now: DateTime<Utc>) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    fn session(&self, now: DateTime<Utc>) -> Duration {
        match self.running_since {
            Some(since) => self.session + (now - since).to_std().unwrap_or_default(),
            None => self.session,
        }
    }

    fn total(&self, now: DateTime<Utc>) -> Duration {
        self.base + self.session(now)
    }
}

struct Running {
    plan_id: String,
    date: NaiveDate,
    stopwatch: Stopwatch,
}

pub struct PlanExecutionController<'a> {
    plans: PlanRepository<'a>,
    running: Option<Running>,
}

impl<'a> PlanExecutionController<'a> {
    pub fn new(plans: PlanRepository<'a>) -> Self {
        Self {
            plans,
            running: None,
        }
    }

    pub fn plan_id(&self) -> Option<&str> {
        self.running.as_ref().map(|r| r.plan_id.as_str())
    }

    /// Start `plan_id` for today with a fresh stopwatch.
    pub fn start(&mut self, plan_id: &str) -> Result<ExecutionRecord> {
        let plan = self
            .plans
            .plan(plan_id)
            .ok_or_else(|| DaybookError::PlanNotFound(plan_id.to_string()))?;
        if plan.tasks.is_empty() {
            return Err(DaybookError::Validation(format!(
                "plan '{}' has no tasks",
                plan.name
            )));
        }

        let clock = self.plans.clock();
        let date = clock.today();
        let record = self.plans.start_plan(plan_id, date)?;
        self.running = Some(Running {
            plan_id: plan_id.to_string(),
            date,
            stopwatch: Stopwatch::started(Duration::ZERO, clock.now()),
        });
        Ok(record)
    }

    /// Pick up today's active run, or start one if today has none.
    pub fn resume(&mut self, plan_id: &str) -> Result<ExecutionRecord> {
        let clock = self.plans.clock();
        let date = clock.today();
        let Some(record) = self.plans.plan_execution(plan_id, date) else {
            return self.start(plan_id);
        };
        if record.status.is_terminal() {
            return Err(DaybookError::InvalidTransition {
                action: "resume".to_string(),
                status: record.status.to_string(),
            });
        }

        debug!(plan_id, %date, booked_ms = record.total_time, "resuming run");
        self.running = Some(Running {
            plan_id: plan_id.to_string(),
            date,
            stopwatch: Stopwatch::started(record.elapsed(), clock.now()),
        });
        Ok(record)
    }

    /// Pause or unpause the stopwatch. Returns whether it is now paused.
    pub fn toggle_pause(&mut self) -> Result<bool> {
        let now = self.plans.clock().now();
        let running = self.running.as_mut().ok_or(DaybookError::NoActiveExecution)?;
        let stopwatch = &mut running.stopwatch;
        if stopwatch.running_since.is_some() {
            stopwatch.pause(now);
        } else {
            stopwatch.resume(now);
        }
        Ok(stopwatch.running_since.is_none())
    }

    pub fn is_paused(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| r.stopwatch.running_since.is_none())
    }

    /// Flip one task. Returns the summary when this finished the run.
    pub fn toggle_task(&mut self, task_id: &str) -> Result<Option<CompletionSummary>> {
        let (plan_id, date, session) = self.current()?;
        let record = self
            .plans
            .plan_execution(&plan_id, date)
            .ok_or_else(|| DaybookError::ExecutionNotFound {
                plan_id: plan_id.clone(),
                date: date.to_string(),
            })?;
        let task = record
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| DaybookError::TaskNotFound(task_id.to_string()))?;

        let action = if task.completed {
            ExecutionAction::ReopenTask {
                task_id: task_id.to_string(),
            }
        } else {
            ExecutionAction::CompleteTask {
                task_id: task_id.to_string(),
                elapsed: Some(session),
            }
        };

        let transition = self.plans.apply(&plan_id, date, action)?;
        if !transition.completed_execution() {
            return Ok(None);
        }
        self.finish(&plan_id, date).map(Some)
    }

    /// Required tasks still open in the current run.
    pub fn incomplete_required(&self) -> Result<Vec<Task>> {
        let (plan_id, date, _) = self.current()?;
        let plan = self
            .plans
            .plan(&plan_id)
            .ok_or_else(|| DaybookError::PlanNotFound(plan_id.clone()))?;
        Ok(self.plans.incomplete_required_tasks(&plan, date))
    }

    /// Stop the run, booking the session time. Returns the required tasks
    /// that were left open.
    pub fn stop(&mut self) -> Result<Vec<Task>> {
        let left_open = self.incomplete_required()?;
        let (plan_id, date, session) = self.current()?;
        self.plans.stop_plan(&plan_id, date, Some(session))?;
        info!(plan_id = %plan_id, open_required = left_open.len(), "run stopped");
        self.running = None;
        Ok(left_open)
    }

    /// Complete the run, booking the session time.
    pub fn complete(&mut self) -> Result<CompletionSummary> {
        let (plan_id, date, session) = self.current()?;
        self.plans.complete_plan(&plan_id, date, Some(session))?;
        self.finish(&plan_id, date)
    }

    /// Time shown on the timer, including time booked before a resume.
    pub fn elapsed(&self) -> Duration {
        let now = self.plans.clock().now();
        self.running
            .as_ref()
            .map(|r| r.stopwatch.total(now))
            .unwrap_or_default()
    }

    pub fn display(&self) -> String {
        format_duration(self.elapsed())
    }

    fn current(&self) -> Result<(String, NaiveDate, Duration)> {
        let now = self.plans.clock().now();
        let running = self.running.as_ref().ok_or(DaybookError::NoActiveExecution)?;
        Ok((
            running.plan_id.clone(),
            running.date,
            running.stopwatch.session(now),
        ))
    }

    fn finish(&mut self, plan_id: &str, date: NaiveDate) -> Result<CompletionSummary> {
        self.running = None;
        let plan = self
            .plans
            .plan(plan_id)
            .ok_or_else(|| DaybookError::PlanNotFound(plan_id.to_string()))?;
        let elapsed = plan
            .daily_executions
            .get(&date)
            .filter(|r| r.status == ExecutionStatus::Completed)
            .map(ExecutionRecord::elapsed)
            .unwrap_or_default();
        Ok(CompletionSummary {
            progress: self.plans.plan_progress(&plan, date),
            plan_name: plan.name,
            elapsed,
        })
    }
}
