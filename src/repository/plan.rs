use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{format_duration, Clock, SYSTEM_CLOCK};
use crate::entity::{
    new_id, CommonTask, ExecutionAction, ExecutionRecord, ExecutionStatus, Plan, PlanStatus, Task,
    Transition,
};
use crate::error::{DaybookError, Result};
use crate::storage::{KeyValueStore, StoreKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanProgress {
    pub total: usize,
    pub completed: usize,
    /// Whole percent, 0 when the plan has no tasks
    pub percentage: u8,
}

impl PlanProgress {
    fn new(total: usize, completed: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((completed.min(total) as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            total,
            completed,
            percentage,
        }
    }
}

/// Counts by plan status and by execution status.
///
/// Time totals are in milliseconds and come from finished executions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PlanStatistics {
    pub total: usize,
    pub draft: usize,
    pub active: usize,
    pub archived: usize,
    pub executions_active: usize,
    pub executions_completed: usize,
    pub executions_stopped: usize,
    pub total_time: i64,
    pub average_time: i64,
}

/// Plans, their daily executions and the common task list.
pub struct PlanRepository<'a> {
    store: &'a KeyValueStore,
    clock: &'a dyn Clock,
}

impl<'a> PlanRepository<'a> {
    pub fn new(store: &'a KeyValueStore) -> Self {
        Self::with_clock(store, &SYSTEM_CLOCK)
    }

    pub fn with_clock(store: &'a KeyValueStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn clock(&self) -> &'a dyn Clock {
        self.clock
    }

    // ========== Plans ==========

    pub fn plans(&self) -> Vec<Plan> {
        self.store.get_or_default(StoreKey::Plans)
    }

    pub fn plan(&self, id: &str) -> Option<Plan> {
        self.plans().into_iter().find(|p| p.id == id)
    }

    /// Resolve a full id or a unique id prefix.
    pub fn resolve_plan_id(&self, id: &str) -> Result<String> {
        let plans = self.plans();
        if plans.iter().any(|p| p.id == id) {
            return Ok(id.to_string());
        }
        let mut matches = plans.iter().filter(|p| p.id.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Ok(only.id.clone()),
            _ => Err(DaybookError::PlanNotFound(id.to_string())),
        }
    }

    /// A plan needs a name and at least one task, and no task may be blank.
    pub fn validate_plan(plan: &Plan) -> Result<()> {
        if plan.name.trim().is_empty() {
            return Err(DaybookError::Validation(
                "plan name must not be empty".to_string(),
            ));
        }
        if plan.tasks.is_empty() {
            return Err(DaybookError::Validation(
                "plan needs at least one task".to_string(),
            ));
        }
        if plan.tasks.iter().any(|t| t.text.trim().is_empty()) {
            return Err(DaybookError::Validation(
                "every task needs text".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and store `plan`, assigning an id on first save.
    pub fn save_plan(&self, plan: &mut Plan) -> Result<()> {
        Self::validate_plan(plan)?;

        let now = self.clock.now();
        let mut plans = self.plans();
        match plans.iter_mut().find(|p| plan.is_persisted() && p.id == plan.id) {
            Some(existing) => {
                plan.updated_at = Some(now);
                *existing = plan.clone();
            }
            None => {
                plan.id = new_id();
                plan.created_at = Some(now);
                plan.updated_at = Some(now);
                plans.push(plan.clone());
                info!(id = %plan.id, name = %plan.name, "created plan");
            }
        }

        self.store.set(StoreKey::Plans, &plans)
    }

    /// Returns false when no plan has this id.
    pub fn delete_plan(&self, id: &str) -> Result<bool> {
        let mut plans = self.plans();
        let before = plans.len();
        plans.retain(|p| p.id != id);
        if plans.len() == before {
            return Ok(false);
        }
        self.store.set(StoreKey::Plans, &plans)?;
        info!(id, "deleted plan");
        Ok(true)
    }

    pub fn set_plan_status(&self, id: &str, status: PlanStatus) -> Result<Plan> {
        let mut plans = self.plans();
        let plan = plans
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DaybookError::PlanNotFound(id.to_string()))?;
        plan.status = status;
        plan.updated_at = Some(self.clock.now());
        let updated = plan.clone();
        self.store.set(StoreKey::Plans, &plans)?;
        Ok(updated)
    }

    // ========== Executions ==========

    /// Begin a run of plan `id` on `date`, replacing any earlier run that day.
    ///
    /// The task count is not checked here; a plan without tasks yields an
    /// empty run.
    pub fn start_plan(&self, id: &str, date: NaiveDate) -> Result<ExecutionRecord> {
        let mut plans = self.plans();
        let plan = plans
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DaybookError::PlanNotFound(id.to_string()))?;

        let record = ExecutionRecord::start(&plan.tasks, self.clock.millis());
        if plan.daily_executions.insert(date, record.clone()).is_some() {
            debug!(id, %date, "replacing earlier run");
        }
        plan.updated_at = Some(self.clock.now());
        self.store.set(StoreKey::Plans, &plans)?;

        info!(id, %date, tasks = record.tasks.len(), "started plan");
        Ok(record)
    }

    /// Run `action` against the execution of `plan_id` on `date` and persist
    /// the outcome.
    pub fn apply(
        &self,
        plan_id: &str,
        date: NaiveDate,
        action: ExecutionAction,
    ) -> Result<Transition> {
        let mut plans = self.plans();
        let plan = plans
            .iter_mut()
            .find(|p| p.id == plan_id)
            .ok_or_else(|| DaybookError::PlanNotFound(plan_id.to_string()))?;
        let record = plan.daily_executions.get(&date).ok_or_else(|| {
            DaybookError::ExecutionNotFound {
                plan_id: plan_id.to_string(),
                date: date.to_string(),
            }
        })?;

        let transition = record.apply(action, self.clock.millis())?;
        plan.daily_executions
            .insert(date, transition.record.clone());
        plan.updated_at = Some(self.clock.now());
        self.store.set(StoreKey::Plans, &plans)?;

        for event in &transition.events {
            info!(plan_id, %date, ?event, "execution event");
        }
        Ok(transition)
    }

    /// Mark a task done; completing the last open task completes the run.
    pub fn complete_task(&self, plan_id: &str, task_id: &str, date: NaiveDate) -> Result<Transition> {
        self.apply(
            plan_id,
            date,
            ExecutionAction::CompleteTask {
                task_id: task_id.to_string(),
                elapsed: None,
            },
        )
    }

    pub fn reopen_task(&self, plan_id: &str, task_id: &str, date: NaiveDate) -> Result<Transition> {
        self.apply(
            plan_id,
            date,
            ExecutionAction::ReopenTask {
                task_id: task_id.to_string(),
            },
        )
    }

    /// Finish the run. `elapsed` is the caller's active time for the session;
    /// without it the span since start is booked.
    pub fn complete_plan(
        &self,
        id: &str,
        date: NaiveDate,
        elapsed: Option<Duration>,
    ) -> Result<Transition> {
        self.apply(id, date, ExecutionAction::Complete { elapsed })
    }

    /// Abandon the run, booking time the same way as [`Self::complete_plan`].
    pub fn stop_plan(&self, id: &str, date: NaiveDate, elapsed: Option<Duration>) -> Result<Transition> {
        self.apply(id, date, ExecutionAction::Stop { elapsed })
    }

    pub fn plan_execution(&self, plan_id: &str, date: NaiveDate) -> Option<ExecutionRecord> {
        self.plan(plan_id)?.daily_executions.remove(&date)
    }

    /// Every run of the plan, newest first.
    pub fn plan_execution_history(&self, plan_id: &str) -> Vec<(NaiveDate, ExecutionRecord)> {
        match self.plan(plan_id) {
            Some(plan) => plan.daily_executions.into_iter().rev().collect(),
            None => Vec::new(),
        }
    }

    /// Progress on `date`, from that day's run or else the untouched template.
    pub fn plan_progress(&self, plan: &Plan, date: NaiveDate) -> PlanProgress {
        match self.plan_execution(&plan.id, date) {
            Some(record) => PlanProgress::new(record.tasks.len(), record.completed_count()),
            None => PlanProgress::new(plan.tasks.len(), 0),
        }
    }

    /// Required tasks still open on `date`.
    pub fn incomplete_required_tasks(&self, plan: &Plan, date: NaiveDate) -> Vec<Task> {
        match self.plan_execution(&plan.id, date) {
            Some(record) => record
                .tasks
                .into_iter()
                .filter(|t| t.required && !t.completed)
                .collect(),
            None => plan.tasks.iter().filter(|t| t.required).cloned().collect(),
        }
    }

    // ========== Common tasks ==========

    pub fn common_tasks(&self) -> Vec<CommonTask> {
        self.store.get_or_default(StoreKey::CommonTasks)
    }

    pub fn add_common_task(&self, text: &str) -> Result<CommonTask> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DaybookError::Validation(
                "task text must not be empty".to_string(),
            ));
        }
        let mut tasks = self.common_tasks();
        let task = CommonTask::new(text.to_string(), self.clock.now());
        tasks.push(task.clone());
        self.store.set(StoreKey::CommonTasks, &tasks)?;
        Ok(task)
    }

    /// Returns false when no common task has this id, or the prefix
    /// matches more than one.
    pub fn remove_common_task(&self, id: &str) -> Result<bool> {
        let mut tasks = self.common_tasks();
        let index = match tasks.iter().position(|t| t.id == id) {
            Some(index) => index,
            None => {
                let mut matches = tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.id.starts_with(id))
                    .map(|(i, _)| i);
                match (matches.next(), matches.next()) {
                    (Some(only), None) => only,
                    _ => return Ok(false),
                }
            }
        };
        tasks.remove(index);
        self.store.set(StoreKey::CommonTasks, &tasks)?;
        Ok(true)
    }

    // ========== Statistics ==========

    pub fn statistics(&self) -> PlanStatistics {
        let plans = self.plans();
        let mut stats = PlanStatistics {
            total: plans.len(),
            ..PlanStatistics::default()
        };

        for plan in &plans {
            match plan.status {
                PlanStatus::Draft => stats.draft += 1,
                PlanStatus::Active => stats.active += 1,
                PlanStatus::Archived => stats.archived += 1,
            }
            for record in plan.daily_executions.values() {
                match record.status {
                    ExecutionStatus::Active => stats.executions_active += 1,
                    ExecutionStatus::Completed => stats.executions_completed += 1,
                    ExecutionStatus::Stopped => stats.executions_stopped += 1,
                }
                if record.status.is_terminal() {
                    stats.total_time = stats.total_time.saturating_add(record.total_time);
                }
            }
        }

        let finished = stats.executions_completed + stats.executions_stopped;
        if finished > 0 {
            stats.average_time = stats.total_time / finished as i64;
        }
        stats
    }

    // ========== Report ==========

    /// Plain-text report of every plan as it stands on `date`.
    ///
    /// Task marks and progress come from that day's run when there is one.
    /// Time is the run's booked time plus the total over all runs.
    pub fn text_report(&self, date: NaiveDate) -> String {
        let mut out = String::from("# Plans\n\n");

        for (index, plan) in self.plans().iter().enumerate() {
            out.push_str(&format!("## {}. {}\n\n", index + 1, plan.name));
            out.push_str(&format!("Status: {}\n\n", plan.status));

            let run = plan.daily_executions.get(&date);
            let tasks = run.map_or(plan.tasks.as_slice(), |r| r.tasks.as_slice());
            if !tasks.is_empty() {
                out.push_str(&format!("### Tasks ({})\n", date));
                for (n, task) in tasks.iter().enumerate() {
                    let mark = if task.completed { '✓' } else { '○' };
                    let required = if task.required { " (required)" } else { "" };
                    out.push_str(&format!("{}. {} {}{}\n", n + 1, mark, task.text, required));
                }
                out.push('\n');
            }

            let progress = match run {
                Some(record) => PlanProgress::new(record.tasks.len(), record.completed_count()),
                None => PlanProgress::new(plan.tasks.len(), 0),
            };
            out.push_str(&format!(
                "Progress: {}/{} ({}%)\n\n",
                progress.completed, progress.total, progress.percentage
            ));

            if let Some(record) = run.filter(|r| r.total_time > 0) {
                out.push_str(&format!("Time: {}\n", format_duration(record.elapsed())));
            }
            let total = plan
                .daily_executions
                .values()
                .fold(0i64, |sum, r| sum.saturating_add(r.total_time.max(0)));
            if total > 0 {
                out.push_str(&format!(
                    "Total time: {} over {} run(s)\n",
                    format_duration(Duration::from_millis(total as u64)),
                    plan.daily_executions.len()
                ));
            }
            if total > 0 || run.is_some_and(|r| r.total_time > 0) {
                out.push('\n');
            }

            out.push_str("---\n\n");
        }

        out.push_str(&format!(
            "Exported at: {}\n",
            self.clock.now().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out
    }
}
