use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, ExecutionRecord};

/// Lifecycle of a plan definition, independent of any day's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Draft,
    #[default]
    Active,
    Archived,
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStatus::Draft => write!(f, "draft"),
            PlanStatus::Active => write!(f, "active"),
            PlanStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PlanStatus::Draft),
            "active" => Ok(PlanStatus::Active),
            "archived" => Ok(PlanStatus::Archived),
            _ => Err(format!("Invalid plan status: {}", s)),
        }
    }
}

/// A step of a plan.
///
/// On the plan template `completed` and `completed_at` stay at their
/// defaults; each day's execution works on its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub completed: bool,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl Task {
    pub fn new(text: String, required: bool) -> Self {
        Self {
            id: new_id(),
            text,
            required,
            completed: false,
            completed_at: None,
        }
    }

    /// A copy with completion cleared, for a new day's snapshot.
    pub fn reset(&self) -> Self {
        Self {
            completed: false,
            completed_at: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Empty until the plan is first saved
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub daily_executions: BTreeMap<NaiveDate, ExecutionRecord>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Plan {
    pub fn new(name: String) -> Self {
        Self {
            id: String::new(),
            name,
            tasks: Vec::new(),
            status: PlanStatus::default(),
            daily_executions: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

/// Reusable task text, independent of any plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonTask {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl CommonTask {
    pub fn new(text: String, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            text,
            created_at: now,
        }
    }
}
