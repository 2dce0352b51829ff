mod diary;
mod event;
mod execution;
mod plan;

pub use diary::{CompletedItem, Diary, DiaryItem};
pub use event::GlobalEvent;
pub use execution::{
    ExecutionAction, ExecutionEvent, ExecutionRecord, ExecutionStatus, Transition,
};
pub use plan::{CommonTask, Plan, PlanStatus, Task};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use uuid::Uuid;

/// Every diary, keyed by date.
pub type DiaryMap = BTreeMap<NaiveDate, Diary>;

/// Every global event, keyed by id.
pub type EventMap = BTreeMap<String, GlobalEvent>;

/// Event ids linked to each date.
pub type AssociationMap = BTreeMap<NaiveDate, Vec<String>>;

/// Generate a fresh entity id.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}
