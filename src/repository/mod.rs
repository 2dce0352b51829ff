mod diary;
mod plan;

pub use diary::{DiaryRepository, DiaryStatistics};
pub use plan::{PlanProgress, PlanRepository, PlanStatistics};
