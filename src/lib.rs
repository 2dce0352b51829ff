pub mod cli;
pub mod clock;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod repository;
pub mod storage;
pub mod warnings;

pub use controller::{CompletionSummary, PlanExecutionController};
pub use error::{DaybookError, Result};
pub use repository::{DiaryRepository, PlanRepository};
pub use storage::KeyValueStore;
