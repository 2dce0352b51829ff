use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaybookError {
    #[error("Not in a daybook directory. Run 'daybook init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .daybook/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Failed to save '{key}': {reason}")]
    StorageWrite { key: String, reason: String },

    #[error("Storage quota exceeded writing '{key}': {needed} bytes needed, {quota} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    #[error("Invalid import file: {0}")]
    InvalidImportFormat(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("No execution of plan {plan_id} on {date}")]
    ExecutionNotFound { plan_id: String, date: String },

    #[error("No plan is running. Start or resume one first.")]
    NoActiveExecution,

    #[error("Cannot {action} an execution that is already {status}")]
    InvalidTransition { action: String, status: String },

    #[error("Use --force to {0} in non-interactive mode")]
    ForceRequired(String),

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DaybookError>;
