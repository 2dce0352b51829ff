use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "daybook")]
#[command(version, about = "A daily journal with routine plans, kept in a local store")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding .daybook/ (defaults to the nearest one above the current directory)
    #[arg(long, global = true, env = "DAYBOOK_DIR", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new daybook in the current directory (or --dir)
    Init,

    /// Show storage usage and totals
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read and write diaries
    Diary(DiaryCommand),

    /// Manage global events and their dates
    Event(EventCommand),

    /// Manage plans and run them
    Plan(PlanCommand),

    /// Manage reusable task texts
    Common(CommonCommand),

    /// Export, import or wipe all data
    Data(DataCommand),

    /// Show or change settings
    Settings(SettingsCommand),
}

#[derive(Args, Debug)]
pub struct DiaryCommand {
    #[command(subcommand)]
    pub action: DiaryAction,
}

#[derive(Subcommand, Debug)]
pub enum DiaryAction {
    /// Show the diary for a date
    Show {
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a major event
    AddEvent {
        text: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Add a to-do
    AddTodo {
        text: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Tick off a to-do
    Done {
        /// To-do ID (or ID prefix)
        id: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Set the reflection text
    Reflect {
        text: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Search every diary for a keyword
    Search {
        keyword: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Totals across all diaries
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy the previous day's major events into a date's diary
    Inherit {
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete the diary for a date
    Delete {
        /// Date as YYYY-MM-DD
        date: String,
    },

    /// List dates that have a diary, newest first
    Dates {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct EventCommand {
    #[command(subcommand)]
    pub action: EventAction,
}

#[derive(Subcommand, Debug)]
pub enum EventAction {
    /// Create a global event
    Create {
        text: String,

        /// Related URL or reference
        #[arg(long, default_value = "")]
        link: String,
    },

    /// Change an event's text or link
    Update {
        /// Event ID (or ID prefix)
        id: String,

        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        link: Option<String>,
    },

    /// Delete an event that is linked to no date
    Delete {
        /// Event ID (or ID prefix)
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// List all events
    List {
        /// Only events linked to this date
        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Link an event to a date
    Link {
        id: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Unlink an event from a date
    Unlink {
        id: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Dates an event is linked to
    Dates {
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Events linked to the previous day but not yet to this one
    Inheritable {
        #[arg(long)]
        date: Option<String>,

        /// Link them all to the date
        #[arg(long)]
        link: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct PlanCommand {
    #[command(subcommand)]
    pub action: PlanAction,
}

#[derive(Subcommand, Debug)]
pub enum PlanAction {
    /// Create a plan
    Create {
        name: String,

        /// Optional task (can be specified multiple times)
        #[arg(long = "task", short = 't')]
        tasks: Vec<String>,

        /// Required task (can be specified multiple times)
        #[arg(long = "required", short = 'r')]
        required: Vec<String>,

        /// Plan status (draft, active, archived)
        #[arg(long, default_value = "active")]
        status: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List plans
    List {
        /// Include archived plans
        #[arg(long)]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a plan and its run on a date
    Show {
        /// Plan ID (or ID prefix)
        id: String,

        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Append a task to a plan
    AddTask {
        id: String,

        text: String,

        /// Mark the task as required
        #[arg(long)]
        required: bool,
    },

    /// Delete a plan and its history
    Delete {
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Archive a plan
    Archive { id: String },

    /// Start today's run of a plan
    Start { id: String },

    /// Toggle a task in a run
    Check {
        /// Plan ID (or ID prefix)
        id: String,

        /// Task number (1-based) or task ID prefix
        task: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Stop a run early
    Stop {
        id: String,

        #[arg(long)]
        date: Option<String>,

        /// Stop even with required tasks open
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Complete a run
    Complete {
        id: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Every run of a plan, newest first
    History {
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Progress of a plan on a date
    Progress {
        id: String,

        #[arg(long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a plain-text report of every plan
    Export {
        /// Date whose runs are reported (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output file (defaults to stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Totals across all plans
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct CommonCommand {
    #[command(subcommand)]
    pub action: CommonAction,
}

#[derive(Subcommand, Debug)]
pub enum CommonAction {
    /// Add a common task
    Add { text: String },

    /// List common tasks
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a common task
    Remove {
        /// Common task ID (or ID prefix)
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct DataCommand {
    #[command(subcommand)]
    pub action: DataAction,
}

#[derive(Subcommand, Debug)]
pub enum DataAction {
    /// Write every collection as one JSON document, or the plan report as text
    Export {
        /// Output file (defaults to stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// json or txt (defaults to the exportFormat setting)
        #[arg(long)]
        format: Option<String>,
    },

    /// Replace collections from an exported document
    Import {
        /// File to import, or "-" for stdin
        file: PathBuf,
    },

    /// Delete all data and restore default settings
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct SettingsCommand {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Show current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change one setting (deviceMode, theme, autoSave, exportFormat)
    Set { field: String, value: String },
}
