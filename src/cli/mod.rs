mod commands;
mod handlers;

pub use commands::{
    Cli, CommonAction, CommonCommand, Commands, DataAction, DataCommand, DiaryAction,
    DiaryCommand, EventAction, EventCommand, PlanAction, PlanCommand, SettingsAction,
    SettingsCommand,
};
pub use handlers::{
    handle_common, handle_data, handle_diary, handle_event, handle_info, handle_init, handle_plan,
    handle_settings,
};
