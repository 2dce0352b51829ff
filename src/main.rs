use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use daybook::cli::{
    handle_common, handle_data, handle_diary, handle_event, handle_info, handle_init, handle_plan,
    handle_settings, Cli, Commands,
};
use daybook::config::resolve_root;

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => handle_init(cli.dir),
        Commands::Info { json } => handle_info(&resolve_root(cli.dir), json),
        Commands::Diary(cmd) => handle_diary(&resolve_root(cli.dir), cmd.action),
        Commands::Event(cmd) => handle_event(&resolve_root(cli.dir), cmd.action),
        Commands::Plan(cmd) => handle_plan(&resolve_root(cli.dir), cmd.action),
        Commands::Common(cmd) => handle_common(&resolve_root(cli.dir), cmd.action),
        Commands::Data(cmd) => handle_data(&resolve_root(cli.dir), cmd.action),
        Commands::Settings(cmd) => handle_settings(&resolve_root(cli.dir), cmd.action),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
