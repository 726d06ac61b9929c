use anyhow::Result;
use clap::Parser;

mod cli;
mod rotation_cmds;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let format = cli.format;
    let manager = rotation_cmds::open_manager(cli.file.as_deref(), cli.maps_dir.as_deref())?;

    match cli.command {
        Commands::Status => rotation_cmds::handle_status(&manager, format),
        Commands::Peek { rotation } => rotation_cmds::handle_peek(&manager, &rotation, format),
        Commands::Pop { rotation } => rotation_cmds::handle_pop(&manager, &rotation, format),
        Commands::Advance { rotation, steps } => {
            rotation_cmds::handle_advance(&manager, &rotation, steps, format)
        }
        Commands::Select { players, pop } => {
            rotation_cmds::handle_select(&manager, players, pop, format)
        }
        Commands::SetPosition { rotation, position } => {
            rotation_cmds::handle_set_position(&manager, &rotation, position, format)
        }
        Commands::SetNext { rotation, map } => {
            rotation_cmds::handle_set_next(&manager, &rotation, &map, format)
        }
    }
}
