use clap::{Parser, Subcommand};
use rota_core::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rota")]
#[command(about = "Map rotations: inspect, select and advance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Rotations file (defaults to $ROTA_ROTATIONS_FILE, then the user config dir)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Directory whose sub-directories are the available maps
    /// (defaults to $ROTA_MAPS_DIR, then the user data dir)
    #[arg(long)]
    pub maps_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every rotation and where its cursor points
    Status,

    /// Show the map a rotation will serve next
    Peek { rotation: String },

    /// Serve the next map of a rotation and advance it
    Pop { rotation: String },

    /// Move a rotation's cursor forward
    Advance {
        rotation: String,

        /// Number of maps to skip
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },

    /// Pick the rotation for the given number of online players
    Select {
        players: u32,

        /// Also serve the next map of the selected rotation
        #[arg(long)]
        pop: bool,
    },

    /// Point a rotation's cursor at a position (wraps around)
    SetPosition { rotation: String, position: usize },

    /// Make a map of the rotation the next one served
    SetNext { rotation: String, map: String },
}
