//! Command-line interface definitions for decksim.

use std::path::PathBuf;

use clap::Parser;
use logging::LogArgs;

/// Command-line interface for the `decksim` binary.
#[derive(Parser, Debug)]
#[command(
    name = "decksim",
    about = "Exercise a deck configuration against a simulated terminal deck",
    version
)]
pub struct Cli {
    /// Logging controls shared across deckd binaries.
    #[command(flatten)]
    pub log: LogArgs,

    /// Path to the deck configuration (defaults to ~/.streamdeck-config.json).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Edge length of each simulated tile in pixels.
    #[arg(long, default_value_t = 72, value_name = "PX")]
    pub pixels: u32,

    /// Tile columns on the simulated deck.
    #[arg(long, default_value_t = 5)]
    pub cols: u32,

    /// Tile rows on the simulated deck.
    #[arg(long, default_value_t = 3)]
    pub rows: u32,

    /// Page shown at startup, counted from 1.
    #[arg(long, default_value_t = 1, value_name = "N")]
    pub page: usize,

    /// Write every tile image to `DIR/tile-<index>.png` as it is pushed.
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Log commands, keybinds and URLs instead of launching them.
    #[arg(long)]
    pub dry_run: bool,

    /// Shell used to launch commands.
    #[arg(long, default_value = "/bin/sh", value_name = "PATH")]
    pub shell: String,

    /// Command prefix for keybind presses.
    #[arg(long, default_value = deckd_engine::DEFAULT_KEYBIND_COMMAND)]
    pub keybind_command: String,

    /// Command prefix for URL presses.
    #[arg(long, default_value = deckd_engine::DEFAULT_URL_COMMAND)]
    pub url_command: String,
}
