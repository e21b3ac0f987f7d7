use std::path::PathBuf;

use clap::Parser;

/// Ferricom headless front end.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the NES ROM file
    #[arg(required = true)]
    pub rom: PathBuf,

    /// Stop after this many frames (runs until interrupted when omitted)
    #[arg(long)]
    pub frames: Option<u64>,

    /// Print a trace line for every executed instruction
    #[arg(long)]
    pub trace: bool,

    /// Write the final frame to this PNG file before exiting
    #[arg(long)]
    pub screenshot: Option<PathBuf>,

    /// Run as fast as possible instead of pacing to ~60 Hz
    #[arg(long)]
    pub no_pacing: bool,
}
