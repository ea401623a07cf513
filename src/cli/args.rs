use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{SESSIONS_ENV, SOCKET_ENV};

#[derive(Parser, Debug)]
#[command(name = "tss")]
#[command(version, about = "Save and restore tmux session layouts", long_about = None)]
pub struct Args {
    /// Directory holding session scripts
    #[arg(short, long, global = true, env = SESSIONS_ENV)]
    pub dir: Option<PathBuf>,

    /// tmux socket name (tmux -L)
    #[arg(short = 'L', long, global = true, env = SOCKET_ENV)]
    pub socket: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List session scripts
    Ls {
        /// Only show the script with this name
        filter: Option<String>,
    },

    /// List session scripts whose session is running
    Ps,

    /// Restore a session from its script and attach to it
    Run { name: String },

    /// Capture a running session into its script
    Save {
        /// Session to capture (default: the current one)
        session: Option<String>,
    },

    /// Show the captured window layout of a session
    Windows {
        /// Session to inspect (default: the current one)
        session: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create an empty session script
    New { name: String },

    /// Remove a session script
    Rm { name: String },

    /// Open a session script in $EDITOR
    Edit { name: String },

    /// Show version
    Version,
}
