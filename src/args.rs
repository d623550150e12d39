//! Command-line argument parsing for the `sftp-session` binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run one file operation against an SFTP server, reconnecting if the link drops
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// Falls back to SFTP_* environment variables when the file does not exist
    #[arg(short, long, default_value = "config.toml", env = "SFTP_SESSION_CONFIG")]
    pub config: String,

    /// Also write logs to this file
    #[arg(long, env = "SFTP_SESSION_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Print session statistics as JSON to stderr on exit
    #[arg(long)]
    pub print_stats: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List a directory relative to the root path
    List {
        path: Option<String>,
    },
    /// Download a file
    Get {
        file: String,
        /// Write to this local file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a file
    Put {
        file: String,
        /// Read from this local file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Remove a file
    Delete {
        file: String,
    },
    /// Check that the server answers
    Ping,
}
