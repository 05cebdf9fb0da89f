use std::path::PathBuf;

use clap::Parser;

/// `collectd-sensubility` — a standalone Sensu-compatible monitoring agent.
#[derive(Debug, Parser)]
#[command(name = "collectd-sensubility", version, about)]
pub struct Args {
    /// Select DEBUG-level logging.
    #[arg(long)]
    pub debug: bool,

    /// Select INFO-level logging.
    #[arg(long)]
    pub verbose: bool,

    /// Select ERROR-level logging only.
    #[arg(long)]
    pub silent: bool,

    /// Override the log file path.
    #[arg(long)]
    pub log: Option<PathBuf>,
}
