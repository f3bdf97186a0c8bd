use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "graph-garden")]
#[command(version)]
#[command(about = "Install and supervise a local ArangoDB instance", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List installable ArangoDB versions, oldest first
    ListVersions {
        /// Re-scrape the download index instead of using the cached list
        #[arg(long)]
        clear_cache: bool,
    },

    /// Download and unpack an ArangoDB binary distribution
    Install {
        /// Install directory (default: ~/.arangodb)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Version to install (default: latest)
        #[arg(long)]
        version: Option<String>,
    },

    /// Start the daemon and wait until it is healthy
    Start {
        /// Install root or starter binary path
        #[arg(long)]
        exe_path: Option<PathBuf>,

        /// Daemon data directory
        #[arg(long)]
        data_path: Option<PathBuf>,

        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Discard the starter's stdout/stderr
        #[arg(long)]
        quiet: bool,

        /// Fail if the daemon is not healthy after this many seconds
        /// (default: wait forever)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Stop a running daemon by terminating its owning ancestor
    Stop,

    /// Probe the daemon; exit code 0 = running, 1 = not running
    IsRunning(EndpointArgs),
}

#[derive(Args)]
pub(crate) struct EndpointArgs {
    /// Connection URI (default: http://localhost:8529)
    #[arg(long)]
    pub connection_uri: Option<String>,

    /// Database to authenticate against
    #[arg(long, default_value = "_system")]
    pub database: String,

    #[arg(long, default_value = "root")]
    pub username: String,

    #[arg(long, default_value = "")]
    pub password: String,
}
