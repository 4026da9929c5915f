use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tplug: discover, order and load plugins described by `.teplg` files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Host configuration file (JSON, YAML or TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Directories to scan instead of the configured ones
#[derive(Args, Debug, Default)]
pub struct DirArgs {
    /// Plugin directory; may be repeated
    #[arg(short, long = "dir", value_name = "DIR")]
    pub dirs: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Basic liveness check
    Ping,
    /// List the plugin descriptors that would be discovered
    List {
        #[command(flatten)]
        dirs: DirArgs,
    },
    /// Show every field of one descriptor
    Info {
        /// Path to a .teplg file
        file: PathBuf,
    },
    /// Print the order plugins would be loaded in
    Order {
        #[command(flatten)]
        dirs: DirArgs,
    },
    /// Load every discovered plugin and report the outcome
    Load {
        #[command(flatten)]
        dirs: DirArgs,

        /// Load without starting
        #[arg(long)]
        no_start: bool,

        /// Write the resulting partitions to the state file
        #[arg(long)]
        save_state: bool,
    },
}
