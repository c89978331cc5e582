//! Command line interface.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Log in to cloud machines through a bastion host.
///
/// TARGET is an ordinal from the last listing, an address, an instance id
/// or search text.
#[derive(Debug, Parser)]
#[command(name = "jumpline", version, about)]
pub struct Cli {
    /// Config file (default: <config dir>/jumpline/config.toml).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bastion host, overriding config and environment.
    #[arg(long, global = true, value_name = "HOST")]
    pub jump: Option<String>,

    /// Drop the cached inventory and result list first.
    #[arg(long, global = true)]
    pub refresh: bool,

    /// More logging (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// What to do instead of logging in.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Machine to log in to.
    pub target: Option<String>,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List machines matching a query and remember their numbers.
    Find {
        /// Text to search for.
        query: String,

        /// Search autoscaling groups and list their members.
        #[arg(long)]
        asg: bool,
    },
    /// Drop the cached inventory and result list, refetching if possible.
    Refresh,
}
