//! Command line interface definition

use clap::{ArgAction, Parser, Subcommand};
use rapt_config::DownloadMethod;
use std::path::PathBuf;

/// rapt - Parallel download front end for APT
#[derive(Parser)]
#[command(name = "rapt")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parallel download front end for APT")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Maximum number of concurrent downloads
    #[arg(short = 'j', long = "parallel", global = true, value_name = "N")]
    pub parallel: Option<usize>,

    /// Assume yes to the confirmation prompt
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// Increase verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Transport strategy for fetching archives
    #[arg(long, global = true, value_enum, value_name = "METHOD")]
    pub download_method: Option<DownloadMethod>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Install packages, fetching their archives in parallel first
    #[command(alias = "i")]
    Install {
        /// Package names
        packages: Vec<String>,
    },

    /// Remove packages
    #[command(alias = "rm")]
    Remove {
        /// Package names
        packages: Vec<String>,
    },

    /// Upgrade installed packages
    Upgrade,

    /// Upgrade the whole system, allowing installs and removals
    #[command(name = "dist-upgrade", alias = "full-upgrade")]
    DistUpgrade,

    /// Refresh the package indexes
    Update,

    /// Search package descriptions
    #[command(alias = "find")]
    Search {
        /// Search terms
        query: Vec<String>,
    },

    /// Show package records
    Show {
        /// Package names
        packages: Vec<String>,
    },

    /// Hold packages at their current version
    Hold {
        /// Package names
        packages: Vec<String>,
    },

    /// Release held packages
    Unhold {
        /// Package names
        packages: Vec<String>,
    },

    /// List held packages
    Showhold,

    /// Remove downloaded archive files
    Clean,

    /// Remove outdated archive files
    Autoclean,

    /// Anything else is passed through to apt-get with the full pipeline
    #[command(external_subcommand)]
    External(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_parse() {
        let cli = Cli::parse_from(["rapt", "-j", "8", "-y", "-vv", "install", "curl"]);
        assert_eq!(cli.global.parallel, Some(8));
        assert!(cli.global.yes);
        assert_eq!(cli.global.verbose, 2);
        match cli.command {
            Commands::Install { packages } => assert_eq!(packages, ["curl"]),
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_download_method_flag() {
        let cli = Cli::parse_from(["rapt", "--download-method", "aria2", "upgrade"]);
        assert_eq!(cli.global.download_method, Some(DownloadMethod::Aria2));
    }

    #[test]
    fn test_unknown_command_is_external_passthrough() {
        let cli = Cli::parse_from(["rapt", "build-dep", "curl"]);
        match cli.command {
            Commands::External(words) => assert_eq!(words, ["build-dep", "curl"]),
            _ => panic!("expected external passthrough"),
        }
    }
}
