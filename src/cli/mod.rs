// src/cli/mod.rs
//! CLI definitions for modman
//!
//! Command implementations live in the `commands` module. The same command
//! tree is built with the builder API in `build.rs` to render the man page.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "modman")]
#[command(author = "Modman Contributors")]
#[command(version)]
#[command(about = "Manage modules: discover, enable, disable, upgrade and rebase", long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = modman::config::DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Filesystem root the source descriptors are written under
    #[arg(short, long, global = true)]
    pub root: Option<String>,

    /// Only manage module state, never call the package manager
    #[arg(short = 'n', long, global = true)]
    pub no_pkg: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available modules
    List,

    /// List enabled modules
    ListEnabled {
        /// Also show modules enabled only as requirements
        #[arg(long)]
        show_requirements: bool,
    },

    /// Show full information about a module
    Info {
        /// Module name
        name: String,
    },

    /// Enable a module and everything it requires
    Enable {
        /// Module to enable (NAME, NAME-VERSION or NAME-VERSION-RELEASE)
        module: String,

        /// Profile to install (repeatable)
        #[arg(long)]
        profile: Vec<String>,
    },

    /// Disable a module and modules depending on it
    Disable {
        /// Module to disable
        module: String,
    },

    /// Upgrade an enabled module to its newest version
    Upgrade {
        /// Module to upgrade
        module: String,
    },

    /// Switch an enabled module to another version
    Rebase {
        /// Target NAME-VERSION[-RELEASE]
        module: String,
    },

    /// Search available modules
    Search {
        /// Module name or glob (repeatable)
        #[arg(long)]
        name: Vec<String>,

        /// Version comparison, e.g. --version '>=' 2.4
        #[arg(long, num_args = 2, value_names = ["OP", "VERSION"])]
        version: Option<Vec<String>>,

        /// Release comparison, e.g. --release '==' 1
        #[arg(long, num_args = 2, value_names = ["OP", "RELEASE"])]
        release: Option<Vec<String>>,

        /// Required module and stream (repeatable)
        #[arg(long, num_args = 2, value_names = ["NAME", "STREAM"], action = clap::ArgAction::Append)]
        requires: Vec<String>,

        /// License or glob (repeatable)
        #[arg(long)]
        license: Vec<String>,

        /// Complete query as a JSON object
        #[arg(long, conflicts_with_all = ["name", "version", "release", "requires", "license"])]
        json: Option<String>,
    },

    /// Refetch module listings from all sources
    Refresh,

    /// Show counts of available and enabled modules
    Summary,
}
