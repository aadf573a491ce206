//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Point-budget skill tree builder: prerequisites, progression tiers, stackable nodes and layout
#[derive(Parser, Debug)]
#[command(name = "skilltree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Dataset file (overrides config)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub dataset: Option<PathBuf>,

    /// Build file holding the current selection (overrides config)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub build: Option<PathBuf>,

    /// Working directory for the local config (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub work_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show points, stage, stats and acquired techniques
    Status,

    /// Acquire a node
    Buy {
        /// Node id
        id: String,
    },

    /// Give a node back (all levels, if stacked)
    Refund {
        /// Node id
        id: String,
    },

    /// Buy or refund single levels of stackable nodes
    Stack {
        #[command(subcommand)]
        command: StackCommands,
    },

    /// Explain whether a node can be bought or refunded
    Check {
        /// Node id
        id: String,
    },

    /// Clear the selection, keeping the budget
    Reset,

    /// Set the point budget
    Max {
        /// New budget; negative values clamp to 0
        #[arg(allow_negative_numbers = true)]
        points: i64,
    },

    /// Print the current build as JSON
    Export {
        /// Write to file instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Replace the selection with a saved build
    Import {
        /// Build file to import
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Print node positions
    Layout {
        /// Canvas width (default: config)
        #[arg(long)]
        width: Option<f64>,
        /// Canvas height (default: config)
        #[arg(long)]
        height: Option<f64>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show groups and depth rows as a tree
    Tree,

    /// List nodes with their availability
    Nodes {
        /// Only nodes that can be bought now
        #[arg(long)]
        available: bool,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum StackCommands {
    /// Buy the next level
    Buy {
        /// Node id
        id: String,
    },
    /// Refund the last level
    Refund {
        /// Node id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Write a template config file
    Init {
        /// Write to the global config instead of the local one
        #[arg(short, long)]
        global: bool,
    },
    /// Show config file locations
    Path,
}
