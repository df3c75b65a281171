//! Command-line interface for mapmark.
//!
//! This module provides the CLI structure and command handlers for the
//! `mapmark` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{AddCommand, ClearCommand, ConfigCommand, ListCommand, OutputFormat, StatusCommand};

/// mapmark - Named, colored map markers that survive restarts
///
/// Manages the marker database used by the map-annotation app: add markers,
/// list what is stored, inspect decode diagnostics, and reset the store.
#[derive(Debug, Parser)]
#[command(name = "mapmark")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a marker and persist it
    Add(AddCommand),

    /// List stored markers
    List(ListCommand),

    /// Remove all stored markers
    Clear(ClearCommand),

    /// Show store status and decode diagnostics
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
