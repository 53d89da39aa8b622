//! CLI module for docflow
//!
//! Provides subcommands:
//! - `serve`: run the workflow engine with health and metrics endpoints
//! - `status`: print the persisted snapshot of one workflow
//! - `list`: list a tenant's workflows

pub mod inspect;
pub mod serve;

use clap::{Parser, Subcommand};

/// docflow - durable document-analysis workflows
#[derive(Parser)]
#[command(name = "docflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the engine, resuming persisted workflows
    Serve,

    /// Show one workflow's persisted state
    Status(inspect::StatusArgs),

    /// List workflows for a tenant
    List(inspect::ListArgs),
}
