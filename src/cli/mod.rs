//! CLI module for the ClaimIQ API

pub mod serve;

use clap::{Parser, Subcommand};

/// ClaimIQ API - backend bootstrap service
#[derive(Parser)]
#[command(name = "claimiq-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server
    Serve,
}
