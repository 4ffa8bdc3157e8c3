//! Command line argument parsing
//!
//! Subcommands:
//! - `run`: Run one or more submissions and print their results
//! - `show-config`: Show configuration discovery information

use crate::engine::EngineBackend;
use crate::report::ReportFormat;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "labbox")]
#[command(author = "Labbox Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs untrusted labwork submissions in isolated containers")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run submissions in containers and report their outcome
    Run(RunArgs),
    /// Show configuration discovery information
    ShowConfig,
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Submission archives to run
    #[arg(value_name = "SUBMISSION", required = true)]
    pub submissions: Vec<PathBuf>,

    /// Client identifier passed to the runner
    #[arg(long = "client-id")]
    pub client_id: String,

    /// Assignment identifier passed to the runner
    #[arg(long = "assignment-id")]
    pub assignment_id: String,

    /// Remote test server URI passed to the runner
    #[arg(short = 'e', long = "endpoint", value_name = "URI")]
    pub endpoint: Option<String>,

    /// Let the submission reach the network (isolation is on by default)
    #[arg(long = "no-isolation")]
    pub no_isolation: bool,

    /// Container engine executable (CLI backend)
    #[arg(long = "engine", value_name = "PATH")]
    pub engine: Option<PathBuf>,

    /// How to talk to the container engine
    #[arg(long = "backend", value_enum)]
    pub backend: Option<EngineBackend>,

    /// Image the submission runs in
    #[arg(short = 'i', long = "image")]
    pub image: Option<String>,

    /// Seconds a submission may run before it is stopped
    #[arg(short = 't', long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Report format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<ReportFormat>,

    /// Configuration file path (skips discovery)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }
}
