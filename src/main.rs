use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use looper::machine::Phase;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "looper")]
#[command(version, about = "Autonomous plan/build/review loop around a coding agent")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory inside the repository to operate on (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the loop until END or the execution budget is spent
    Run(RunArgs),
    /// Show the current phase, iteration and plan
    Status,
    /// Show the transition history
    History {
        /// Only show the most recent N transitions
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Discard all loop state and start over at PLAN
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args, Clone, Default)]
pub struct RunArgs {
    /// Force the phase the run starts in (PLAN, BUILD, REVIEW, END)
    #[arg(long)]
    pub start_phase: Option<Phase>,

    /// Maximum phase executions for this run, failed attempts included
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Turn budget forwarded to each agent session
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Planning document the agent works toward
    #[arg(long)]
    pub target_doc: Option<PathBuf>,

    /// Ask the agent to plan and report without editing files
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default looper.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    looper::logging::init(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run(args) => cmd::cmd_run(&cli, &project_dir, args).await?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::History { limit } => cmd::cmd_history(&project_dir, *limit)?,
        Commands::Reset { force } => cmd::cmd_reset(&project_dir, *force)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
