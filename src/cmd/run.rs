//! The driver loop: `looper run`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use super::super::{Cli, RunArgs};
use super::open_workspace;

pub async fn cmd_run(cli: &Cli, project_dir: &Path, args: &RunArgs) -> Result<()> {
    use console::style;
    use looper::agent::ClaudeAgent;
    use looper::config::{Config, RunOverrides};
    use looper::executor::PhaseExecutor;
    use looper::orchestrator::{Driver, RunOutcome};
    use looper::snapshot::SnapshotStore;
    use looper::ui::OrchestratorUI;

    let vcs = open_workspace(project_dir)?;
    let config = Config::new(vcs.root().to_path_buf())?;
    config.ensure_directories()?;

    for warning in config.toml.validate(&config.root) {
        eprintln!("{} {}", style("warning:").yellow(), warning);
    }

    let settings = config.loop_settings(&RunOverrides {
        max_retries: args.max_retries,
        max_turns: args.max_turns,
        target_doc: args.target_doc.clone(),
        dry_run: args.dry_run,
        start_phase: args.start_phase,
    })?;

    let ui = Arc::new(OrchestratorUI::new(
        u64::from(settings.max_retries),
        cli.verbose,
    ));
    let agent = ClaudeAgent::new(config.agent_cmd.clone()).with_ui(ui.clone());
    let executor = PhaseExecutor::new(Arc::new(agent), vcs)
        .with_verbose(cli.verbose)
        .with_skip_permissions(config.skip_permissions)
        .with_commit_depth(settings.commit_depth)
        .with_transcripts(config.log_dir.clone());

    let driver = Driver::new(
        SnapshotStore::new(config.state_file.clone()),
        Arc::new(executor),
        settings,
    )
    .with_ui(ui);

    let summary = driver.run().await.context("Loop halted")?;

    println!();
    match summary.outcome {
        RunOutcome::Completed => {
            println!(
                "{} Reached END at iteration {} ({} phase execution(s), {} failed)",
                style("✓").green().bold(),
                summary.snapshot.iteration,
                summary.executions,
                summary.failures
            );
        }
        RunOutcome::BudgetExhausted => {
            anyhow::bail!(
                "Execution budget of {} exhausted in phase {} (iteration {}). Run again to resume.",
                summary.executions,
                summary.snapshot.phase,
                summary.snapshot.iteration
            );
        }
    }

    Ok(())
}
