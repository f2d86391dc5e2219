//! Loop state inspection and reset: `looper status`, `history`, `reset`.

use anyhow::Result;
use console::style;
use std::path::Path;

use super::open_workspace;

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use looper::config::Config;
    use looper::snapshot::SnapshotStore;

    let vcs = open_workspace(project_dir)?;
    let config = Config::new(vcs.root().to_path_buf())?;
    let store = SnapshotStore::new(config.state_file.clone());
    let snapshot = store.read()?;

    println!();
    println!("Looper Status");
    println!("=============");
    println!();
    println!("Root:      {}", config.root.display());
    if store.exists() {
        println!("State:     {}", config.state_file.display());
    } else {
        println!("State:     none yet (fresh start)");
    }
    println!("Phase:     {}", style(snapshot.phase).yellow().bold());
    println!("Iteration: {}", snapshot.iteration);
    println!("Updated:   {}", snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));

    if let Some(ref plan) = snapshot.plan {
        println!();
        println!("Plan: {}", style(&plan.task).cyan());
        let done = &snapshot.build_state.steps_completed;
        for step in &plan.steps {
            let mark = if done.iter().any(|d| d == step) {
                style("[x]").green()
            } else {
                style("[ ]").dim()
            };
            println!("  {} {}", mark, step);
        }
    }

    if !snapshot.build_state.steps_completed.is_empty() {
        println!();
        println!(
            "Steps completed: {}",
            snapshot.build_state.steps_completed.len()
        );
    }

    if !snapshot.build_state.blockers.is_empty() {
        println!();
        println!("Blockers:");
        for blocker in &snapshot.build_state.blockers {
            println!("  - {}", style(blocker).red());
        }
    }

    if let Some(ref feedback) = snapshot.review_state.last_feedback {
        println!();
        println!("Last review: {}", feedback);
    }
    if !snapshot.review_state.issues.is_empty() {
        println!("Issues:");
        for issue in &snapshot.review_state.issues {
            println!("  - {}", style(issue).yellow());
        }
    }

    if let Some(last) = snapshot.last_entry() {
        println!();
        println!(
            "Last transition: {} -> {} ({})",
            last.phase, last.transition, last.reason
        );
    }

    let fallbacks = snapshot.fallback_count();
    if fallbacks > 0 {
        println!(
            "Fallbacks: {} total, {} in a row",
            fallbacks,
            snapshot.trailing_fallbacks()
        );
    }

    if snapshot.is_complete() {
        println!();
        println!("{}", style("Loop complete. Run 'looper reset' to start over.").green());
    }
    println!();

    Ok(())
}

pub fn cmd_history(project_dir: &Path, limit: Option<usize>) -> Result<()> {
    use looper::config::Config;
    use looper::snapshot::SnapshotStore;

    let vcs = open_workspace(project_dir)?;
    let config = Config::new(vcs.root().to_path_buf())?;
    let snapshot = SnapshotStore::new(config.state_file.clone()).read()?;

    if snapshot.history.is_empty() {
        println!("No transitions yet.");
        return Ok(());
    }

    let skip = limit
        .map(|n| snapshot.history.len().saturating_sub(n))
        .unwrap_or(0);

    println!();
    for (i, entry) in snapshot.history.iter().enumerate().skip(skip) {
        let event = entry
            .event
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".to_string());
        let fallback = if entry.fallback {
            format!(" {}", style("[fallback]").yellow())
        } else {
            String::new()
        };
        println!(
            "{:>3}. {}  {:<6} -> {:<6}  {}{}",
            i + 1,
            style(entry.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
            entry.phase.as_str(),
            entry.transition.as_str(),
            style(event).cyan(),
            fallback
        );
        println!("     {}", entry.reason);
    }
    println!();
    println!(
        "Now at iteration {}, phase {}",
        snapshot.iteration, snapshot.phase
    );
    println!();

    Ok(())
}

pub fn cmd_reset(project_dir: &Path, force: bool) -> Result<()> {
    use dialoguer::Confirm;
    use looper::config::Config;
    use looper::snapshot::SnapshotStore;

    let vcs = open_workspace(project_dir)?;
    let config = Config::new(vcs.root().to_path_buf())?;

    if !force {
        let confirm = Confirm::new()
            .with_prompt("This will discard the plan and all history. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    SnapshotStore::new(config.state_file.clone()).reset()?;

    if config.log_dir.exists() {
        std::fs::remove_dir_all(&config.log_dir).ok();
    }

    println!("Reset complete");
    Ok(())
}
