use crate::machine::{Event, Phase};
use crate::signals::{BuildNotes, ReviewNotes};
use crate::snapshot::Plan;
use crate::ui::icons::{
    ARROW, BLOCKER, BUILD, CHECK, CROSS, ISSUE, PLAN, REVIEW, SPARKLE, STEP, WARN,
};
use console::{Emoji, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::Duration;

/// Terminal UI for the driver loop, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Run bar: phase executions used out of the `max_retries` budget
/// - Agent bar: spinner with the current iteration, phase and live agent status
pub struct OrchestratorUI {
    multi: MultiProgress,
    run_bar: ProgressBar,
    agent_bar: ProgressBar,
    verbose: bool,
    iteration: AtomicU32,
    attempt: AtomicU32,
    phase: AtomicU8,
}

fn phase_index(phase: Phase) -> u8 {
    Phase::ALL.iter().position(|p| *p == phase).unwrap_or(0) as u8
}

fn phase_icon(phase: Phase) -> Emoji<'static, 'static> {
    match phase {
        Phase::Plan => PLAN,
        Phase::Build => BUILD,
        Phase::Review => REVIEW,
        Phase::End => SPARKLE,
    }
}

impl OrchestratorUI {
    /// Create the UI sized to the run's phase-execution budget.
    ///
    /// `verbose` enables per-step and thinking lines; otherwise only tool use
    /// and artifacts are printed.
    pub fn new(max_runs: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let run_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let run_bar = multi.add(ProgressBar::new(max_runs));
        run_bar.set_style(run_style);
        run_bar.set_prefix("  Runs");

        let agent_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let agent_bar = multi.add(ProgressBar::new_spinner());
        agent_bar.set_style(agent_style);
        agent_bar.set_prefix(" Agent");

        Self {
            multi,
            run_bar,
            agent_bar,
            verbose,
            iteration: AtomicU32::new(1),
            attempt: AtomicU32::new(1),
            phase: AtomicU8::new(0),
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    fn current_phase(&self) -> Phase {
        Phase::ALL
            .get(self.phase.load(Ordering::SeqCst) as usize)
            .copied()
            .unwrap_or_default()
    }

    fn status_prefix(&self) -> String {
        format!(
            "Iteration {} {} {}",
            style(self.iteration.load(Ordering::SeqCst)).cyan(),
            style(self.current_phase()).yellow().bold(),
            style(format!("#{}", self.attempt.load(Ordering::SeqCst))).dim()
        )
    }

    /// Print the run banner before the first phase.
    pub fn print_header(&self, target_doc: &Path, phase: Phase, iteration: u32, dry_run: bool) {
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{} Looping on {}",
            style("▶").green().bold(),
            style(target_doc.display()).yellow().bold()
        ));
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{}  iteration {}, phase {}",
            style("Resume:").dim(),
            iteration,
            phase
        ));
        if dry_run {
            self.print_line(format!(
                "{}  {}",
                style("Mode:").dim(),
                style("dry run (no edits)").yellow()
            ));
        }
        self.print_line("");
    }

    /// Record the phase about to execute and start the spinner.
    pub fn start_phase(&self, iteration: u32, phase: Phase, attempt: u32) {
        self.iteration.store(iteration, Ordering::SeqCst);
        self.attempt.store(attempt, Ordering::SeqCst);
        self.phase.store(phase_index(phase), Ordering::SeqCst);
        self.run_bar.set_message(format!(
            "{}{}",
            phase_icon(phase),
            style(phase).yellow()
        ));
        self.agent_bar.reset();
        self.agent_bar.set_message(format!(
            "{} {}",
            self.status_prefix(),
            style("(starting...)").dim()
        ));
        self.agent_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    /// Update the spinner with a short status string; printed too in verbose mode.
    pub fn log_step(&self, msg: &str) {
        self.agent_bar.set_message(format!(
            "{} {}",
            self.status_prefix(),
            style(format!("({})", msg)).dim()
        ));
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    /// Refresh the spinner with wall-clock time spent in the current invocation.
    pub fn update_elapsed(&self, elapsed: Duration) {
        let secs = elapsed.as_secs();
        let time_str = if secs >= 60 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}s", secs)
        };
        self.agent_bar.set_message(format!(
            "{} {}",
            self.status_prefix(),
            style(format!("({})", time_str)).dim()
        ));
    }

    /// Show a tool use event (Read, Write, Edit, Bash, etc.)
    pub fn show_tool_use(&self, emoji: &str, description: &str) {
        self.agent_bar.set_message(format!(
            "{} {} {}",
            self.status_prefix(),
            emoji,
            style(description).yellow()
        ));
        self.print_line(format!("    {} {}", emoji, style(description).yellow()));
    }

    /// Show a brief snippet of the agent's text output.
    pub fn show_thinking(&self, snippet: &str) {
        self.agent_bar.set_message(format!(
            "{} {}",
            self.status_prefix(),
            style(format!("💭 {}", snippet)).dim()
        ));
        if self.verbose {
            self.print_line(format!(
                "    {} {}",
                style("💭").dim(),
                style(snippet).dim()
            ));
        }
    }

    pub fn show_plan(&self, plan: &Plan) {
        self.print_line(format!(
            "    {}Plan: {}",
            PLAN,
            style(&plan.task).cyan().bold()
        ));
        for (i, step) in plan.steps.iter().enumerate() {
            self.print_line(format!("      {}. {}", i + 1, step));
        }
    }

    pub fn show_build_notes(&self, notes: &BuildNotes) {
        for step in &notes.steps_completed {
            self.print_line(format!("    {}{}", STEP, style(step).green()));
        }
        // Blockers are important - always show
        for blocker in &notes.blockers {
            self.print_line(format!(
                "    {}{}",
                BLOCKER,
                style(format!("Blocker: {}", blocker)).red().bold()
            ));
        }
    }

    pub fn show_review_notes(&self, notes: &ReviewNotes) {
        if !notes.feedback.is_empty() {
            self.print_line(format!("    {}{}", REVIEW, style(&notes.feedback).dim()));
        }
        for issue in &notes.issues {
            self.print_line(format!("    {}{}", ISSUE, style(issue).yellow()));
        }
    }

    /// Finish the spinner with the applied transition and advance the run bar.
    pub fn phase_complete(&self, from: Phase, to: Phase, event: &Event) {
        self.run_bar.inc(1);
        let marker = if event.is_fallback() { WARN } else { CHECK };
        self.agent_bar.finish_with_message(format!(
            "{}{} {}{} via {}",
            marker,
            style(from).yellow(),
            ARROW,
            style(to).green().bold(),
            style(event.kind).cyan()
        ));
        self.print_line(format!(
            "    {} {}",
            style("Reason:").dim(),
            style(&event.reason).dim()
        ));
        if event.is_fallback() {
            self.print_line(format!(
                "    {}{}",
                WARN,
                style("No usable transition directive; defaulted to BUILD").yellow()
            ));
        }
    }

    /// Finish the spinner with an error; the run bar still advances, the attempt counts.
    pub fn phase_failed(&self, phase: Phase, reason: &str) {
        self.run_bar.inc(1);
        self.agent_bar.finish_with_message(format!(
            "{}{} failed: {}",
            CROSS,
            style(phase).red().bold(),
            reason
        ));
    }

    pub fn loop_complete(&self, iteration: u32) {
        self.run_bar.finish_with_message(format!("{}", style("done").green()));
        self.print_line(format!(
            "\n{}Loop reached END after {} iteration(s)\n",
            SPARKLE,
            style(iteration).green().bold()
        ));
    }

    pub fn budget_exhausted(&self, phase: Phase, runs: u32) {
        self.run_bar.abandon_with_message(format!("{}", style("budget exhausted").red()));
        self.print_line(format!(
            "\n{}Stopped in {} after {} phase execution(s); state is saved, rerun to resume\n",
            WARN,
            style(phase).yellow().bold(),
            runs
        ));
    }
}
