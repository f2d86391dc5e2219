//! Briefs handed to the agent for each phase.

use crate::machine::{Phase, destination, valid_events};
use crate::snapshot::Snapshot;
use std::fmt::Write;
use std::path::Path;

/// Inputs a brief is built from.
pub struct BriefContext<'a> {
    pub phase: Phase,
    pub snapshot: &'a Snapshot,
    pub target_doc: &'a Path,
    pub commits: &'a [String],
    pub dry_run: bool,
}

pub fn build_brief(ctx: &BriefContext<'_>) -> String {
    let mut brief = String::new();

    let _ = writeln!(
        brief,
        "You are running the {} phase of iteration {} of an autonomous plan/build/review loop.\n",
        ctx.phase, ctx.snapshot.iteration
    );
    let _ = writeln!(brief, "## TARGET DOCUMENT");
    let _ = writeln!(
        brief,
        "Read {} for the overall goal. Work toward it one task at a time.\n",
        ctx.target_doc.display()
    );

    brief.push_str(&commits_section(ctx.commits));
    brief.push_str(&context_section(ctx.phase, ctx.snapshot));
    brief.push_str(&task_section(ctx.phase));

    if ctx.dry_run {
        brief.push_str(
            "## DRY RUN\nDo NOT modify, create or delete any files and do NOT commit. \
             Describe what you would do instead.\n\n",
        );
    }

    brief.push_str(&protocol_section(ctx.phase));
    brief
}

fn commits_section(commits: &[String]) -> String {
    let mut out = String::from("## RECENT COMMITS\n");
    if commits.is_empty() {
        out.push_str("(no commit history)\n");
    } else {
        for commit in commits {
            let _ = writeln!(out, "- {}", commit);
        }
    }
    out.push('\n');
    out
}

fn bullets(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}:", title);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

fn context_section(phase: Phase, snapshot: &Snapshot) -> String {
    let mut out = String::from("## CONTEXT\n");
    let before = out.len();

    match phase {
        Phase::Plan => {
            if let Some(ref feedback) = snapshot.review_state.last_feedback {
                let _ = writeln!(out, "Last review feedback: {}", feedback);
            }
            bullets(&mut out, "Open review issues", &snapshot.review_state.issues);
            bullets(&mut out, "Previous blockers", &snapshot.build_state.blockers);
        }
        Phase::Build => {
            if let Some(ref plan) = snapshot.plan {
                let _ = writeln!(out, "Task: {}", plan.task);
                bullets(&mut out, "Files", &plan.files);
                bullets(&mut out, "Steps", &plan.steps);
                bullets(&mut out, "Acceptance criteria", &plan.acceptance_criteria);
            }
            bullets(
                &mut out,
                "Steps already completed",
                &snapshot.build_state.steps_completed,
            );
            bullets(&mut out, "Unresolved blockers", &snapshot.build_state.blockers);
            bullets(&mut out, "Review issues to fix", &snapshot.review_state.issues);
        }
        Phase::Review => {
            if let Some(ref plan) = snapshot.plan {
                let _ = writeln!(out, "Task: {}", plan.task);
                bullets(&mut out, "Acceptance criteria", &plan.acceptance_criteria);
            }
            bullets(
                &mut out,
                "Steps completed",
                &snapshot.build_state.steps_completed,
            );
        }
        Phase::End => {}
    }

    if out.len() == before {
        out.push_str("(nothing carried over)\n");
    }
    out.push('\n');
    out
}

fn task_section(phase: Phase) -> String {
    let task = match phase {
        Phase::Plan => {
            "Pick the next task toward the target document and write a concrete plan for it. \
             If the target is already fully met, say so."
        }
        Phase::Build => {
            "Implement the plan. Run the project's checks and tests. Commit finished work. \
             Record what you completed and anything that blocks you."
        }
        Phase::Review => {
            "Review the work against the acceptance criteria. Run the checks yourself. \
             Decide whether it is approved, needs fixes or must be replanned."
        }
        Phase::End => "The loop is complete. Do nothing.",
    };
    format!("## TASK\n{}\n\n", task)
}

fn artifact_format(phase: Phase) -> &'static str {
    match phase {
        Phase::Plan => {
            "<plan>\n<task>one line</task>\n<files>\n- path/to/file\n</files>\n\
             <steps>\n1. first step\n</steps>\n\
             <acceptance_criteria>\n- observable criterion\n</acceptance_criteria>\n</plan>"
        }
        Phase::Build => {
            "<build_progress>\n<steps_completed>\n- step you finished\n</steps_completed>\n\
             <blockers>\n- anything stopping you (leave empty if none)\n</blockers>\n</build_progress>"
        }
        Phase::Review => {
            "<review>\n<feedback>summary of the review</feedback>\n\
             <issues>\n- concrete problem to fix\n</issues>\n</review>"
        }
        Phase::End => "",
    }
}

fn protocol_section(phase: Phase) -> String {
    let mut out = String::from("## OUTPUT PROTOCOL\nEnd your answer with:\n\n");
    let format = artifact_format(phase);
    if !format.is_empty() {
        let _ = writeln!(out, "{}\n", format);
    }
    out.push_str("<transition to=\"EVENT\" reason=\"why\" />\n\n");
    out.push_str("EVENT must be one of:\n");
    for event in valid_events(phase) {
        if let Some(to) = destination(phase, event) {
            let _ = writeln!(out, "- {} (goes to {})", event, to);
        }
    }
    out.push_str(
        "\nEmit exactly one transition tag. Without one the loop continues in BUILD.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Plan, ReviewState};

    fn brief_for(phase: Phase, snapshot: &Snapshot, dry_run: bool) -> String {
        build_brief(&BriefContext {
            phase,
            snapshot,
            target_doc: Path::new("/repo/docs/plans/feature.md"),
            commits: &["abc1234 add parser".to_string()],
            dry_run,
        })
    }

    #[test]
    fn test_brief_includes_target_commits_and_events() {
        let brief = brief_for(Phase::Plan, &Snapshot::default(), false);
        assert!(brief.contains("/repo/docs/plans/feature.md"));
        assert!(brief.contains("- abc1234 add parser"));
        assert!(brief.contains("<plan>"));
        assert!(brief.contains("- START_BUILD (goes to BUILD)"));
        assert!(brief.contains("- SKIP_TO_REVIEW (goes to REVIEW)"));
        assert!(brief.contains("- NOTHING_TO_DO (goes to END)"));
        assert!(!brief.contains("APPROVED"));
        assert!(!brief.contains("## DRY RUN"));
    }

    #[test]
    fn test_plan_brief_carries_review_feedback() {
        let mut snapshot = Snapshot::default();
        snapshot.review_state = ReviewState {
            last_feedback: Some("tests are flaky".to_string()),
            issues: vec!["retry logic".to_string()],
        };
        let brief = brief_for(Phase::Plan, &snapshot, false);
        assert!(brief.contains("Last review feedback: tests are flaky"));
        assert!(brief.contains("- retry logic"));
    }

    #[test]
    fn test_build_brief_carries_plan() {
        let mut snapshot = Snapshot::default();
        snapshot.phase = Phase::Build;
        snapshot.plan = Some(Plan {
            task: "Add login".to_string(),
            files: vec!["src/auth.rs".to_string()],
            steps: vec!["write handler".to_string()],
            acceptance_criteria: vec!["login works".to_string()],
        });
        let brief = brief_for(Phase::Build, &snapshot, false);
        assert!(brief.contains("Task: Add login"));
        assert!(brief.contains("- src/auth.rs"));
        assert!(brief.contains("<build_progress>"));
        assert!(brief.contains("- IMPLEMENTATION_DONE (goes to REVIEW)"));
    }

    #[test]
    fn test_review_brief_lists_review_events() {
        let brief = brief_for(Phase::Review, &Snapshot::default(), false);
        for event in ["APPROVED", "NEEDS_FIXES", "REJECTED", "NEXT_ITERATION", "MORE_REVIEW"] {
            assert!(brief.contains(event), "missing {}", event);
        }
        assert!(brief.contains("(nothing carried over)"));
    }

    #[test]
    fn test_dry_run_forbids_edits() {
        let brief = brief_for(Phase::Build, &Snapshot::default(), true);
        assert!(brief.contains("## DRY RUN"));
        assert!(brief.contains("Do NOT modify"));
    }

    #[test]
    fn test_empty_history_is_stated() {
        let brief = build_brief(&BriefContext {
            phase: Phase::Plan,
            snapshot: &Snapshot::default(),
            target_doc: Path::new("target.md"),
            commits: &[],
            dry_run: false,
        });
        assert!(brief.contains("(no commit history)"));
    }
}
