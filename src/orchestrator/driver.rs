use crate::config::LoopSettings;
use crate::errors::OrchestratorError;
use crate::executor::{PhaseOutcome, PhaseRequest, PhaseRunner, StateUpdate, is_executable};
use crate::machine::apply;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::ui::OrchestratorUI;
use std::sync::Arc;
use tracing::{info, warn};

/// How a run ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The loop reached END.
    Completed,
    /// `max_retries` phase executions were used up; the state is resumable.
    BudgetExhausted,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// The last persisted snapshot.
    pub snapshot: Snapshot,
    /// Phase executions started, failed ones included.
    pub executions: u32,
    /// Executions that ended in an agent error.
    pub failures: u32,
}

/// The main loop: read, execute, transition, write. Strictly sequential.
pub struct Driver {
    store: SnapshotStore,
    runner: Arc<dyn PhaseRunner>,
    settings: LoopSettings,
    ui: Option<Arc<OrchestratorUI>>,
}

impl Driver {
    pub fn new(store: SnapshotStore, runner: Arc<dyn PhaseRunner>, settings: LoopSettings) -> Self {
        Self {
            store,
            runner,
            settings,
            ui: None,
        }
    }

    pub fn with_ui(mut self, ui: Arc<OrchestratorUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Run until END, the execution budget is spent, or a fatal error.
    ///
    /// The snapshot is re-read from disk at the top of every turn. Agent
    /// failures are logged and retried; they count against `max_retries`.
    /// Invalid transitions, storage failures and the fallback limit stop
    /// the run with the last good snapshot left on disk.
    pub async fn run(&self) -> Result<RunSummary, OrchestratorError> {
        self.apply_start_phase()?;

        let mut executions: u32 = 0;
        let mut failures: u32 = 0;
        let mut consecutive_fallbacks: usize = 0;

        if let Some(ref ui) = self.ui {
            let snapshot = self.store.read()?;
            ui.print_header(
                &self.settings.target_doc,
                snapshot.phase,
                snapshot.iteration,
                self.settings.dry_run,
            );
        }

        loop {
            let snapshot = self.store.read()?;

            if !is_executable(snapshot.phase) {
                info!(iteration = snapshot.iteration, "loop reached END");
                if let Some(ref ui) = self.ui {
                    ui.loop_complete(snapshot.iteration);
                }
                return Ok(RunSummary {
                    outcome: RunOutcome::Completed,
                    snapshot,
                    executions,
                    failures,
                });
            }

            if executions >= self.settings.max_retries {
                warn!(
                    executions,
                    phase = %snapshot.phase,
                    "execution budget exhausted"
                );
                if let Some(ref ui) = self.ui {
                    ui.budget_exhausted(snapshot.phase, executions);
                }
                return Ok(RunSummary {
                    outcome: RunOutcome::BudgetExhausted,
                    snapshot,
                    executions,
                    failures,
                });
            }

            executions += 1;
            if let Some(ref ui) = self.ui {
                ui.start_phase(snapshot.iteration, snapshot.phase, executions);
            }

            let request = PhaseRequest {
                snapshot: &snapshot,
                target_doc: &self.settings.target_doc,
                max_turns: self.settings.max_turns,
                dry_run: self.settings.dry_run,
                attempt: executions,
            };

            let outcome = match self.runner.run_phase(&request).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    failures += 1;
                    warn!(
                        iteration = snapshot.iteration,
                        phase = %snapshot.phase,
                        attempt = executions,
                        error = %e,
                        "phase execution failed, retrying"
                    );
                    if let Some(ref ui) = self.ui {
                        ui.phase_failed(snapshot.phase, &e.to_string());
                    }
                    continue;
                }
            };

            let next = self.advance(&snapshot, outcome)?;

            if next.history.last().is_some_and(|e| e.fallback) {
                consecutive_fallbacks += 1;
            } else {
                consecutive_fallbacks = 0;
            }

            let limit = self.settings.max_consecutive_fallbacks;
            if limit > 0 && consecutive_fallbacks >= limit {
                warn!(count = consecutive_fallbacks, "fallback limit reached");
                return Err(OrchestratorError::FallbackLimit {
                    count: consecutive_fallbacks,
                });
            }
        }
    }

    /// Merge the phase's updates, apply the event, persist.
    ///
    /// Nothing is written unless the transition is valid.
    fn advance(&self, snapshot: &Snapshot, outcome: PhaseOutcome) -> Result<Snapshot, OrchestratorError> {
        let PhaseOutcome { event, updates } = outcome;
        self.show_updates(&updates);

        let mut merged = snapshot.clone();
        updates.apply_to(&mut merged);
        let next = apply(&merged, &event)?;
        let written = self.store.write(&next)?;

        info!(
            iteration = written.iteration,
            from = %snapshot.phase,
            to = %written.phase,
            event = %event.kind,
            fallback = event.is_fallback(),
            "transition applied"
        );
        if let Some(ref ui) = self.ui {
            ui.phase_complete(snapshot.phase, written.phase, &event);
        }
        Ok(written)
    }

    fn show_updates(&self, updates: &StateUpdate) {
        let Some(ref ui) = self.ui else {
            return;
        };
        match updates {
            StateUpdate::Plan(Some(plan)) => ui.show_plan(plan),
            StateUpdate::Build(notes) => ui.show_build_notes(notes),
            StateUpdate::Review(notes) => ui.show_review_notes(notes),
            StateUpdate::Plan(None) | StateUpdate::None => {}
        }
    }

    /// A start-phase override is written once, without a history entry.
    fn apply_start_phase(&self) -> Result<(), OrchestratorError> {
        let Some(phase) = self.settings.start_phase else {
            return Ok(());
        };
        let mut snapshot = self.store.read()?;
        if snapshot.phase != phase {
            info!(from = %snapshot.phase, to = %phase, "overriding start phase");
            snapshot.phase = phase;
            self.store.write(&snapshot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use crate::machine::{Event, EventKind, Phase};
    use crate::signals::{BuildNotes, ReviewNotes, fallback_event};
    use crate::snapshot::Plan;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    type Step = Result<PhaseOutcome, AgentError>;

    /// Replays a fixed sequence of outcomes and records the phases it saw.
    struct ScriptedRunner {
        steps: Mutex<VecDeque<Step>>,
        seen: Mutex<Vec<(Phase, u32)>>,
    }

    impl ScriptedRunner {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn phases(&self) -> Vec<Phase> {
            self.seen.lock().unwrap().iter().map(|(p, _)| *p).collect()
        }
    }

    #[async_trait]
    impl PhaseRunner for ScriptedRunner {
        async fn run_phase(&self, request: &PhaseRequest<'_>) -> Result<PhaseOutcome, AgentError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.snapshot.phase, request.attempt));
            self.steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AgentError::Reported {
                    message: "script exhausted".to_string(),
                }))
        }
    }

    fn ok(kind: EventKind, updates: StateUpdate) -> Step {
        Ok(PhaseOutcome {
            event: Event::new(kind, format!("{} chosen", kind)),
            updates,
        })
    }

    fn settings(max_retries: u32) -> LoopSettings {
        LoopSettings {
            max_retries,
            max_turns: 5,
            commit_depth: 10,
            max_consecutive_fallbacks: 3,
            target_doc: PathBuf::from("target.md"),
            dry_run: false,
            start_phase: None,
        }
    }

    fn store(dir: &TempDir) -> SnapshotStore {
        SnapshotStore::new(dir.path().join(".looper/state.json"))
    }

    #[tokio::test]
    async fn test_full_cycle_reaches_end() {
        let dir = tempdir().unwrap();
        let plan = Plan {
            task: "Add X".to_string(),
            acceptance_criteria: vec!["X works".to_string()],
            ..Plan::default()
        };
        let runner = ScriptedRunner::new(vec![
            ok(EventKind::StartBuild, StateUpdate::Plan(Some(plan.clone()))),
            ok(
                EventKind::ImplementationDone,
                StateUpdate::Build(BuildNotes {
                    steps_completed: vec!["wrote X".to_string()],
                    blockers: vec![],
                }),
            ),
            ok(
                EventKind::Approved,
                StateUpdate::Review(ReviewNotes {
                    feedback: "good".to_string(),
                    issues: vec![],
                }),
            ),
        ]);
        let driver = Driver::new(store(&dir), runner.clone(), settings(10));

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.executions, 3);
        assert_eq!(summary.failures, 0);
        assert_eq!(
            runner.phases(),
            vec![Phase::Plan, Phase::Build, Phase::Review]
        );

        let persisted = store(&dir).read().unwrap();
        assert_eq!(persisted.phase, Phase::End);
        assert_eq!(persisted.iteration, 1);
        assert_eq!(persisted.history.len(), 3);
        assert_eq!(persisted.plan, Some(plan));
        assert_eq!(persisted.build_state.steps_completed, vec!["wrote X"]);
        assert_eq!(persisted.review_state.last_feedback.as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn test_next_iteration_increments_and_loops() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new(vec![
            ok(EventKind::SkipToReview, StateUpdate::Plan(None)),
            ok(EventKind::NextIteration, StateUpdate::Review(ReviewNotes::default())),
            ok(EventKind::NothingToDo, StateUpdate::Plan(None)),
        ]);
        let driver = Driver::new(store(&dir), runner, settings(10));

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.snapshot.iteration, 2);
        assert_eq!(summary.snapshot.history.len(), 3);
    }

    #[tokio::test]
    async fn test_agent_failures_are_retried_from_persisted_state() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new(vec![
            Err(AgentError::NonZeroExit { exit_code: 1 }),
            ok(EventKind::NothingToDo, StateUpdate::Plan(None)),
        ]);
        let driver = Driver::new(store(&dir), runner.clone(), settings(5));

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.executions, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(runner.phases(), vec![Phase::Plan, Phase::Plan]);
        let attempts: Vec<u32> = runner.seen.lock().unwrap().iter().map(|(_, a)| *a).collect();
        assert_eq!(attempts, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failures_bounded_by_max_retries() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let driver = Driver::new(store(&dir), runner.clone(), settings(3));

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::BudgetExhausted);
        assert_eq!(summary.executions, 3);
        assert_eq!(summary.failures, 3);
        assert_eq!(runner.phases().len(), 3);
        // No transition happened, so nothing was written
        assert!(!store(&dir).exists());
    }

    #[tokio::test]
    async fn test_invalid_transition_halts_with_snapshot_untouched() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new(vec![
            ok(EventKind::StartBuild, StateUpdate::Plan(None)),
            // APPROVED is only valid from REVIEW
            ok(
                EventKind::Approved,
                StateUpdate::Build(BuildNotes {
                    steps_completed: vec!["should not persist".to_string()],
                    blockers: vec![],
                }),
            ),
        ]);
        let driver = Driver::new(store(&dir), runner, settings(10));

        let on_disk = store(&dir);
        let err = driver.run().await.unwrap_err();
        match err {
            OrchestratorError::InvalidTransition(e) => {
                assert_eq!(e.phase, Phase::Build);
                assert_eq!(e.event, EventKind::Approved);
            }
            other => panic!("Expected InvalidTransition, got {:?}", other),
        }

        let persisted = on_disk.read().unwrap();
        assert_eq!(persisted.phase, Phase::Build);
        assert_eq!(persisted.history.len(), 1);
        assert!(persisted.build_state.steps_completed.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_halts_without_retry() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let runner = ScriptedRunner::new(vec![
            ok(EventKind::StartBuild, StateUpdate::Plan(None)),
            ok(EventKind::ImplementationDone, StateUpdate::None),
        ]);
        let driver = Driver::new(
            SnapshotStore::new(blocker.join("state.json")),
            runner.clone(),
            settings(10),
        );

        let err = driver.run().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Persistence(_)));
        assert_eq!(runner.phases(), vec![Phase::Plan]);
    }

    #[tokio::test]
    async fn test_start_phase_override_without_history() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new(vec![ok(
            EventKind::Approved,
            StateUpdate::Review(ReviewNotes::default()),
        )]);
        let mut s = settings(10);
        s.start_phase = Some(Phase::Review);
        let driver = Driver::new(store(&dir), runner.clone(), s);

        let summary = driver.run().await.unwrap();
        assert_eq!(runner.phases(), vec![Phase::Review]);
        assert_eq!(summary.snapshot.phase, Phase::End);
        assert_eq!(summary.snapshot.history.len(), 1);
        assert_eq!(summary.snapshot.history[0].phase, Phase::Review);
    }

    #[tokio::test]
    async fn test_resumes_from_persisted_phase() {
        let dir = tempdir().unwrap();
        let mut existing = Snapshot::default();
        existing.phase = Phase::Build;
        existing.iteration = 4;
        store(&dir).write(&existing).unwrap();

        let runner = ScriptedRunner::new(vec![
            ok(EventKind::ImplementationDone, StateUpdate::Build(BuildNotes::default())),
            ok(EventKind::Approved, StateUpdate::Review(ReviewNotes::default())),
        ]);
        let driver = Driver::new(store(&dir), runner.clone(), settings(10));
        let summary = driver.run().await.unwrap();

        assert_eq!(runner.phases(), vec![Phase::Build, Phase::Review]);
        assert_eq!(summary.snapshot.iteration, 4);
    }

    #[tokio::test]
    async fn test_already_complete_runs_nothing() {
        let dir = tempdir().unwrap();
        let mut done = Snapshot::default();
        done.phase = Phase::End;
        store(&dir).write(&done).unwrap();

        let runner = ScriptedRunner::new(vec![]);
        let driver = Driver::new(store(&dir), runner.clone(), settings(10));
        let summary = driver.run().await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.executions, 0);
        assert!(runner.phases().is_empty());
    }

    #[tokio::test]
    async fn test_consecutive_fallbacks_halt_the_run() {
        let dir = tempdir().unwrap();
        let fallback = |phase: Phase| -> Step {
            Ok(PhaseOutcome {
                event: fallback_event(phase),
                updates: StateUpdate::None,
            })
        };
        let runner = ScriptedRunner::new(vec![
            fallback(Phase::Plan),
            fallback(Phase::Build),
            fallback(Phase::Build),
            ok(EventKind::ImplementationDone, StateUpdate::None),
        ]);
        let driver = Driver::new(store(&dir), runner.clone(), settings(10));

        let err = driver.run().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::FallbackLimit { count: 3 }));

        let persisted = store(&dir).read().unwrap();
        assert_eq!(persisted.phase, Phase::Build);
        assert_eq!(persisted.history.len(), 3);
        assert!(persisted.history.iter().all(|e| e.fallback));
        assert_eq!(runner.phases().len(), 3);
    }

    #[tokio::test]
    async fn test_explicit_transition_resets_fallback_streak() {
        let dir = tempdir().unwrap();
        let fallback = |phase: Phase| -> Step {
            Ok(PhaseOutcome {
                event: fallback_event(phase),
                updates: StateUpdate::None,
            })
        };
        let mut s = settings(10);
        s.max_consecutive_fallbacks = 2;
        let runner = ScriptedRunner::new(vec![
            fallback(Phase::Plan),
            ok(EventKind::ContinueBuilding, StateUpdate::None),
            fallback(Phase::Build),
            ok(EventKind::ImplementationDone, StateUpdate::None),
            ok(EventKind::Approved, StateUpdate::None),
        ]);
        let driver = Driver::new(store(&dir), runner, s);

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.snapshot.fallback_count(), 2);
    }
}
