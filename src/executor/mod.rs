//! Runs one phase: brief the agent, invoke it, parse what comes back.
//!
//! The executor never touches the snapshot file. It returns the event to
//! apply and the artifact-derived updates; the driver merges, transitions
//! and persists.

mod prompts;
mod updates;

pub use prompts::{BriefContext, build_brief};
pub use updates::StateUpdate;

use crate::agent::{AgentInvoker, InvokeOptions, PermissionMode};
use crate::errors::AgentError;
use crate::machine::{Event, Phase};
use crate::signals::{ParsedResponse, ResponseParser};
use crate::snapshot::Snapshot;
use crate::tracker::VcsContext;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything one phase execution needs besides the collaborators.
pub struct PhaseRequest<'a> {
    pub snapshot: &'a Snapshot,
    pub target_doc: &'a Path,
    pub max_turns: u32,
    pub dry_run: bool,
    /// 1-based count of executions in this run, used in transcript names
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub event: Event,
    pub updates: StateUpdate,
}

/// Abstraction over phase execution for testability.
/// Real implementation: `PhaseExecutor`.
#[async_trait]
pub trait PhaseRunner: Send + Sync {
    async fn run_phase(&self, request: &PhaseRequest<'_>) -> Result<PhaseOutcome, AgentError>;
}

pub struct PhaseExecutor {
    agent: Arc<dyn AgentInvoker>,
    vcs: Arc<dyn VcsContext>,
    parser: ResponseParser,
    skip_permissions: bool,
    commit_depth: usize,
    log_dir: Option<PathBuf>,
}

impl PhaseExecutor {
    pub fn new(agent: Arc<dyn AgentInvoker>, vcs: Arc<dyn VcsContext>) -> Self {
        Self {
            agent,
            vcs,
            parser: ResponseParser::new(false),
            skip_permissions: false,
            commit_depth: 10,
            log_dir: None,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.parser = ResponseParser::new(verbose);
        self
    }

    pub fn with_skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    pub fn with_commit_depth(mut self, depth: usize) -> Self {
        self.commit_depth = depth;
        self
    }

    /// Write each brief and response under `dir`.
    pub fn with_transcripts(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }

    pub async fn execute(&self, request: &PhaseRequest<'_>) -> Result<PhaseOutcome, AgentError> {
        let phase = request.snapshot.phase;
        let commits = self.vcs.recent_commits(self.commit_depth);

        let brief = build_brief(&BriefContext {
            phase,
            snapshot: request.snapshot,
            target_doc: request.target_doc,
            commits: &commits,
            dry_run: request.dry_run,
        });

        let stem = self.transcript_stem(request.snapshot.iteration, phase, request.attempt);
        self.write_transcript(&format!("{}-prompt.md", stem), &brief);

        let options = InvokeOptions {
            max_turns: request.max_turns,
            working_dir: self.vcs.root().to_path_buf(),
            permission_mode: PermissionMode::resolve(request.dry_run, self.skip_permissions),
        };

        info!(
            iteration = request.snapshot.iteration,
            %phase,
            attempt = request.attempt,
            "invoking agent"
        );
        let transcript = self.agent.invoke(&brief, &options).await?;
        self.write_transcript(&format!("{}-output.log", stem), &transcript.text);

        let ParsedResponse { artifact, event } = self.parser.parse(phase, &transcript.text);
        Ok(PhaseOutcome {
            event,
            updates: StateUpdate::from(artifact),
        })
    }

    /// `iter-N-<phase>-attempt-K`, bumping K past transcripts an earlier run left behind.
    fn transcript_stem(&self, iteration: u32, phase: Phase, attempt: u32) -> String {
        let stem = |k: u32| format!("iter-{}-{}-attempt-{}", iteration, phase.slug(), k);
        let Some(ref dir) = self.log_dir else {
            return stem(attempt);
        };
        let mut k = attempt;
        while dir.join(format!("{}-prompt.md", stem(k))).exists() {
            k += 1;
        }
        stem(k)
    }

    /// Transcripts are diagnostics; failing to write one never fails the phase.
    fn write_transcript(&self, name: &str, content: &str) {
        let Some(ref dir) = self.log_dir else {
            return;
        };
        let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(dir.join(name), content));
        if let Err(e) = result {
            warn!(file = %name, error = %e, "failed to write transcript");
        }
    }
}

#[async_trait]
impl PhaseRunner for PhaseExecutor {
    async fn run_phase(&self, request: &PhaseRequest<'_>) -> Result<PhaseOutcome, AgentError> {
        self.execute(request).await
    }
}

/// Phases the executor can run.
pub fn is_executable(phase: Phase) -> bool {
    !phase.is_terminal()
}
