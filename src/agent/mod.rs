//! The seam between the loop and the external coding agent.
//!
//! Real implementation: [`ClaudeAgent`]. Tests drive the executor and driver
//! through scripted implementations of [`AgentInvoker`].

mod claude;

pub use claude::ClaudeAgent;

use crate::errors::AgentError;
use async_trait::async_trait;
use std::path::PathBuf;

/// How much the agent is allowed to touch during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionMode {
    /// Ask the agent CLI's defaults.
    #[default]
    Default,
    /// Read-only planning mode, used for dry runs.
    Plan,
    /// Bypass permission prompts entirely.
    Skip,
}

impl PermissionMode {
    /// Dry runs always win over permission skipping.
    pub fn resolve(dry_run: bool, skip_permissions: bool) -> Self {
        if dry_run {
            PermissionMode::Plan
        } else if skip_permissions {
            PermissionMode::Skip
        } else {
            PermissionMode::Default
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub max_turns: u32,
    pub working_dir: PathBuf,
    pub permission_mode: PermissionMode,
}

/// Collected result of one agent session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentTranscript {
    /// Concatenated assistant text blocks, in order
    pub text: String,
    pub session_id: Option<String>,
    pub exit_code: i32,
}

/// Runs one agent session to completion for a brief.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        brief: &str,
        options: &InvokeOptions,
    ) -> Result<AgentTranscript, AgentError>;
}
