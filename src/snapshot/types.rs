//! Durable state of the loop.
//!
//! Field names serialize in camelCase so the snapshot file can be read by
//! other tooling without knowing anything about this crate.

use crate::machine::{EventKind, Phase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The structured artifact produced by a PLAN phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// One-line description of the task.
    #[serde(default)]
    pub task: String,
    /// Paths expected to change.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildState {
    #[serde(default)]
    pub steps_completed: Vec<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    #[serde(default)]
    pub last_feedback: Option<String>,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Immutable audit record of one applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Phase the transition left.
    pub phase: Phase,
    /// Phase the transition entered.
    pub transition: Phase,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    /// Event that was applied. Absent in files written before it was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventKind>,
    /// True when the decision was synthesized because the agent gave no directive.
    #[serde(default)]
    pub fallback: bool,
}

/// Complete persisted state of the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub iteration: u32,
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub build_state: BuildState,
    #[serde(default)]
    pub review_state: ReviewState,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            iteration: 1,
            phase: Phase::Plan,
            timestamp: Utc::now(),
            plan: None,
            build_state: BuildState::default(),
            review_state: ReviewState::default(),
            history: Vec::new(),
        }
    }
}

impl Snapshot {
    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Number of fallback transitions at the tail of the history.
    pub fn trailing_fallbacks(&self) -> usize {
        self.history.iter().rev().take_while(|e| e.fallback).count()
    }

    /// Total number of fallback transitions ever applied.
    pub fn fallback_count(&self) -> usize {
        self.history.iter().filter(|e| e.fallback).count()
    }

    /// Equality that ignores the write timestamp.
    pub fn same_state(&self, other: &Snapshot) -> bool {
        self.iteration == other.iteration
            && self.phase == other.phase
            && self.plan == other.plan
            && self.build_state == other.build_state
            && self.review_state == other.review_state
            && self.history == other.history
    }
}
