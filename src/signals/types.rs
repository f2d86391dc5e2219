//! Values extracted from agent output.

use crate::machine::Event;
use crate::snapshot::Plan;
use serde::{Deserialize, Serialize};

/// Progress notes emitted by a BUILD phase inside `<build_progress>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildNotes {
    /// Steps finished during this session, in order
    pub steps_completed: Vec<String>,
    /// Obstacles still unresolved at the end of the session
    pub blockers: Vec<String>,
}

/// Findings emitted by a REVIEW phase inside `<review>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewNotes {
    /// Free-text summary of the review; empty when the tag was missing
    pub feedback: String,
    pub issues: Vec<String>,
}

/// A raw `<transition to="..." reason="..."/>` directive before it is
/// checked against the current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionDirective {
    /// Event name or destination phase, exactly as written by the agent
    pub target: String,
    pub reason: String,
}

/// Phase-specific artifact found in a response.
///
/// `None` inside a variant means the outer block was missing entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Plan(Option<Plan>),
    Build(Option<BuildNotes>),
    Review(Option<ReviewNotes>),
    /// The phase produces no artifact.
    Empty,
}

/// Everything the parser could recover from one agent response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub artifact: Artifact,
    /// Event to apply; carries `DecisionOrigin::Fallback` when no usable
    /// directive was found.
    pub event: Event,
}

impl ParsedResponse {
    pub fn is_fallback(&self) -> bool {
        self.event.is_fallback()
    }
}
