//! Phase and event vocabulary for the loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four control states the loop can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    #[default]
    Plan,
    Build,
    Review,
    /// Terminal: no event is accepted from here.
    End,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Plan, Phase::Build, Phase::Review, Phase::End];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Plan => "PLAN",
            Phase::Build => "BUILD",
            Phase::Review => "REVIEW",
            Phase::End => "END",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::End)
    }

    /// Lowercase label used in transcript file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::Build => "build",
            Phase::Review => "review",
            Phase::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PLAN" => Ok(Phase::Plan),
            "BUILD" => Ok(Phase::Build),
            "REVIEW" => Ok(Phase::Review),
            "END" => Ok(Phase::End),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid values: PLAN, BUILD, REVIEW, END",
                s
            ),
        }
    }
}

/// Named signals that drive transitions. Each is valid from exactly one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    StartBuild,
    SkipToReview,
    NothingToDo,
    ImplementationDone,
    Blocked,
    ContinueBuilding,
    Approved,
    NeedsFixes,
    Rejected,
    NextIteration,
    MoreReview,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::StartBuild,
        EventKind::SkipToReview,
        EventKind::NothingToDo,
        EventKind::ImplementationDone,
        EventKind::Blocked,
        EventKind::ContinueBuilding,
        EventKind::Approved,
        EventKind::NeedsFixes,
        EventKind::Rejected,
        EventKind::NextIteration,
        EventKind::MoreReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StartBuild => "START_BUILD",
            EventKind::SkipToReview => "SKIP_TO_REVIEW",
            EventKind::NothingToDo => "NOTHING_TO_DO",
            EventKind::ImplementationDone => "IMPLEMENTATION_DONE",
            EventKind::Blocked => "BLOCKED",
            EventKind::ContinueBuilding => "CONTINUE_BUILDING",
            EventKind::Approved => "APPROVED",
            EventKind::NeedsFixes => "NEEDS_FIXES",
            EventKind::Rejected => "REJECTED",
            EventKind::NextIteration => "NEXT_ITERATION",
            EventKind::MoreReview => "MORE_REVIEW",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Unknown event '{}'", s))
    }
}

/// Where an event's decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionOrigin {
    /// The agent emitted a well-formed transition directive.
    #[default]
    Explicit,
    /// No usable directive was found; the parser synthesized the decision.
    Fallback,
}

/// A reason-carrying signal applied to the transition engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub reason: String,
    pub origin: DecisionOrigin,
}

impl Event {
    pub fn new(kind: EventKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            origin: DecisionOrigin::Explicit,
        }
    }

    pub fn fallback(kind: EventKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            origin: DecisionOrigin::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == DecisionOrigin::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_str_case_insensitive() {
        assert_eq!("plan".parse::<Phase>().unwrap(), Phase::Plan);
        assert_eq!(" Review ".parse::<Phase>().unwrap(), Phase::Review);
        assert_eq!("END".parse::<Phase>().unwrap(), Phase::End);
    }

    #[test]
    fn test_phase_from_str_invalid() {
        let err = "deploy".parse::<Phase>().unwrap_err();
        assert!(err.to_string().contains("Invalid phase 'deploy'"));
    }

    #[test]
    fn test_phase_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Phase::Build).unwrap(), "\"BUILD\"");
        let phase: Phase = serde_json::from_str("\"REVIEW\"").unwrap();
        assert_eq!(phase, Phase::Review);
    }

    #[test]
    fn test_event_kind_display_and_parse_agree() {
        for kind in EventKind::ALL {
            assert_eq!(kind.to_string().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_event_kind_parse_tolerates_separators() {
        assert_eq!(
            "next-iteration".parse::<EventKind>().unwrap(),
            EventKind::NextIteration
        );
        assert_eq!(
            "start build".parse::<EventKind>().unwrap(),
            EventKind::StartBuild
        );
        assert!("SHIP_IT".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_kind_serde_matches_display() {
        let json = serde_json::to_string(&EventKind::ImplementationDone).unwrap();
        assert_eq!(json, "\"IMPLEMENTATION_DONE\"");
    }

    #[test]
    fn test_fallback_event_is_flagged() {
        assert!(!Event::new(EventKind::Approved, "ok").is_fallback());
        assert!(Event::fallback(EventKind::StartBuild, "none").is_fallback());
    }
}
