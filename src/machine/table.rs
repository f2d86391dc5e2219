//! The closed transition table and the pure function that applies it.

use super::types::{Event, EventKind, Phase};
use crate::errors::InvalidTransitionError;
use crate::snapshot::{HistoryEntry, Snapshot};
use chrono::Utc;

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub event: EventKind,
    pub to: Phase,
}

const fn row(from: Phase, event: EventKind, to: Phase) -> Transition {
    Transition { from, event, to }
}

/// Every legal transition. `END` has no rows.
pub const TRANSITIONS: [Transition; 11] = [
    row(Phase::Plan, EventKind::StartBuild, Phase::Build),
    row(Phase::Plan, EventKind::SkipToReview, Phase::Review),
    row(Phase::Plan, EventKind::NothingToDo, Phase::End),
    row(Phase::Build, EventKind::ImplementationDone, Phase::Review),
    row(Phase::Build, EventKind::Blocked, Phase::Plan),
    row(Phase::Build, EventKind::ContinueBuilding, Phase::Build),
    row(Phase::Review, EventKind::Approved, Phase::End),
    row(Phase::Review, EventKind::NeedsFixes, Phase::Build),
    row(Phase::Review, EventKind::Rejected, Phase::Plan),
    row(Phase::Review, EventKind::NextIteration, Phase::Plan),
    row(Phase::Review, EventKind::MoreReview, Phase::Review),
];

/// Look up the destination of `event` from `phase`.
pub fn destination(phase: Phase, event: EventKind) -> Option<Phase> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == phase && t.event == event)
        .map(|t| t.to)
}

/// Events accepted from `phase`, in table order.
pub fn valid_events(phase: Phase) -> Vec<EventKind> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == phase)
        .map(|t| t.event)
        .collect()
}

/// Map a directive target to the event it names from `phase`.
///
/// The target may be an event name valid from `phase`, or a destination phase.
/// A destination resolves to its canonical event; `REVIEW -> PLAN` resolves to
/// `NEXT_ITERATION` because `REJECTED` must be asked for by name.
pub fn resolve_target(phase: Phase, target: &str) -> Option<EventKind> {
    if let Ok(kind) = target.parse::<EventKind>() {
        return destination(phase, kind).map(|_| kind);
    }

    let to = target.parse::<Phase>().ok()?;
    let kind = match (phase, to) {
        (Phase::Plan, Phase::Build) => EventKind::StartBuild,
        (Phase::Plan, Phase::Review) => EventKind::SkipToReview,
        (Phase::Plan, Phase::End) => EventKind::NothingToDo,
        (Phase::Build, Phase::Review) => EventKind::ImplementationDone,
        (Phase::Build, Phase::Plan) => EventKind::Blocked,
        (Phase::Build, Phase::Build) => EventKind::ContinueBuilding,
        (Phase::Review, Phase::End) => EventKind::Approved,
        (Phase::Review, Phase::Build) => EventKind::NeedsFixes,
        (Phase::Review, Phase::Plan) => EventKind::NextIteration,
        (Phase::Review, Phase::Review) => EventKind::MoreReview,
        _ => return None,
    };
    Some(kind)
}

/// Apply one event to a snapshot, returning the successor.
///
/// The input is never modified; on rejection the caller still holds the
/// unchanged snapshot.
pub fn apply(snapshot: &Snapshot, event: &Event) -> Result<Snapshot, InvalidTransitionError> {
    let to = destination(snapshot.phase, event.kind).ok_or(InvalidTransitionError {
        phase: snapshot.phase,
        event: event.kind,
    })?;

    let mut next = snapshot.clone();
    if event.kind == EventKind::NextIteration {
        next.iteration += 1;
    }
    next.history.push(HistoryEntry {
        phase: snapshot.phase,
        transition: to,
        reason: event.reason.clone(),
        timestamp: Utc::now(),
        event: Some(event.kind),
        fallback: event.is_fallback(),
    });
    next.phase = to;
    Ok(next)
}
