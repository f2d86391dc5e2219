//! Structured-text parsing of agent responses.
//!
//! Extracts, with regex patterns compiled once:
//! - `<plan>` with `<task>`, `<files>`, `<steps>`, `<acceptance_criteria>`
//! - `<build_progress>` with `<steps_completed>`, `<blockers>`
//! - `<review>` with `<feedback>`, `<issues>`
//! - `<transition to="TARGET" reason="REASON" />`
//!
//! Nothing here returns an error. Missing pieces become empty values, and a
//! missing or unusable directive becomes a fallback decision.

use super::types::{Artifact, BuildNotes, ParsedResponse, ReviewNotes, TransitionDirective};
use crate::machine::{Event, EventKind, Phase, resolve_target};
use crate::snapshot::Plan;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Destination used when the agent gives no usable directive.
pub const FALLBACK_TARGET: Phase = Phase::Build;

pub const FALLBACK_REASON: &str =
    "No explicit transition found in agent output; defaulting to BUILD";

fn block_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{0}\s*>(.*?)</{0}\s*>", regex::escape(tag)))
        .expect("block pattern is built from an escaped tag name")
}

static PLAN_BLOCK: LazyLock<Regex> = LazyLock::new(|| block_regex("plan"));
static TASK_TAG: LazyLock<Regex> = LazyLock::new(|| block_regex("task"));
static FILES_TAG: LazyLock<Regex> = LazyLock::new(|| block_regex("files"));
static STEPS_TAG: LazyLock<Regex> = LazyLock::new(|| block_regex("steps"));
static CRITERIA_TAG: LazyLock<Regex> = LazyLock::new(|| block_regex("acceptance_criteria"));

static BUILD_BLOCK: LazyLock<Regex> = LazyLock::new(|| block_regex("build_progress"));
static STEPS_COMPLETED_TAG: LazyLock<Regex> = LazyLock::new(|| block_regex("steps_completed"));
static BLOCKERS_TAG: LazyLock<Regex> = LazyLock::new(|| block_regex("blockers"));

static REVIEW_BLOCK: LazyLock<Regex> = LazyLock::new(|| block_regex("review"));
static FEEDBACK_TAG: LazyLock<Regex> = LazyLock::new(|| block_regex("feedback"));
static ISSUES_TAG: LazyLock<Regex> = LazyLock::new(|| block_regex("issues"));

static TRANSITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<transition\s+to\s*=\s*"([^"]*)"\s+reason\s*=\s*"((?:[^"\\]|\\.)*)"\s*/?\s*>"#)
        .expect("transition pattern is a valid static string")
});

// Leading list marker followed by whitespace: dash/star/plus/bullet, or "1." / "1)", plus an optional checkbox
static BULLET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+•](?:\s+|$)|\d+[.)]\s+)(?:\[[ xX]\]\s*)?")
        .expect("bullet pattern is a valid static string")
});

/// Inner text of the last `<tag>...</tag>` in `text`.
fn last_block<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures_iter(text)
        .last()
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

fn scalar(re: &Regex, block: &str) -> String {
    last_block(re, block)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn list(re: &Regex, block: &str) -> Vec<String> {
    last_block(re, block).map(split_list).unwrap_or_default()
}

/// Split a list body into its non-empty items, stripping bullet markers.
pub fn split_list(inner: &str) -> Vec<String> {
    inner
        .lines()
        .map(|line| BULLET_REGEX.replace(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn parse_plan(text: &str) -> Option<Plan> {
    let block = last_block(&PLAN_BLOCK, text)?;
    Some(Plan {
        task: scalar(&TASK_TAG, block),
        files: list(&FILES_TAG, block),
        steps: list(&STEPS_TAG, block),
        acceptance_criteria: list(&CRITERIA_TAG, block),
    })
}

pub fn parse_build_notes(text: &str) -> Option<BuildNotes> {
    let block = last_block(&BUILD_BLOCK, text)?;
    Some(BuildNotes {
        steps_completed: list(&STEPS_COMPLETED_TAG, block),
        blockers: list(&BLOCKERS_TAG, block),
    })
}

pub fn parse_review_notes(text: &str) -> Option<ReviewNotes> {
    let block = last_block(&REVIEW_BLOCK, text)?;
    Some(ReviewNotes {
        feedback: scalar(&FEEDBACK_TAG, block),
        issues: list(&ISSUES_TAG, block),
    })
}

/// The last well-formed transition directive in `text`.
///
/// A directive with an empty reason is not well-formed.
pub fn parse_directive(text: &str) -> Option<TransitionDirective> {
    TRANSITION_REGEX
        .captures_iter(text)
        .filter_map(|cap| {
            let target = cap.get(1)?.as_str().trim();
            let reason = unescape(cap.get(2)?.as_str().trim());
            if target.is_empty() || reason.is_empty() {
                return None;
            }
            Some(TransitionDirective {
                target: target.to_string(),
                reason,
            })
        })
        .last()
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// The decision taken when no usable directive exists.
pub fn fallback_event(phase: Phase) -> Event {
    let kind =
        resolve_target(phase, FALLBACK_TARGET.as_str()).unwrap_or(EventKind::StartBuild);
    Event::fallback(kind, FALLBACK_REASON)
}

/// Parser for agent responses, parameterized by the phase that produced them.
pub struct ResponseParser {
    verbose: bool,
}

impl ResponseParser {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Extract the phase's artifact and the event to apply.
    pub fn parse(&self, phase: Phase, text: &str) -> ParsedResponse {
        let artifact = match phase {
            Phase::Plan => Artifact::Plan(parse_plan(text)),
            Phase::Build => Artifact::Build(parse_build_notes(text)),
            Phase::Review => Artifact::Review(parse_review_notes(text)),
            Phase::End => Artifact::Empty,
        };

        if self.verbose {
            debug!(%phase, artifact = ?artifact, "parsed artifact");
        }

        let event = self.decide(phase, text);
        ParsedResponse { artifact, event }
    }

    fn decide(&self, phase: Phase, text: &str) -> Event {
        let Some(directive) = parse_directive(text) else {
            warn!(%phase, "no transition directive in agent output, using fallback");
            return fallback_event(phase);
        };

        match resolve_target(phase, &directive.target) {
            Some(kind) => {
                debug!(%phase, event = %kind, reason = %directive.reason, "transition directive");
                Event::new(kind, directive.reason)
            }
            None => {
                warn!(
                    %phase,
                    target = %directive.target,
                    "transition target not valid from this phase, using fallback"
                );
                fallback_event(phase)
            }
        }
    }
}

/// Convenience function to parse without constructing a parser.
pub fn parse_response(phase: Phase, text: &str) -> ParsedResponse {
    ResponseParser::new(false).parse(phase, text)
}
