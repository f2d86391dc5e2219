//! Response protocol for the agent.
//!
//! Each phase asks the agent to end its answer with tag-delimited blocks:
//!
//! - `<plan>...</plan>` - the plan artifact (PLAN)
//! - `<build_progress>...</build_progress>` - completed steps and blockers (BUILD)
//! - `<review>...</review>` - feedback and issues (REVIEW)
//! - `<transition to="EVENT_OR_PHASE" reason="..." />` - the decision (all phases)
//!
//! The parser is forgiving: it never fails, and a response without a usable
//! directive produces an explicit fallback decision instead.

mod parser;
mod types;

pub use parser::{
    FALLBACK_REASON, FALLBACK_TARGET, ResponseParser, fallback_event, parse_build_notes,
    parse_directive, parse_plan, parse_response, parse_review_notes, split_list,
};
pub use types::{Artifact, BuildNotes, ParsedResponse, ReviewNotes, TransitionDirective};
