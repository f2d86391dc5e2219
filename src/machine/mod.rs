//! Transition engine.
//!
//! Four phases, one closed table of events. Phase behaviour is driven by an
//! untrusted text generator, so what can happen next is decided here and
//! nowhere else:
//!
//! ```text
//! PLAN   --START_BUILD-->         BUILD
//! PLAN   --SKIP_TO_REVIEW-->      REVIEW
//! PLAN   --NOTHING_TO_DO-->       END
//! BUILD  --IMPLEMENTATION_DONE--> REVIEW
//! BUILD  --BLOCKED-->             PLAN
//! BUILD  --CONTINUE_BUILDING-->   BUILD
//! REVIEW --APPROVED-->            END
//! REVIEW --NEEDS_FIXES-->         BUILD
//! REVIEW --REJECTED-->            PLAN
//! REVIEW --NEXT_ITERATION-->      PLAN   (iteration += 1)
//! REVIEW --MORE_REVIEW-->         REVIEW
//! ```

mod table;
mod types;

pub use table::{TRANSITIONS, Transition, apply, destination, resolve_target, valid_events};
pub use types::{DecisionOrigin, Event, EventKind, Phase};
