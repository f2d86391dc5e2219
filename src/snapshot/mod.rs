//! Snapshot store.
//!
//! The snapshot is the single source of truth for a run: iteration counter,
//! current phase, the active plan, build and review notes, and the full
//! transition history. It lives in one JSON file under `.looper/`.

mod store;
mod types;

pub use store::SnapshotStore;
pub use types::{BuildState, HistoryEntry, Plan, ReviewState, Snapshot};
