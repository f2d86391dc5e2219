//! The driver loop that sequences phases until END or the budget runs out.

mod driver;

pub use driver::{Driver, RunOutcome, RunSummary};
