pub mod git;

pub use git::{GitContext, VcsContext, WorkdirContext};
