//! CLI command implementations.
//!
//! | Module   | Commands handled              |
//! |----------|-------------------------------|
//! | `run`    | `Run`                         |
//! | `state`  | `Status`, `History`, `Reset`  |
//! | `config` | `Config`                      |

pub mod config;
pub mod run;
pub mod state;

pub use config::cmd_config;
pub use run::cmd_run;
pub use state::{cmd_history, cmd_reset, cmd_status};

use anyhow::{Context, Result};
use looper::tracker::{GitContext, VcsContext, WorkdirContext};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Locate the repository root for `project_dir`.
///
/// Outside a git repository the directory itself is the root and the agent
/// gets no commit history.
pub fn open_workspace(project_dir: &Path) -> Result<Arc<dyn VcsContext>> {
    match GitContext::discover(project_dir) {
        Ok(ctx) => Ok(Arc::new(ctx)),
        Err(e) => {
            warn!(dir = %project_dir.display(), error = %e, "not a git repository, using directory as root");
            let root = project_dir
                .canonicalize()
                .with_context(|| format!("Project directory not found: {}", project_dir.display()))?;
            Ok(Arc::new(WorkdirContext::new(root)))
        }
    }
}
