use anyhow::{Context, Result};
use git2::{Repository, Sort};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only view of version-control context handed to each phase.
///
/// `recent_commits` never fails its caller: an empty history is valid input.
pub trait VcsContext: Send + Sync {
    /// Directory all loop state is stored relative to.
    fn root(&self) -> &Path;

    /// Up to `n` one-line commit summaries, newest first.
    fn recent_commits(&self, n: usize) -> Vec<String>;
}

/// Git-backed context via libgit2.
///
/// The repository is reopened per query; `git2::Repository` is not `Sync`.
pub struct GitContext {
    root: PathBuf,
}

impl GitContext {
    /// Open the repository containing `dir`, searching parent directories.
    pub fn discover(dir: &Path) -> Result<Self> {
        let repo = Repository::discover(dir).context("Failed to open git repository")?;
        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .context("Git repository has no working directory")?;
        Ok(Self { root })
    }

    fn try_recent_commits(&self, n: usize) -> Result<Vec<String>, git2::Error> {
        let repo = Repository::open(&self.root)?;
        let mut walk = repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut commits = Vec::with_capacity(n);
        for oid in walk.take(n) {
            let commit = repo.find_commit(oid?)?;
            let short = commit
                .as_object()
                .short_id()
                .ok()
                .and_then(|buf| buf.as_str().map(str::to_string))
                .unwrap_or_else(|| commit.id().to_string()[..7].to_string());
            let summary = commit.summary().unwrap_or("").trim().to_string();
            commits.push(format!("{} {}", short, summary));
        }
        Ok(commits)
    }
}

impl VcsContext for GitContext {
    fn root(&self) -> &Path {
        &self.root
    }

    fn recent_commits(&self, n: usize) -> Vec<String> {
        if n == 0 {
            return Vec::new();
        }
        match self.try_recent_commits(n) {
            Ok(commits) => commits,
            Err(e) => {
                // Unborn HEAD lands here too
                debug!(error = %e, "no commit history available");
                Vec::new()
            }
        }
    }
}

/// Context for a plain directory outside version control.
pub struct WorkdirContext {
    root: PathBuf,
}

impl WorkdirContext {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl VcsContext for WorkdirContext {
    fn root(&self) -> &Path {
        &self.root
    }

    fn recent_commits(&self, _n: usize) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn setup_repo() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        dir
    }

    fn commit_file(dir: &Path, name: &str, content: &str, msg: &str) {
        let repo = Repository::open(dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@test.com").unwrap();
        if let Ok(head) = repo.head() {
            let parent = head.peel_to_commit().unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[&parent])
                .unwrap();
        } else {
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[])
                .unwrap();
        }
    }

    #[test]
    fn test_unborn_repo_has_empty_history() {
        let dir = setup_repo();
        let ctx = GitContext::discover(dir.path()).unwrap();
        assert!(ctx.recent_commits(10).is_empty());
    }

    #[test]
    fn test_recent_commits_newest_first_and_bounded() {
        let dir = setup_repo();
        commit_file(dir.path(), "a.txt", "1", "first commit");
        commit_file(dir.path(), "a.txt", "2", "second commit");
        commit_file(dir.path(), "a.txt", "3", "third commit\n\nwith a body");

        let ctx = GitContext::discover(dir.path()).unwrap();
        let commits = ctx.recent_commits(2);
        assert_eq!(commits.len(), 2);
        assert!(commits[0].ends_with("third commit"));
        assert!(commits[1].ends_with("second commit"));
        assert!(ctx.recent_commits(0).is_empty());
    }

    #[test]
    fn test_discover_from_subdirectory_finds_root() {
        let dir = setup_repo();
        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        let ctx = GitContext::discover(&nested).unwrap();
        assert_eq!(
            ctx.root().canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_discover_outside_repo_fails() {
        let dir = tempdir().unwrap();
        // A temp dir may sit under a repository on some machines
        if Repository::discover(dir.path()).is_err() {
            assert!(GitContext::discover(dir.path()).is_err());
        }
    }

    #[test]
    fn test_workdir_context_has_no_history() {
        let dir = tempdir().unwrap();
        let ctx = WorkdirContext::new(dir.path().to_path_buf());
        assert_eq!(ctx.root(), dir.path());
        assert!(ctx.recent_commits(5).is_empty());
    }
}
