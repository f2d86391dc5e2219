//! Configuration for looper.
//!
//! Settings are layered file → environment → CLI. The file lives at
//! `.looper/looper.toml` under the repository root:
//!
//! ```toml
//! [agent]
//! command = "claude"
//! skip_permissions = true
//!
//! [loop]
//! max_retries = 20
//! max_turns = 50
//! commit_depth = 10
//! max_consecutive_fallbacks = 3
//! target_doc = "docs/plans/feature.md"
//! dry_run = false
//! ```
//!
//! Every key is optional. Without `agent.command`, `LOOPER_AGENT_CMD` (then
//! `CLAUDE_CMD`) supplies the agent command. `SKIP_PERMISSIONS=false` disables
//! permission skipping even when the file enables it.

use anyhow::{Context, Result, anyhow};
use glob::glob;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::machine::Phase;

/// Directory under the repository root holding all loop state.
pub const STATE_DIR: &str = ".looper";

/// Agent invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Agent CLI command (default: "claude")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Pass `--dangerously-skip-permissions` outside dry runs
    #[serde(default = "default_skip_permissions")]
    pub skip_permissions: bool,
}

fn default_skip_permissions() -> bool {
    true
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            command: None,
            skip_permissions: default_skip_permissions(),
        }
    }
}

/// Driver loop budgets and inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSection {
    /// Maximum phase executions per run, failed attempts included
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Turn budget forwarded to each agent invocation
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Number of recent commits included in each brief
    #[serde(default = "default_commit_depth")]
    pub commit_depth: usize,
    /// Halt after this many fallback transitions in a row (0 disables the check)
    #[serde(default = "default_max_consecutive_fallbacks")]
    pub max_consecutive_fallbacks: usize,
    /// Planning document, relative to the repository root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_doc: Option<PathBuf>,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_max_retries() -> u32 {
    20
}

fn default_max_turns() -> u32 {
    50
}

fn default_commit_depth() -> usize {
    10
}

fn default_max_consecutive_fallbacks() -> usize {
    3
}

impl Default for LoopSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_turns: default_max_turns(),
            commit_depth: default_commit_depth(),
            max_consecutive_fallbacks: default_max_consecutive_fallbacks(),
            target_doc: None,
            dry_run: false,
        }
    }
}

/// The complete looper.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LooperToml {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default, rename = "loop")]
    pub loop_settings: LoopSection,
}

impl LooperToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse looper.toml")
    }

    /// Load `looper.toml` from `state_dir`, or defaults when it doesn't exist.
    pub fn load_or_default(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join("looper.toml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize looper.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Agent command (file → env → default).
    pub fn agent_cmd(&self) -> String {
        self.agent
            .command
            .clone()
            .or_else(|| std::env::var("LOOPER_AGENT_CMD").ok())
            .or_else(|| std::env::var("CLAUDE_CMD").ok())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Environment can override the file setting.
    pub fn skip_permissions(&self) -> bool {
        if let Ok(env_val) = std::env::var("SKIP_PERMISSIONS") {
            return env_val != "false";
        }
        self.agent.skip_permissions
    }

    /// Return human-readable warnings; an empty list means the file is sane.
    pub fn validate(&self, root: &Path) -> Vec<String> {
        let mut warnings = Vec::new();
        let l = &self.loop_settings;

        if l.max_retries == 0 {
            warnings.push("max_retries is 0: the loop will never execute a phase".to_string());
        }
        if l.max_turns == 0 {
            warnings.push("max_turns is 0: the agent gets no turns per phase".to_string());
        }
        if let Some(ref doc) = l.target_doc
            && !root.join(doc).exists()
        {
            warnings.push(format!("target_doc '{}' does not exist", doc.display()));
        }
        if let Some(ref cmd) = self.agent.command
            && cmd.trim().is_empty()
        {
            warnings.push("agent.command is empty".to_string());
        }

        warnings
    }
}

/// Per-run overrides collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub max_retries: Option<u32>,
    pub max_turns: Option<u32>,
    pub target_doc: Option<PathBuf>,
    pub dry_run: bool,
    pub start_phase: Option<Phase>,
}

/// Fully resolved settings the driver loop runs with.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_retries: u32,
    pub max_turns: u32,
    pub commit_depth: usize,
    pub max_consecutive_fallbacks: usize,
    pub target_doc: PathBuf,
    pub dry_run: bool,
    pub start_phase: Option<Phase>,
}

/// Runtime configuration rooted at a repository.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub state_file: PathBuf,
    pub log_dir: PathBuf,
    pub agent_cmd: String,
    pub skip_permissions: bool,
    pub toml: LooperToml,
}

impl Config {
    pub fn new(root: PathBuf) -> Result<Self> {
        let root = root
            .canonicalize()
            .context("Failed to resolve repository root")?;
        let state_dir = root.join(STATE_DIR);
        let toml = LooperToml::load_or_default(&state_dir)?;

        Ok(Self {
            state_file: state_dir.join("state.json"),
            log_dir: state_dir.join("logs"),
            agent_cmd: toml.agent_cmd(),
            skip_permissions: toml.skip_permissions(),
            state_dir,
            root,
            toml,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.state_dir.join("looper.toml")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    /// Merge CLI overrides over the file settings (CLI → file → default).
    pub fn loop_settings(&self, overrides: &RunOverrides) -> Result<LoopSettings> {
        let file = &self.toml.loop_settings;
        let target_doc = self.resolve_target_doc(overrides.target_doc.as_deref())?;

        Ok(LoopSettings {
            max_retries: overrides.max_retries.unwrap_or(file.max_retries),
            max_turns: overrides.max_turns.unwrap_or(file.max_turns),
            commit_depth: file.commit_depth,
            max_consecutive_fallbacks: file.max_consecutive_fallbacks,
            target_doc,
            dry_run: overrides.dry_run || file.dry_run,
            start_phase: overrides.start_phase,
        })
    }

    /// Find the target document: explicit path, then `looper.toml`, then
    /// `.looper/target.md`, then the most recently modified `docs/plans/*.md`.
    fn resolve_target_doc(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return path
                .canonicalize()
                .with_context(|| format!("Target document not found: {}", path.display()));
        }

        if let Some(ref doc) = self.toml.loop_settings.target_doc {
            let path = self.root.join(doc);
            return path
                .canonicalize()
                .with_context(|| format!("Target document not found: {}", path.display()));
        }

        let default_doc = self.state_dir.join("target.md");
        if default_doc.exists() {
            return Ok(default_doc);
        }

        let pattern = self
            .root
            .join("docs/plans/*.md")
            .to_string_lossy()
            .to_string();

        let mut docs: Vec<PathBuf> = glob(&pattern)
            .context("Failed to read glob pattern")?
            .filter_map(|entry| entry.ok())
            .collect();

        if docs.is_empty() {
            return Err(anyhow!(
                "No target document found. Create .looper/target.md or pass --target-doc"
            ));
        }

        // Most recently modified first
        docs.sort_by(|a, b| {
            let a_time = a.metadata().and_then(|m| m.modified()).ok();
            let b_time = b.metadata().and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        Ok(docs.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_config(root: &Path, content: &str) {
        let dir = root.join(STATE_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("looper.toml"), content).unwrap();
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let toml = LooperToml::parse("").unwrap();
        assert_eq!(toml.loop_settings.max_retries, 20);
        assert_eq!(toml.loop_settings.max_turns, 50);
        assert_eq!(toml.loop_settings.commit_depth, 10);
        assert_eq!(toml.loop_settings.max_consecutive_fallbacks, 3);
        assert!(toml.loop_settings.target_doc.is_none());
        assert!(!toml.loop_settings.dry_run);
        assert!(toml.agent.skip_permissions);
        assert!(toml.agent.command.is_none());
    }

    #[test]
    fn test_parse_full_file() {
        let content = r#"
[agent]
command = "custom-claude"
skip_permissions = false

[loop]
max_retries = 5
max_turns = 12
commit_depth = 3
max_consecutive_fallbacks = 0
target_doc = "docs/plans/auth.md"
dry_run = true
"#;
        let toml = LooperToml::parse(content).unwrap();
        assert_eq!(toml.agent.command.as_deref(), Some("custom-claude"));
        assert!(!toml.agent.skip_permissions);
        assert_eq!(toml.loop_settings.max_retries, 5);
        assert_eq!(toml.loop_settings.max_turns, 12);
        assert_eq!(toml.loop_settings.commit_depth, 3);
        assert_eq!(toml.loop_settings.max_consecutive_fallbacks, 0);
        assert_eq!(
            toml.loop_settings.target_doc.as_deref(),
            Some(Path::new("docs/plans/auth.md"))
        );
        assert!(toml.loop_settings.dry_run);
        assert_eq!(toml.agent_cmd(), "custom-claude");
    }

    #[test]
    fn test_parse_invalid_toml_errors() {
        assert!(LooperToml::parse("[loop\nmax_retries = ").is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("looper.toml");
        let mut toml = LooperToml::default();
        toml.loop_settings.max_turns = 7;
        toml.save(&path).unwrap();
        let loaded = LooperToml::load(&path).unwrap();
        assert_eq!(loaded.loop_settings.max_turns, 7);
    }

    #[test]
    fn test_validate_flags_zero_budgets_and_missing_doc() {
        let dir = tempdir().unwrap();
        let toml = LooperToml::parse(
            r#"
[loop]
max_retries = 0
max_turns = 0
target_doc = "missing.md"
"#,
        )
        .unwrap();
        let warnings = toml.validate(dir.path());
        assert_eq!(warnings.len(), 3);
        assert!(LooperToml::default().validate(dir.path()).is_empty());
    }

    #[test]
    fn test_config_paths_under_state_dir() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf()).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.state_file, root.join(".looper/state.json"));
        assert_eq!(config.log_dir, root.join(".looper/logs"));
        assert_eq!(config.config_file(), root.join(".looper/looper.toml"));
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf()).unwrap();
        config.ensure_directories().unwrap();
        assert!(config.log_dir.exists());
    }

    #[test]
    fn test_loop_settings_cli_overrides_file() {
        let dir = tempdir().unwrap();
        write_config(dir.path(), "[loop]\nmax_retries = 5\nmax_turns = 9\n");
        fs::write(dir.path().join(".looper/target.md"), "# Target").unwrap();
        let config = Config::new(dir.path().to_path_buf()).unwrap();

        let settings = config
            .loop_settings(&RunOverrides {
                max_retries: Some(2),
                dry_run: true,
                start_phase: Some(Phase::Review),
                ..RunOverrides::default()
            })
            .unwrap();
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.max_turns, 9);
        assert!(settings.dry_run);
        assert_eq!(settings.start_phase, Some(Phase::Review));
        assert!(settings.target_doc.ends_with(".looper/target.md"));
    }

    #[test]
    fn test_target_doc_from_config_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("design")).unwrap();
        fs::write(dir.path().join("design/auth.md"), "# Auth").unwrap();
        write_config(dir.path(), "[loop]\ntarget_doc = \"design/auth.md\"\n");
        let config = Config::new(dir.path().to_path_buf()).unwrap();
        let settings = config.loop_settings(&RunOverrides::default()).unwrap();
        assert!(settings.target_doc.ends_with("design/auth.md"));
    }

    #[test]
    fn test_target_doc_discovered_in_docs_plans() {
        let dir = tempdir().unwrap();
        let plans = dir.path().join("docs/plans");
        fs::create_dir_all(&plans).unwrap();
        fs::write(plans.join("feature.md"), "# Feature").unwrap();
        let config = Config::new(dir.path().to_path_buf()).unwrap();
        let settings = config.loop_settings(&RunOverrides::default()).unwrap();
        assert!(settings.target_doc.ends_with("docs/plans/feature.md"));
    }

    #[test]
    fn test_missing_target_doc_errors() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf()).unwrap();
        let err = config.loop_settings(&RunOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("No target document found"));
    }

    #[test]
    fn test_explicit_target_doc_must_exist() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf()).unwrap();
        let err = config
            .loop_settings(&RunOverrides {
                target_doc: Some(dir.path().join("nope.md")),
                ..RunOverrides::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("Target document not found"));
    }
}
