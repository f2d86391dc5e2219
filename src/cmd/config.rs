//! Configuration view and validation commands: `looper config`.

use anyhow::Result;

use super::super::ConfigCommands;
use super::open_workspace;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use looper::config::{Config, LooperToml, STATE_DIR};

    let vcs = open_workspace(project_dir)?;
    let root = vcs.root().to_path_buf();
    let state_dir = root.join(STATE_DIR);
    let config_path = state_dir.join("looper.toml");

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Looper Configuration");
            println!("====================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                LooperToml::load(&config_path)?
            } else {
                println!("No looper.toml found at {}", config_path.display());
                println!("Using default configuration.");
                LooperToml::default()
            };
            println!();

            println!("[agent]");
            if let Some(cmd) = &toml.agent.command {
                println!("  command = \"{}\"", cmd);
            }
            println!("  skip_permissions = {}", toml.agent.skip_permissions);
            println!();

            let l = &toml.loop_settings;
            println!("[loop]");
            println!("  max_retries = {}", l.max_retries);
            println!("  max_turns = {}", l.max_turns);
            println!("  commit_depth = {}", l.commit_depth);
            println!(
                "  max_consecutive_fallbacks = {}",
                l.max_consecutive_fallbacks
            );
            if let Some(doc) = &l.target_doc {
                println!("  target_doc = \"{}\"", doc.display());
            }
            println!("  dry_run = {}", l.dry_run);
            println!();

            // Effective values include env overrides
            println!("Effective values (with env overrides):");
            let config = Config::new(root)?;
            println!("  agent command = \"{}\"", config.agent_cmd);
            println!("  skip_permissions = {}", config.skip_permissions);
            println!();

            if !config_path.exists() {
                println!("Run 'looper config init' to create a looper.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No looper.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = LooperToml::load(&config_path)?;
            let warnings = toml.validate(&root);

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("looper.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&state_dir)?;
            LooperToml::default().save(&config_path)?;

            println!("Created looper.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [agent] command, skip_permissions");
            println!("  - [loop] max_retries, max_turns, target_doc, dry_run");
            println!();
        }
    }

    Ok(())
}
