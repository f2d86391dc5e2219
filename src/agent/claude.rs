use super::{AgentInvoker, AgentTranscript, InvokeOptions, PermissionMode};
use crate::errors::AgentError;
use crate::stream::{ContentBlock, StreamEvent, describe_tool_use, parse_line, snippet, tool_emoji};
use crate::ui::OrchestratorUI;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Drives the `claude` CLI in non-interactive `stream-json` mode.
///
/// The brief is written to stdin; stdout is decoded line by line. Assistant
/// text is collected for the parser, tool use and text snippets are forwarded
/// to the UI as they arrive.
pub struct ClaudeAgent {
    command: String,
    ui: Option<Arc<OrchestratorUI>>,
}

impl ClaudeAgent {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ui: None,
        }
    }

    pub fn with_ui(mut self, ui: Arc<OrchestratorUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// CLI flags for one session.
    pub fn build_args(options: &InvokeOptions) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--max-turns".to_string(),
            options.max_turns.to_string(),
        ];
        match options.permission_mode {
            PermissionMode::Plan => {
                args.push("--permission-mode".to_string());
                args.push("plan".to_string());
            }
            PermissionMode::Skip => args.push("--dangerously-skip-permissions".to_string()),
            PermissionMode::Default => {}
        }
        args
    }

    fn log_step(&self, msg: &str) {
        if let Some(ref ui) = self.ui {
            ui.log_step(msg);
        }
    }
}

/// Aborts the elapsed-time ticker however the session ends.
struct TickerGuard(JoinHandle<()>);

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[async_trait]
impl AgentInvoker for ClaudeAgent {
    async fn invoke(
        &self,
        brief: &str,
        options: &InvokeOptions,
    ) -> Result<AgentTranscript, AgentError> {
        let args = Self::build_args(options);
        let start = Instant::now();

        info!(command = %self.command, args = %args.join(" "), "spawning agent");
        self.log_step(&format!("Spawning: {} {}", self.command, args.join(" ")));

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(&options.working_dir)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AgentError::SpawnFailed {
                command: self.command.clone(),
                source,
            })?;

        debug!(pid = child.id().unwrap_or(0), "agent process spawned");

        if let Some(mut stdin) = child.stdin.take() {
            self.log_step(&format!("Writing {} chars to stdin...", brief.len()));
            match stdin.write_all(brief.as_bytes()).await {
                Ok(()) => stdin.shutdown().await?,
                // The exit status reports why the agent stopped reading
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("agent closed stdin before the brief was written");
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Drain stderr so a chatty agent never blocks on a full pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let ui_clone = self.ui.clone();
        let _ticker = TickerGuard(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Some(ref ui) = ui_clone {
                    ui.update_elapsed(start.elapsed());
                }
            }
        }));

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("agent stdout was not captured"))?;
        // Raw segments: a line that is not UTF-8 is noise, not a failed session
        let mut reader = BufReader::new(stdout).split(b'\n');

        let mut text = String::new();
        let mut session_id: Option<String> = None;
        let mut reported_error: Option<String> = None;

        while let Some(raw) = reader.next_segment().await? {
            let line = String::from_utf8_lossy(&raw);
            let Some(event) = parse_line(&line) else {
                continue;
            };
            match event {
                StreamEvent::Assistant {
                    message,
                    session_id: sid,
                } => {
                    if session_id.is_none() && !sid.is_empty() {
                        session_id = Some(sid);
                    }
                    for block in message.content {
                        match block {
                            ContentBlock::Text { text: chunk } => {
                                text.push_str(&chunk);
                                text.push('\n');
                                let snip = snippet(&chunk, 60);
                                if !snip.is_empty()
                                    && let Some(ref ui) = self.ui
                                {
                                    ui.show_thinking(&snip);
                                }
                            }
                            ContentBlock::ToolUse { name, input } => {
                                if let Some(ref ui) = self.ui {
                                    ui.show_tool_use(
                                        tool_emoji(&name),
                                        &describe_tool_use(&name, &input),
                                    );
                                }
                            }
                            ContentBlock::Other => {}
                        }
                    }
                }
                StreamEvent::Result {
                    subtype,
                    result,
                    is_error,
                    session_id: sid,
                    num_turns,
                } => {
                    if sid.is_some() {
                        session_id = sid;
                    }
                    debug!(subtype = %subtype, turns = ?num_turns, "agent session finished");
                    if is_error {
                        reported_error = Some(result.unwrap_or(subtype));
                    }
                }
                StreamEvent::User {} | StreamEvent::System { .. } => {}
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        let exit_code = status.code().unwrap_or(-1);
        self.log_step(&format!(
            "Completed in {:.1}s (exit: {})",
            start.elapsed().as_secs_f64(),
            exit_code
        ));

        if exit_code != 0 {
            if !stderr.trim().is_empty() {
                debug!(stderr = %stderr.trim(), "agent stderr");
            }
            return Err(AgentError::NonZeroExit { exit_code });
        }
        if let Some(message) = reported_error {
            return Err(AgentError::Reported { message });
        }

        Ok(AgentTranscript {
            text,
            session_id,
            exit_code,
        })
    }
}
