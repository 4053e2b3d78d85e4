//! Sandboxed command execution
//!
//! Runs shell commands in an isolated scratch directory, one at a time.
//! Every command and its outcome is appended to a JSONL activity log. A
//! transport-level failure (the command could not even be spawned) rebuilds
//! the scratch environment and reports the failure in-band; previous files
//! and state are lost on rebuild.

use chrono::Utc;
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub struct SandboxManager {
    root: PathBuf,
    log_path: PathBuf,
    /// Commands are serialized; one runs at a time per manager.
    exec_lock: Mutex<()>,
}

impl SandboxManager {
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let log_dir = root.join("logs");
        fs::create_dir_all(root.join("workspace"))?;
        fs::create_dir_all(&log_dir)?;
        Ok(Self {
            log_path: log_dir.join("sandbox_activity.jsonl"),
            root,
            exec_lock: Mutex::new(()),
        })
    }

    fn workspace(&self) -> PathBuf {
        self.root.join("workspace")
    }

    fn log_activity(&self, command: &str, exit_code: i32, output: &str, is_error: bool) {
        let entry = json!({
            "timestamp_utc": Utc::now().to_rfc3339(),
            "command": command,
            "exit_code": exit_code,
            "output": output,
            "type": if is_error || exit_code != 0 { "error" } else { "command" },
        });
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .and_then(|mut file| writeln!(file, "{}", entry));
        if let Err(e) = result {
            error!("failed to write sandbox activity log: {}", e);
        }
    }

    /// Execute a command inside the sandbox workspace. Returns the exit
    /// code and combined output; never raises for command failures.
    pub async fn execute_command(&self, command: &str) -> (i32, String) {
        let _guard = self.exec_lock.lock().await;

        if !self.workspace().exists() {
            warn!("sandbox workspace missing; rebuilding before execution");
            self.rebuild_sandbox();
        }

        info!(command, "executing sandbox command");
        let spawned = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(self.workspace())
            .output()
            .await;

        match spawned {
            Ok(output) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    if !combined.is_empty() {
                        combined.push('\n');
                    }
                    combined.push_str(stderr.trim_end());
                }
                let combined = combined.trim_end().to_string();
                self.log_activity(command, exit_code, &combined, false);
                (exit_code, combined)
            }
            Err(e) => {
                error!("sandbox transport error: {}; rebuilding", e);
                let message = format!(
                    "The sandbox hit a transport error and was rebuilt; the command did \
                     not run and previous files and state are gone. Error: {}",
                    e
                );
                self.log_activity(command, -1, &message, true);
                self.rebuild_sandbox();
                (-1, message)
            }
        }
    }

    /// Tear the workspace down and recreate it empty.
    pub fn rebuild_sandbox(&self) {
        info!("rebuilding sandbox workspace");
        let workspace = self.workspace();
        if workspace.exists() {
            if let Err(e) = fs::remove_dir_all(&workspace) {
                error!("failed to clear sandbox workspace: {}", e);
            }
        }
        if let Err(e) = fs::create_dir_all(&workspace) {
            error!("failed to recreate sandbox workspace: {}", e);
        }
    }

    /// Remove the workspace entirely.
    pub fn stop_sandbox(&self) {
        let workspace = self.workspace();
        if workspace.exists() {
            if let Err(e) = fs::remove_dir_all(&workspace) {
                error!("failed to remove sandbox workspace: {}", e);
            }
        }
    }

    /// The most recent activity-log lines, newest last.
    pub fn recent_activity(&self, limit: usize) -> Vec<String> {
        match fs::read_to_string(&self.log_path) {
            Ok(raw) => {
                let lines: Vec<&str> = raw.lines().collect();
                lines
                    .iter()
                    .rev()
                    .take(limit)
                    .rev()
                    .map(|l| l.to_string())
                    .collect()
            }
            Err(_) => Vec::new(),
        }
    }
}
