// src/steps/shell.rs

//! Running external tools through the platform shell.

use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{PipelineError, Result};

/// Captured result of a finished tool invocation.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run `cmd` through `sh -c` (or `cmd /C`) in `cwd` and capture its output.
pub async fn run_shell(cwd: &Path, cmd: &str) -> Result<ShellOutput> {
    info!(%cmd, "running tool");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    let output = command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("spawning `{cmd}`"))?;

    let result = ShellOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    for line in result.stderr.lines() {
        debug!(%cmd, "stderr: {}", line);
    }
    debug!(%cmd, exit_code = result.code, "tool exited");

    Ok(result)
}

/// Run `cmd` and turn a non-zero exit into [`PipelineError::ToolFailed`].
pub async fn run_checked(cwd: &Path, step: &str, cmd: &str) -> Result<ShellOutput> {
    let output = run_shell(cwd, cmd).await?;
    if output.success() {
        return Ok(output);
    }
    for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
        eprintln!("{line}");
    }
    Err(PipelineError::ToolFailed {
        step: step.to_string(),
        command: cmd.to_string(),
        code: output.code,
    })
}

/// Quote `arg` for `sh` unless it only contains safe characters.
pub fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@%+=,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Substitute `{name}` placeholders. Values are inserted verbatim; callers
/// quote them first.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
