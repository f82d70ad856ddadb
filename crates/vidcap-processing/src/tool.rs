//! External toolchain invocation
//!
//! Every ffmpeg/ffprobe call goes through [`run_tool`]. The child runs inside the caller's
//! scoped temporary directory and is handed relative file names, so nothing it prints
//! can reveal a temporary path. Children are killed when the future driving them is
//! dropped, which is how timeouts terminate a hung process.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool path {0:?}: contains dangerous characters")]
    InvalidPath(String),

    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} reported errors: {stderr}")]
    Diagnostics { program: String, stderr: String },

    #[error("{program} did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },
}

impl ToolError {
    /// Raw diagnostic text produced by the tool, if it ran at all.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ToolError::Exit { stderr, .. } | ToolError::Diagnostics { stderr, .. } => {
                Some(stderr.as_str())
            }
            _ => None,
        }
    }
}

/// Reject tool paths containing shell metacharacters.
pub fn validate_program(path: &str) -> Result<(), ToolError> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.trim().is_empty() || path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(ToolError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Validate `path` and anchor it to the process working directory when it is relative
/// and has a directory part. Children run inside their scratch directory, where
/// `./bin/ffmpeg` would not exist. Bare names keep their `PATH` lookup.
pub fn resolve_program(path: &str) -> Result<String, ToolError> {
    validate_program(path)?;

    let candidate = Path::new(path);
    if candidate.is_absolute() || candidate.components().count() < 2 {
        return Ok(path.to_string());
    }

    let cwd = std::env::current_dir().map_err(|source| ToolError::Spawn {
        program: program_name(path),
        source,
    })?;
    Ok(cwd.join(candidate).to_string_lossy().into_owned())
}

/// Fresh scratch directory under `root`, or under the system temp dir.
pub(crate) fn scratch_dir(root: Option<&Path>) -> std::io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("vidcap-");
    match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
}

/// Captured output of a successful run.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    /// Trimmed stderr; tools run at `-loglevel error` leave this empty on a clean run.
    pub stderr: String,
}

/// Short name used in logs and errors (`/usr/bin/ffmpeg` -> `ffmpeg`).
pub(crate) fn program_name(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

/// Run `program` with `args` inside `workdir` and capture its output.
///
/// A non-zero exit becomes [`ToolError::Exit`] carrying the trimmed stderr. With a
/// `timeout`, the child is killed once the limit elapses.
pub async fn run_tool(
    program: &str,
    args: &[&str],
    workdir: &Path,
    timeout: Option<Duration>,
) -> Result<ToolOutput, ToolError> {
    let name = program_name(program);
    let start = std::time::Instant::now();

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| {
                tracing::warn!(
                    program = %name,
                    timeout_secs = limit.as_secs(),
                    "External tool timed out, killing process"
                );
                ToolError::Timeout {
                    program: name.clone(),
                    secs: limit.as_secs(),
                }
            })?,
        None => command.output().await,
    }
    .map_err(|source| ToolError::Spawn {
        program: name.clone(),
        source,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let status = match output.status.code() {
            Some(code) => format!("status {}", code),
            None => "a signal".to_string(),
        };
        tracing::error!(
            program = %name,
            status = %status,
            duration_ms = start.elapsed().as_millis(),
            "External tool failed"
        );
        return Err(ToolError::Exit {
            program: name,
            status,
            stderr,
        });
    }

    tracing::debug!(
        program = %name,
        duration_ms = start.elapsed().as_millis(),
        stdout_bytes = output.stdout.len(),
        "External tool finished"
    );

    Ok(ToolOutput {
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
