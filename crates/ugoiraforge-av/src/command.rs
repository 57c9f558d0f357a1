//! Builder for running external tools with a timeout and log forwarding.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use ugoiraforge_common::{Error, Result};

/// Default command timeout: 10 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// Every line the child writes to stdout or stderr is forwarded to `tracing`
/// at debug level as it arrives, and also captured for the caller.
///
/// # Example
///
/// ```no_run
/// use ugoiraforge_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> ugoiraforge_common::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-hide_banner")
///     .arg("-version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Execute the command, forwarding and capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if spawning fails, if the process exits with a
    /// non-zero status (message includes the tail of stderr), or if it runs
    /// past the timeout, in which case the child is killed.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let tool = self
            .program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Tool {
                tool: tool.clone(),
                message: format!("failed to spawn: {e}"),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let run = async {
            let (out, err, status) = tokio::join!(
                forward_lines(stdout, &tool, "stdout"),
                forward_lines(stderr, &tool, "stderr"),
                child.wait()
            );
            status.map(|status| (out, err, status))
        };

        let outcome = tokio::time::timeout(self.timeout, run).await;
        let (stdout, stderr, status) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                return Err(Error::Tool {
                    tool,
                    message: format!("I/O error waiting for process: {e}"),
                })
            }
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill timed out {}: {}", tool, e);
                }
                return Err(Error::Tool {
                    tool,
                    message: format!("timed out after {:?}", self.timeout),
                });
            }
        };

        if !status.success() {
            return Err(Error::Tool {
                message: format!("exited with status {}: {}", status, tail(&stderr, 5)),
                tool,
            });
        }

        Ok(ToolOutput {
            status,
            stdout,
            stderr,
        })
    }
}

async fn forward_lines<R>(pipe: Option<R>, tool: &str, stream: &str) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return String::new();
    };

    let mut captured = String::new();
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!(tool, stream, "{}", line);
                captured.push_str(&line);
                captured.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(tool, stream, "stopped reading output: {}", e);
                break;
            }
        }
    }
    captured
}

/// Last `n` non-empty lines of `text`, joined with " | ".
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join(" | ")
}
