//! Child process execution with a timeout and bounded output capture.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped beyond the capture limit (pipes are still drained).
    pub truncated_bytes: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Trailing stderr text, for error messages.
    pub fn stderr_tail(&self, max_chars: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let trimmed = text.trim();
        match trimmed.char_indices().nth_back(max_chars.saturating_sub(1)) {
            Some((idx, _)) => trimmed[idx..].to_string(),
            None => trimmed.to_string(),
        }
    }
}

/// Run a command, feeding `stdin` if given, killing it after `timeout`.
///
/// Stdout and stderr are read concurrently on their own threads while the
/// child runs, so a chatty child cannot deadlock on a full pipe. Each stream
/// keeps at most `output_limit_bytes` in memory.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = cmd.spawn().context("spawn command")?;

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
        // Dropping the handle closes the pipe so the child sees EOF.
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_reader = thread::spawn(move || drain_limited(stdout, output_limit_bytes));
    let stderr_reader = thread::spawn(move || drain_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_reader).context("join stdout reader")?;
    let (stderr, stderr_dropped) = join_reader(stderr_reader).context("join stderr reader")?;
    let truncated_bytes = stdout_dropped + stderr_dropped;
    if truncated_bytes > 0 {
        warn!(truncated_bytes, "command output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        truncated_bytes,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
    Ok((buf, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_a_fast_command() {
        let mut cmd = Command::new("echo");
        cmd.arg("hello");
        let output = run_command_with_timeout(cmd, None, Duration::from_secs(5), 1024)
            .expect("run echo");
        assert!(output.status.success());
        assert!(!output.timed_out);
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn enforces_output_limit_while_draining() {
        let mut cmd = Command::new("head");
        cmd.args(["-c", "100000", "/dev/zero"]);
        let output = run_command_with_timeout(cmd, None, Duration::from_secs(5), 1000)
            .expect("run head");
        assert_eq!(output.stdout.len(), 1000);
        assert_eq!(output.truncated_bytes, 99_000);
    }

    #[test]
    fn kills_a_hung_command_after_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let output = run_command_with_timeout(cmd, None, Duration::from_millis(100), 1024)
            .expect("run sleep");
        assert!(output.timed_out);
    }

    #[test]
    fn feeds_stdin_to_the_child() {
        let cmd = Command::new("cat");
        let output = run_command_with_timeout(
            cmd,
            Some(b"from stdin"),
            Duration::from_secs(5),
            1024,
        )
        .expect("run cat");
        assert_eq!(String::from_utf8_lossy(&output.stdout), "from stdin");
    }
}
