//! Child-process spawning, with timing/trace logging and optional timeouts.
//!
//! All calls are synchronous; no component spawns a thread to run a second
//! concurrent git invocation against the same working tree. Callers that
//! need mutual exclusion across processes coordinate via the Lock Store.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use wait_timeout::ChildExt;

/// The outcome of running a child process to completion.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("process timed out after {0:?}")]
    TimedOut(Duration),
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Run `cmd` to completion, capturing stdout/stderr separately. Exit code is
/// never translated into an `Err` here; callers that need "nonzero exit is
/// failure" semantics use [`run_checked`] or [`run_git`].
pub fn run(cmd: &mut Command, context: Option<&str>) -> Result<ProcessResult, ProcessError> {
    log_invocation(cmd, context);
    let t0 = Instant::now();
    let result = cmd.output();
    log_result(cmd, context, t0, result.as_ref().ok());

    let output = result.map_err(ProcessError::Spawn)?;
    Ok(to_process_result(output))
}

/// Like [`run`], but kills and reports a timeout if the process runs longer
/// than `timeout`.
pub fn run_with_timeout(
    cmd: &mut Command,
    timeout: Duration,
    context: Option<&str>,
) -> Result<ProcessResult, ProcessError> {
    log_invocation(cmd, context);
    let t0 = Instant::now();

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(ProcessError::Spawn)?;

    match child.wait_timeout(timeout).map_err(ProcessError::Spawn)? {
        Some(_status) => {
            let output = child.wait_with_output().map_err(ProcessError::Spawn)?;
            log_result(cmd, context, t0, Some(&output));
            Ok(to_process_result(output))
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            log::debug!(
                "[cat-trace] cmd timed out after {:.1}ms",
                t0.elapsed().as_secs_f64() * 1000.0
            );
            Err(ProcessError::TimedOut(timeout))
        }
    }
}

/// Run `cmd`, returning an error (with stderr attached) if the exit code is
/// nonzero.
pub fn run_checked(cmd: &mut Command, context: Option<&str>) -> Result<ProcessResult> {
    let result = run(cmd, context)?;
    if !result.success() {
        anyhow::bail!(
            "command exited with status {}: {}",
            result.exit_code,
            result.stderr_string().trim()
        );
    }
    Ok(result)
}

/// Run `git <args…>` in `cwd`, returning trimmed stdout. Fails if exit ≠ 0.
pub fn run_git(cwd: &Path, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.current_dir(cwd).args(args);
    let result = run_checked(&mut cmd, Some("git"))
        .with_context(|| format!("git {}", args.join(" ")))?;
    Ok(result.stdout_string().trim_end().to_string())
}

/// Like [`run_git`], but asserts stdout is exactly one line (after
/// trimming trailing whitespace) and returns it.
pub fn run_git_single_line(cwd: &Path, args: &[&str]) -> Result<String> {
    let stdout = run_git(cwd, args)?;
    if stdout.lines().count() > 1 {
        anyhow::bail!(
            "expected a single line of output from `git {}`, got: {stdout:?}",
            args.join(" ")
        );
    }
    Ok(stdout)
}

/// Run `git <args…>`, returning `Ok(false)` instead of an error when the
/// exit code is nonzero — for callers that need to branch on success/failure
/// without treating failure as exceptional (e.g. `merge-base --is-ancestor`).
pub fn run_git_check(cwd: &Path, args: &[&str]) -> Result<bool> {
    let mut cmd = Command::new("git");
    cmd.current_dir(cwd).args(args);
    let result = run(&mut cmd, Some("git"))?;
    Ok(result.success())
}

fn to_process_result(output: Output) -> ProcessResult {
    ProcessResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: output.stdout,
        stderr: output.stderr,
    }
}

fn command_string(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy()).collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

fn log_invocation(cmd: &Command, context: Option<&str>) {
    let cmd_str = command_string(cmd);
    match context {
        Some(ctx) => log::debug!("$ {cmd_str} [{ctx}]"),
        None => log::debug!("$ {cmd_str}"),
    }
}

fn log_result(cmd: &Command, context: Option<&str>, t0: Instant, output: Option<&Output>) {
    let cmd_str = command_string(cmd);
    let duration_ms = t0.elapsed().as_secs_f64() * 1000.0;
    match (output, context) {
        (Some(output), Some(ctx)) => log::debug!(
            "[cat-trace] context={ctx} cmd=\"{cmd_str}\" dur={duration_ms:.1}ms ok={}",
            output.status.success()
        ),
        (Some(output), None) => log::debug!(
            "[cat-trace] cmd=\"{cmd_str}\" dur={duration_ms:.1}ms ok={}",
            output.status.success()
        ),
        (None, Some(ctx)) => {
            log::debug!("[cat-trace] context={ctx} cmd=\"{cmd_str}\" dur={duration_ms:.1}ms err")
        }
        (None, None) => log::debug!("[cat-trace] cmd=\"{cmd_str}\" dur={duration_ms:.1}ms err"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_captures_stdout() {
        let mut cmd = Command::new("echo");
        cmd.arg("hello");
        let result = run(&mut cmd, None).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_string().trim(), "hello");
    }

    #[test]
    fn run_checked_fails_on_nonzero_exit() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 3");
        let err = run_checked(&mut cmd, None).unwrap_err();
        assert!(err.to_string().contains("exited with status 3"));
    }

    #[test]
    fn run_with_timeout_kills_slow_process() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run_with_timeout(&mut cmd, Duration::from_millis(100), None).unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut(_)));
    }

    #[test]
    fn run_with_timeout_returns_output_when_fast_enough() {
        let mut cmd = Command::new("echo");
        cmd.arg("fast");
        let result = run_with_timeout(&mut cmd, Duration::from_secs(5), None).unwrap();
        assert_eq!(result.stdout_string().trim(), "fast");
    }
}
