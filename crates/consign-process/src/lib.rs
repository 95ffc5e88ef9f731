//! Process execution for consign.
//!
//! Every external tool the publish pipeline drives (the build tool, the
//! package manager, the transfer tool, git) goes through this crate. Each
//! invocation is a scoped child process: its output is read to completion
//! before the process is waited on.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use consign_process::run_command_with_timeout;
//!
//! let result = run_command_with_timeout("curl", &["--version"], Duration::from_secs(10)).expect("run");
//! assert!(result.success);
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

/// Result of a command execution
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// Exit code (if available)
    pub exit_code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error (empty when stderr was inherited)
    pub stderr: String,
    /// Duration of execution
    pub duration_ms: u64,
    /// Whether the command was killed after exceeding its timeout
    pub timed_out: bool,
}

impl CommandResult {
    /// Create a result from a process output
    pub fn from_output(output: &Output, duration: Duration) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: duration.as_millis() as u64,
            timed_out: false,
        }
    }

    /// First line of standard output, trimmed.
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }
}

/// Render a command line for traces, e.g. `b info: cfg/libhello/`.
pub fn format_command(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Run a command capturing stdout while leaving stderr attached to ours,
/// so the tool's own diagnostics reach the operator unchanged.
pub fn run_command_capture_stdout(program: &str, args: &[&str]) -> Result<CommandResult> {
    let start = Instant::now();

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .with_context(|| format!("failed to run command: {} {:?}", program, args))?;

    Ok(CommandResult::from_output(&output, start.elapsed()))
}

/// Run a command and stream output to stdout/stderr
pub fn run_command_streaming(program: &str, args: &[&str]) -> Result<CommandResult> {
    let start = Instant::now();

    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .output()
        .with_context(|| format!("failed to run command: {} {:?}", program, args))?;

    Ok(CommandResult::from_output(&output, start.elapsed()))
}

/// Run a command, killing it if it outlives `timeout`.
pub fn run_command_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandResult> {
    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn command: {} {:?}", program, args))?;

    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let deadline = start + timeout;
    let (status, timed_out) = loop {
        if let Some(status) = child.try_wait().context("failed to poll command")? {
            break (Some(status), false);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            break (None, true);
        }
        thread::sleep(Duration::from_millis(50));
    };

    let stdout = join_reader(stdout);
    let mut stderr = join_reader(stderr);
    if timed_out {
        stderr.push_str(&format!(
            "\ncommand timed out after {}",
            humantime::format_duration(timeout)
        ));
    }

    Ok(CommandResult {
        success: status.is_some_and(|s| s.success()),
        exit_code: status.and_then(|s| s.code()),
        stdout,
        stderr,
        duration_ms: start.elapsed().as_millis() as u64,
        timed_out,
    })
}

/// Read a pipe to the end on its own thread so the child never blocks on a
/// full pipe while we poll it.
fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn join_reader(handle: JoinHandle<Vec<u8>>) -> String {
    String::from_utf8_lossy(&handle.join().unwrap_or_default()).into_owned()
}

/// Start a command with a piped stdout; stdin and stderr are inherited.
///
/// The caller owns the child: it must consume (or drop) the stdout pipe and
/// then call [`wait_for_exit`].
pub fn spawn_with_piped_stdout(program: &str, args: &[&str]) -> Result<Child> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to start {program}"))
}

/// Wait for a child process to terminate.
pub fn wait_for_exit(child: &mut Child, program: &str) -> Result<ExitStatus> {
    child
        .wait()
        .with_context(|| format!("failed to wait for {program}"))
}

/// Turn an unsuccessful exit status into an error naming the program.
pub fn ensure_success(program: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => bail!("{program} exited with code {code}"),
        None => bail!("{program} terminated abnormally"),
    }
}

/// Get the full path to a command
pub fn which(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}
