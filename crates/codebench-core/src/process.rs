//! Supervised child processes
//!
//! [`supervise`] runs one program to completion under a wall-clock limit:
//!
//! - the child gets its own process group, so the interpreter and anything it
//!   forks can be killed as a unit with `killpg`
//! - stdout and stderr are drained by two reader tasks into one shared buffer
//! - natural exit races a timer inside `tokio::select!`
//! - whatever wins, the group is killed and the child is reaped before return
//!
//! If the supervising future itself is dropped, [`GroupGuard`] kills the
//! group and tokio's `kill_on_drop` reaps the child.

use crate::ExecutionResult;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// How long reader tasks may keep draining after the group is gone
const DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8 * 1024;

/// What to run and under which limits
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            timeout: Duration::from_secs(30),
            max_output_bytes: 1024 * 1024,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn envs(mut self, env: &[(String, String)]) -> Self {
        self.env.extend_from_slice(env);
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

/// How a supervised run ended
#[derive(Debug)]
pub enum Outcome {
    /// Process exited on its own with this code
    Exited(i32),
    /// Process was terminated by this signal before the timer fired
    Signaled(i32),
    /// Timer won; the group was killed
    TimedOut,
    /// The program could not be started
    SpawnFailed(std::io::Error),
    /// Waiting on the child failed; the group was killed
    WaitFailed(std::io::Error),
}

/// Raw result of [`supervise`]
#[derive(Debug)]
pub struct Supervised {
    pub outcome: Outcome,
    pub output: Vec<u8>,
    pub truncated: bool,
    pub duration: Duration,
}

impl Supervised {
    /// Fold into an [`ExecutionResult`], appending `timeout_notice` on timeout
    #[must_use]
    pub fn into_result(self, timeout_notice: &str) -> ExecutionResult {
        let mut result = ExecutionResult {
            combined_output: String::from_utf8_lossy(&self.output).into_owned(),
            duration: self.duration,
            truncated: self.truncated,
            ..ExecutionResult::default()
        };

        if self.truncated {
            result.push_notice(&format!("[output truncated at {} bytes]", self.output.len()));
        }

        match self.outcome {
            Outcome::Exited(code) => result.exit_code = Some(code),
            Outcome::Signaled(signal) => {
                result.push_notice(&format!("Process terminated by signal {signal}"));
            }
            Outcome::TimedOut => {
                result.timed_out = true;
                result.push_notice(timeout_notice);
            }
            Outcome::SpawnFailed(e) => result.combined_output = format!("Execution error: {e}"),
            Outcome::WaitFailed(e) => result.push_notice(&format!("Execution error: {e}")),
        }

        result
    }
}

/// Render a timeout for notices: whole seconds as `30s`, otherwise `0.5s`
#[must_use]
pub fn format_timeout(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{:.1}s", timeout.as_secs_f64())
    }
}

/// Bounded accumulator shared by the stdout and stderr readers
#[derive(Debug)]
struct OutputBuffer {
    data: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    const fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.data.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.data.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
}

/// Kills the process group at most once, at the latest on drop
struct GroupGuard {
    pgid: Option<Pid>,
}

impl GroupGuard {
    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Send SIGKILL to every process in `pgid`
pub fn kill_group(pgid: Pid) {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) => tracing::debug!(pgid = pgid.as_raw(), "process group killed"),
        Err(Errno::ESRCH) => {}
        Err(e) => {
            tracing::warn!(pgid = pgid.as_raw(), error = %e, "failed to kill process group");
        }
    }
}

/// Run `spec` to completion, timeout, or spawn failure
pub async fn supervise(spec: &CommandSpec) -> Supervised {
    let start = Instant::now();

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(program = %spec.program.display(), error = %e, "spawn failed");
            return Supervised {
                outcome: Outcome::SpawnFailed(e),
                output: Vec::new(),
                truncated: false,
                duration: start.elapsed(),
            };
        }
    };

    // process_group(0) makes the child its own group leader
    let mut guard = GroupGuard {
        pgid: child.id().and_then(|id| i32::try_from(id).ok()).map(Pid::from_raw),
    };
    tracing::debug!(
        program = %spec.program.display(),
        pid = child.id(),
        timeout = ?spec.timeout,
        "process spawned"
    );

    let buffer = Arc::new(Mutex::new(OutputBuffer::new(spec.max_output_bytes)));
    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, Arc::clone(&buffer)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, Arc::clone(&buffer)));
    }

    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => match (status.code(), status.signal()) {
                (Some(code), _) => Outcome::Exited(code),
                (None, Some(signal)) => Outcome::Signaled(signal),
                (None, None) => Outcome::WaitFailed(std::io::Error::other(format!(
                    "unrecognized exit status {status}"
                ))),
            },
            Err(e) => Outcome::WaitFailed(e),
        },
        () = tokio::time::sleep(spec.timeout) => Outcome::TimedOut,
    };

    // Background grandchildren must not outlive the request either way.
    guard.kill();
    if matches!(outcome, Outcome::TimedOut | Outcome::WaitFailed(_)) {
        if let Err(e) = child.wait().await {
            tracing::warn!(error = %e, "failed to reap child");
        }
    }

    for mut reader in readers {
        if tokio::time::timeout(DRAIN_GRACE, &mut reader).await.is_err() {
            tracing::warn!("output reader still open after group kill, abandoning");
            reader.abort();
        }
    }

    if matches!(outcome, Outcome::TimedOut) {
        tracing::warn!(
            program = %spec.program.display(),
            timeout = ?spec.timeout,
            "process timed out, group killed"
        );
    }

    let duration = start.elapsed();
    let (output, truncated) = {
        let mut buffer = buffer.lock();
        (std::mem::take(&mut buffer.data), buffer.truncated)
    };

    tracing::debug!(
        ?outcome,
        output_len = output.len(),
        ?duration,
        "process finished"
    );

    Supervised {
        outcome,
        output,
        truncated,
        duration,
    }
}

fn spawn_reader<R>(mut stream: R, buffer: Arc<Mutex<OutputBuffer>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buffer.lock().push(&chunk[..n]),
                Err(e) => {
                    tracing::debug!(error = %e, "output stream closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", std::env::temp_dir()).arg("-c").arg(script)
    }

    #[test]
    fn test_format_timeout() {
        assert_eq!(format_timeout(Duration::from_secs(30)), "30s");
        assert_eq!(format_timeout(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn test_output_buffer_caps() {
        let mut buffer = OutputBuffer::new(4);
        buffer.push(b"ab");
        assert!(!buffer.truncated);
        buffer.push(b"cdef");
        assert_eq!(buffer.data, b"abcd");
        assert!(buffer.truncated);
        buffer.push(b"gh");
        assert_eq!(buffer.data, b"abcd");
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let run = supervise(&sh("echo out; echo err >&2; exit 3")).await;
        assert!(matches!(run.outcome, Outcome::Exited(3)));
        let text = String::from_utf8_lossy(&run.output);
        assert!(text.contains("out"));
        assert!(text.contains("err"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_captured() {
        let spec = CommandSpec::new("/nonexistent/interpreter", std::env::temp_dir());
        let result = supervise(&spec).await.into_result("timeout");
        assert_eq!(result.exit_code, None);
        assert!(!result.timed_out);
        assert!(result.combined_output.starts_with("Execution error:"));
    }

    #[tokio::test]
    async fn test_timeout_kills_group() {
        let spec = sh("sleep 30 & sleep 30; echo never").timeout(Duration::from_millis(300));
        let started = Instant::now();
        let result = supervise(&spec).await.into_result("Execution timeout after 0s");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(result.timed_out);
        assert_eq!(result.exit_code, None);
        assert!(!result.combined_output.contains("never"));
        assert!(result.combined_output.ends_with("Execution timeout after 0s"));
    }

    #[tokio::test]
    async fn test_output_truncation() {
        let spec = sh("head -c 10000 /dev/zero | tr '\\0' a").max_output_bytes(100);
        let result = supervise(&spec).await.into_result("timeout");
        assert!(result.truncated);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.combined_output.starts_with(&"a".repeat(100)));
        assert!(result.combined_output.contains("[output truncated at 100 bytes]"));
    }

    #[tokio::test]
    async fn test_signal_death_is_reported() {
        let run = supervise(&sh("echo started; kill -9 $$")).await;
        assert!(matches!(run.outcome, Outcome::Signaled(9)));

        let result = run.into_result("timeout");
        assert_eq!(result.exit_code, None);
        assert!(!result.timed_out);
        assert_eq!(result.combined_output, "started\n\nProcess terminated by signal 9");
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let spec =
            sh("printf %s \"$CODEBENCH_TEST\"").envs(&[("CODEBENCH_TEST".into(), "42".into())]);
        let run = supervise(&spec).await;
        assert_eq!(run.output, b"42");
    }
}
