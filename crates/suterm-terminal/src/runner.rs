//! External process execution with capture, timeout, and cancellation.
//!
//! Every spawned child is reaped before `run` returns, whatever the
//! outcome. On unix the child leads its own process group so a timeout or
//! cancel also takes down anything the shell forked.

use std::io::{ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use suterm_types::config::TerminalConfig;

use crate::interpreter::ExecutionResult;

/// How often a running child is polled for exit, timeout, and cancel.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for pipe readers after the child has exited. A
/// backgrounded grandchild can hold the pipes open indefinitely.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Exit code reported for a cancelled command (128 + SIGINT).
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// Launches command lines and captures their output.
pub trait ProcessRunner {
    /// Run `command_line` and capture its result.
    ///
    /// `elevate` runs it through the privilege escalation wrapper instead
    /// of the shell. A `timeout` of `None` waits indefinitely. Never
    /// panics or returns an error: spawn failures come back as exit -1.
    fn run(
        &self,
        command_line: &str,
        working_dir: &str,
        elevate: bool,
        timeout: Option<Duration>,
    ) -> ExecutionResult;
}

/// Shared flag used to interrupt the in-flight command.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the current command be killed.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// `ProcessRunner` backed by real OS processes.
pub struct SystemRunner {
    shell: String,
    su_binary: String,
    cancel: CancelToken,
}

enum Outcome {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
    WaitFailed(std::io::Error),
}

impl SystemRunner {
    pub fn new(shell: impl Into<String>, su_binary: impl Into<String>, cancel: CancelToken) -> Self {
        Self {
            shell: shell.into(),
            su_binary: su_binary.into(),
            cancel,
        }
    }

    pub fn from_config(config: &TerminalConfig, cancel: CancelToken) -> Self {
        Self::new(config.shell.clone(), config.su_binary.clone(), cancel)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn build(&self, command_line: &str, working_dir: &str, elevate: bool) -> Command {
        let mut cmd = if elevate {
            // The root router embeds its own `cd`, and the target directory
            // may only be reachable as root.
            let mut c = Command::new(&self.su_binary);
            c.arg("-c").arg(command_line);
            c
        } else {
            let mut c = Command::new(&self.shell);
            c.arg("-c").arg(command_line).current_dir(working_dir);
            c
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    fn wait(&self, child: &mut Child, start: Instant, timeout: Option<Duration>) -> Outcome {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Outcome::Exited(status),
                Ok(None) => {},
                Err(e) => {
                    terminate(child);
                    return Outcome::WaitFailed(e);
                },
            }
            if self.cancel.is_cancelled() {
                terminate(child);
                return Outcome::Cancelled;
            }
            if let Some(limit) = timeout
                && start.elapsed() >= limit
            {
                terminate(child);
                return Outcome::TimedOut(limit);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        command_line: &str,
        working_dir: &str,
        elevate: bool,
        timeout: Option<Duration>,
    ) -> ExecutionResult {
        self.cancel.reset();
        let start = Instant::now();
        let kind = if elevate { "Root" } else { "Shell" };

        let mut child = match self.build(command_line, working_dir, elevate).spawn() {
            Ok(child) => child,
            Err(e) => {
                log::warn!("{kind} spawn failed for {command_line:?}: {e}");
                return ExecutionResult::failure(
                    format!("{kind} command execution failed: {e}"),
                    -1,
                )
                .with_duration(start.elapsed());
            },
        };
        log::debug!("spawned pid {} for {command_line:?}", child.id());

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        match self.wait(&mut child, start, timeout) {
            Outcome::Exited(status) => {
                let deadline = Instant::now() + READER_GRACE;
                ExecutionResult {
                    stdout: collect(stdout, deadline),
                    stderr: collect(stderr, deadline),
                    exit_code: status.code().unwrap_or(-1),
                    duration_millis: 0,
                }
                .with_duration(start.elapsed())
            },
            Outcome::TimedOut(limit) => {
                log::warn!(
                    "{command_line:?} timed out after {}ms, killed",
                    limit.as_millis()
                );
                ExecutionResult::failure(
                    format!("{command_line}: timed out after {}ms", limit.as_millis()),
                    -1,
                )
                .with_duration(start.elapsed())
            },
            Outcome::Cancelled => {
                log::warn!("{command_line:?} cancelled");
                ExecutionResult::failure("^C", CANCELLED_EXIT_CODE).with_duration(start.elapsed())
            },
            Outcome::WaitFailed(e) => {
                log::warn!("wait failed for {command_line:?}: {e}");
                ExecutionResult::failure(format!("{kind} command execution failed: {e}"), -1)
                    .with_duration(start.elapsed())
            },
        }
    }
}

/// Output captured so far by a pipe reader, plus a signal sent at EOF.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> PipeReader {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let (tx, done) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if let Ok(mut b) = sink.lock() {
                        b.extend_from_slice(&chunk[..n]);
                    }
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(_) => break,
            }
        }
        let _ = tx.send(());
    });
    PipeReader { buf, done }
}

/// Wait for EOF until `deadline`, then take whatever has been read.
fn collect(reader: Option<PipeReader>, deadline: Instant) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let wait = deadline.saturating_duration_since(Instant::now());
    if reader.done.recv_timeout(wait).is_err() {
        log::debug!("output pipe still held open after exit; keeping partial output");
    }
    let bytes = reader
        .buf
        .lock()
        .map(|b| b.clone())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).trim().to_string()
}

/// Kill the child (and its process group) and reap it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: plain signal send to the group this child leads.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner() -> SystemRunner {
        SystemRunner::new("/bin/sh", "/bin/sh", CancelToken::new())
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let r = runner().run("echo hello", "/", false, Some(Duration::from_secs(5)));
        assert_eq!(r.stdout, "hello");
        assert_eq!(r.stderr, "");
        assert_eq!(r.exit_code, 0);
    }

    #[test]
    fn captures_stderr_separately() {
        let r = runner().run(
            "echo out; echo err 1>&2; exit 3",
            "/",
            false,
            Some(Duration::from_secs(5)),
        );
        assert_eq!(r.stdout, "out");
        assert_eq!(r.stderr, "err");
        assert_eq!(r.exit_code, 3);
    }

    #[test]
    fn trims_trailing_whitespace() {
        let r = runner().run("printf 'a\\n\\n\\n'", "/", false, None);
        assert_eq!(r.stdout, "a");
    }

    #[test]
    fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_str().unwrap();
        let r = runner().run("pwd", cwd, false, Some(Duration::from_secs(5)));
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::Path::new(&r.stdout).canonicalize().unwrap(),
            expected
        );
    }

    #[test]
    fn large_output_does_not_deadlock() {
        // Well past a 64 KiB pipe buffer on both streams.
        let r = runner().run(
            "i=0; while [ $i -lt 5000 ]; do echo xxxxxxxxxxxxxxxxxxxxxxxxxx; echo yyyyyyyyyyyyyyyyyyyy 1>&2; i=$((i+1)); done",
            "/",
            false,
            Some(Duration::from_secs(30)),
        );
        assert_eq!(r.exit_code, 0);
        assert_eq!(r.stdout.lines().count(), 5000);
        assert_eq!(r.stderr.lines().count(), 5000);
    }

    #[test]
    fn background_job_holding_pipe_keeps_written_output() {
        let start = Instant::now();
        let r = runner().run(
            "echo hi; echo warn 1>&2; sleep 3 &",
            "/",
            false,
            Some(Duration::from_secs(10)),
        );
        assert_eq!(r.stdout, "hi");
        assert_eq!(r.stderr, "warn");
        assert_eq!(r.exit_code, 0);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn timeout_kills_and_reaps() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let line = format!("echo $$ > '{}'; exec sleep 30", pidfile.display());

        let start = Instant::now();
        let r = runner().run(&line, "/", false, Some(Duration::from_millis(300)));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(r.exit_code, -1);
        assert_eq!(r.stdout, "");
        assert!(r.stderr.contains("timed out"));

        let pid: libc::pid_t = std::fs::read_to_string(&pidfile)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        // Reaped children no longer exist, not even as zombies.
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "timed-out process {pid} still exists");
    }

    #[test]
    fn no_timeout_waits_for_completion() {
        let r = runner().run("sleep 0.2; echo done", "/", true, None);
        assert_eq!(r.stdout, "done");
        assert!(r.duration_millis >= 200);
    }

    #[test]
    fn elevated_path_uses_su_binary() {
        // /bin/sh stands in for su: `sh -c <line>`.
        let r = runner().run("echo elevated", "/", true, None);
        assert_eq!(r.stdout, "elevated");
    }

    #[test]
    fn spawn_failure_is_reported_not_raised() {
        let r = SystemRunner::new("/nonexistent/sh", "/nonexistent/su", CancelToken::new())
            .run("true", "/", false, None);
        assert_eq!(r.exit_code, -1);
        assert!(r.stderr.starts_with("Shell command execution failed:"));

        let r = SystemRunner::new("/nonexistent/sh", "/nonexistent/su", CancelToken::new())
            .run("true", "/", true, None);
        assert!(r.stderr.starts_with("Root command execution failed:"));
    }

    #[test]
    fn missing_working_directory_is_spawn_failure() {
        let r = runner().run("true", "/definitely/not/here", false, None);
        assert_eq!(r.exit_code, -1);
        assert!(r.stderr.starts_with("Shell command execution failed:"));
    }

    #[test]
    fn cancel_interrupts_in_flight_command() {
        let runner = runner();
        let token = runner.cancel_token();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            token.cancel();
        });
        let start = Instant::now();
        let r = runner.run("sleep 30", "/", true, None);
        canceller.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(r.exit_code, CANCELLED_EXIT_CODE);
        assert_eq!(r.stderr, "^C");
    }

    #[test]
    fn stale_cancel_does_not_affect_next_command() {
        let runner = runner();
        runner.cancel_token().cancel();
        let r = runner.run("echo ok", "/", false, None);
        assert_eq!(r.stdout, "ok");
        assert_eq!(r.exit_code, 0);
    }

    #[test]
    fn cancel_token_roundtrip() {
        let t = CancelToken::new();
        assert!(!t.is_cancelled());
        let clone = t.clone();
        clone.cancel();
        assert!(t.is_cancelled());
        t.reset();
        assert!(!clone.is_cancelled());
    }
}
