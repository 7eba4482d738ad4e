//! Spawns and manages one child process: captures stdout/stderr into
//! bounded in-memory buffers, applies a timeout with TERM→grace→KILL
//! escalation, and maps the exit status per spec.md §4.7.
//!
//! Grounded in `process/child.rs`'s `ChildHandle`/`ShutdownStyle` actor
//! shape: we keep the process-group setup (`setsid` on unix so a signal to
//! the negated pid reaches the whole tree) and the graceful-then-kill
//! escalation, but drop the PTY backend and the `Child`/`ChildCommandChannel`
//! clone-and-observe machinery — nothing here needs a second observer of a
//! running child, since the Scheduler owns each child directly.

use std::{io, process::ExitStatus, time::Duration};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::cancel::CancellationToken;
use crate::command::Command;

/// How long a process gets to respond to SIGTERM before SIGKILL, once a
/// timeout or shutdown has been requested.
const GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// A zero exit is success; non-zero is failure; termination by signal
    /// is pre-mapped to 128+signal on POSIX, 255 otherwise.
    Finished(i32),
    /// The wait/kill syscalls themselves failed.
    Failed,
}

pub struct RunOutcome {
    pub exit: ChildExit,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub timed_out: bool,
}

pub struct Child {
    inner: tokio::process::Child,
    pid: Option<u32>,
}

impl Child {
    pub fn spawn(command: Command) -> io::Result<Self> {
        let mut tokio_command: tokio::process::Command = command.into();

        #[cfg(unix)]
        unsafe {
            tokio_command.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let inner = tokio_command.spawn()?;
        let pid = inner.id();
        Ok(Self { inner, pid })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    #[cfg(unix)]
    fn send_term(&self) {
        if let Some(pid) = self.pid {
            let pgid = -(pid as i32);
            unsafe {
                if libc::kill(pgid, libc::SIGTERM) == -1 {
                    tracing::debug!(pid, "failed to send SIGTERM to process group");
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn send_term(&self) {}

    /// Runs the child to completion, capturing stdout/stderr up to
    /// `output_ceiling` bytes each (further bytes are drained but dropped,
    /// and the corresponding `*_truncated` flag is set). If `timeout`
    /// elapses first, the process is sent SIGTERM, given [`GRACE_PERIOD`]
    /// to exit, then SIGKILL.
    pub async fn run(self, timeout: Option<Duration>, output_ceiling: usize) -> io::Result<RunOutcome> {
        self.run_cancellable(timeout, output_ceiling, CancellationToken::new()).await
    }

    /// As [`Self::run`], but also races the child against `cancel`: if the
    /// token fires before the child and any timeout, the same TERM ->
    /// grace -> KILL escalation runs. This is how the Scheduler's draining
    /// state (spec.md §4.6) and a global SIGINT both reach an already
    /// in-flight child.
    pub async fn run_cancellable(
        mut self,
        timeout: Option<Duration>,
        output_ceiling: usize,
        cancel: CancellationToken,
    ) -> io::Result<RunOutcome> {
        let stdout = self.inner.stdout.take().expect("spawned with piped stdout");
        let stderr = self.inner.stderr.take().expect("spawned with piped stderr");

        let body = async {
            tokio::join!(
                self.inner.wait(),
                capture_bounded(stdout, output_ceiling),
                capture_bounded(stderr, output_ceiling),
            )
        };

        let interrupt = async {
            match timeout {
                Some(d) => tokio::select! {
                    _ = tokio::time::sleep(d) => {}
                    _ = cancel.cancelled() => {}
                },
                None => cancel.cancelled().await,
            }
        };

        tokio::select! {
            (status, (stdout_buf, stdout_trunc), (stderr_buf, stderr_trunc)) = body => {
                Ok(RunOutcome {
                    exit: status.map(finish).unwrap_or(ChildExit::Failed),
                    stdout: stdout_buf,
                    stderr: stderr_buf,
                    stdout_truncated: stdout_trunc,
                    stderr_truncated: stderr_trunc,
                    timed_out: false,
                })
            }
            _ = interrupt => {
                tracing::debug!("command interrupted, escalating TERM -> grace -> KILL");
                self.send_term();
                let exit = match tokio::time::timeout(GRACE_PERIOD, self.inner.wait()).await {
                    Ok(Ok(status)) => finish(status),
                    _ => match self.inner.kill().await {
                        Ok(()) => match self.inner.wait().await {
                            Ok(status) => finish(status),
                            Err(_) => ChildExit::Failed,
                        },
                        Err(_) => ChildExit::Failed,
                    },
                };
                Ok(RunOutcome {
                    exit,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    stdout_truncated: false,
                    stderr_truncated: false,
                    timed_out: true,
                })
            }
        }
    }
}

#[cfg(unix)]
fn finish(status: ExitStatus) -> ChildExit {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => ChildExit::Finished(code),
        None => ChildExit::Finished(128 + status.signal().unwrap_or(0)),
    }
}

#[cfg(not(unix))]
fn finish(status: ExitStatus) -> ChildExit {
    ChildExit::Finished(status.code().unwrap_or(255))
}

async fn capture_bounded<R: AsyncRead + Unpin>(mut reader: R, ceiling: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < ceiling {
                    let remaining = ceiling - buf.len();
                    let take = remaining.min(n);
                    buf.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }
    (buf, truncated)
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let child = Child::spawn(Command::new("echo hello")).unwrap();
        let outcome = child.run(None, 1024).await.unwrap();
        assert_eq!(outcome.exit, ChildExit::Finished(0));
        assert_eq!(String::from_utf8_lossy(&outcome.stdout).trim(), "hello");
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let child = Child::spawn(Command::new("exit 3")).unwrap();
        let outcome = child.run(None, 1024).await.unwrap();
        assert_eq!(outcome.exit, ChildExit::Finished(3));
    }

    #[tokio::test]
    async fn output_beyond_ceiling_is_truncated() {
        let child = Child::spawn(Command::new("yes x | head -c 100")).unwrap();
        let outcome = child.run(None, 10).await.unwrap();
        assert_eq!(outcome.stdout.len(), 10);
        assert!(outcome.stdout_truncated);
    }

    #[tokio::test]
    async fn timeout_escalates_to_kill() {
        let child = Child::spawn(Command::new("sleep 30")).unwrap();
        let outcome = child
            .run(Some(Duration::from_millis(100)), 1024)
            .await
            .unwrap();
        assert!(outcome.timed_out);
        // Killed by SIGKILL (9) via process-group signal -> 128+9.
        assert_eq!(outcome.exit, ChildExit::Finished(137));
    }

    #[tokio::test]
    async fn cancellation_escalates_to_kill_before_timeout() {
        let child = Child::spawn(Command::new("sleep 30")).unwrap();
        let cancel = CancellationToken::new();
        let waiter = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            waiter.cancel();
        });
        let outcome = child
            .run_cancellable(Some(Duration::from_secs(30)), 1024, cancel)
            .await
            .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit, ChildExit::Finished(137));
    }
}
