//! Run an external command with a hard wall-clock bound.
//!
//! Both output pipes are drained on their own threads before the runner
//! starts waiting, so a child that writes more than a pipe buffer can hold
//! never blocks. When the bound is exceeded the child is killed and the
//! reader threads are abandoned rather than joined: a stream that never
//! reaches EOF cannot hold the caller past `timeout` plus a small reap grace.

use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_FLUSH_GRACE: Duration = Duration::from_secs(2);
const REAP_GRACE: Duration = Duration::from_millis(250);
const READ_CHUNK: usize = 8 * 1024;

/// Exit code reported for a child that was ended by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -1;

/// A started child process.
pub trait ChildProcess: Send {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;
    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>>;
    /// `Ok(Some(code))` once the child has exited, without blocking.
    fn try_wait(&mut self) -> io::Result<Option<i32>>;
    fn kill(&mut self) -> io::Result<()>;
}

/// Starts child processes with piped stdout and stderr.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<Box<dyn ChildProcess>>;
}

/// Spawns real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<Box<dyn ChildProcess>> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(Box::new(child))
    }
}

impl ChildProcess for std::process::Child {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout
            .take()
            .map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stderr
            .take()
            .map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(std::process::Child::try_wait(self)?
            .map(|status| status.code().unwrap_or(SIGNALED_EXIT_CODE)))
    }

    fn kill(&mut self) -> io::Result<()> {
        std::process::Child::kill(self)
    }
}

/// What a child left behind after exiting on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` did not expose a {stream} pipe")]
    Pipe {
        program: String,
        stream: &'static str,
    },
    #[error("failed waiting for `{program}`")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    /// `stdout` and `stderr` hold whatever was read before the deadline.
    #[error("`{program}` timed out after {timeout:?}")]
    TimedOut {
        program: String,
        timeout: Duration,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    #[error("`{program}` exited but its {stream} did not close")]
    Incomplete {
        program: String,
        stream: &'static str,
        exit_code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
}

impl RunError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RunError::TimedOut { .. })
    }
}

/// Runs one command per call; no retries.
#[derive(Clone)]
pub struct ProcessRunner {
    spawner: Arc<dyn ProcessSpawner>,
    poll_interval: Duration,
    flush_grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Arc::new(SystemSpawner))
    }
}

impl ProcessRunner {
    pub fn new(spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self {
            spawner,
            poll_interval: DEFAULT_POLL_INTERVAL,
            flush_grace: DEFAULT_FLUSH_GRACE,
        }
    }

    /// How long readers may take to reach EOF after the child has exited.
    pub fn with_flush_grace(mut self, grace: Duration) -> Self {
        self.flush_grace = grace;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// A `timeout` too large to represent as an instant means no deadline.
    pub fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ProcessOutcome, RunError> {
        debug!(program, ?args, ?timeout, "spawning");
        let deadline = Instant::now().checked_add(timeout);

        let mut child = self
            .spawner
            .spawn(program, args)
            .map_err(|source| RunError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let (Some(stdout), Some(stderr)) = (child.take_stdout(), child.take_stderr()) else {
            let _ = child.kill();
            return Err(RunError::Pipe {
                program: program.to_string(),
                stream: "stdout/stderr",
            });
        };

        let mut stdout = Drained::start("stdout", stdout);
        let mut stderr = Drained::start("stderr", stderr);

        let exit_code = loop {
            match child.try_wait() {
                Ok(Some(code)) => break code,
                Ok(None) => {}
                Err(source) => {
                    kill_and_reap(program, child.as_mut());
                    return Err(RunError::Wait {
                        program: program.to_string(),
                        source,
                    });
                }
            }
            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => {
                    warn!(program, ?timeout, "command timed out, killing process");
                    kill_and_reap(program, child.as_mut());
                    stdout.take_ready();
                    stderr.take_ready();
                    return Err(RunError::TimedOut {
                        program: program.to_string(),
                        timeout,
                        stdout: stdout.buf,
                        stderr: stderr.buf,
                    });
                }
                Some(deadline) => self.poll_interval.min(deadline - now),
                None => self.poll_interval,
            };
            thread::sleep(pause);
        };

        let flush_deadline = Instant::now().checked_add(self.flush_grace);
        let stdout_done = stdout.collect_until(flush_deadline);
        let stderr_done = stderr.collect_until(flush_deadline);
        if !stdout_done {
            return Err(RunError::Incomplete {
                program: program.to_string(),
                stream: "stdout",
                exit_code,
                stdout: stdout.buf,
                stderr: stderr.buf,
            });
        }
        if !stderr_done {
            debug!(
                program,
                stderr_len = stderr.buf.len(),
                "stderr still open after exit, keeping what was read"
            );
        }

        debug!(program, exit_code, stdout_len = stdout.buf.len(), "command exited");
        Ok(ProcessOutcome {
            exit_code,
            stdout: stdout.buf,
            stderr: stderr.buf,
        })
    }
}

/// One stream being read to EOF on its own thread. Chunks are handed over
/// as they are read; the channel closing marks EOF.
struct Drained {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
}

impl Drained {
    /// A read error ends the stream but keeps the bytes read so far.
    fn start(name: &'static str, mut stream: Box<dyn Read + Send>) -> Self {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(format!("drain-{name}"))
            .spawn(move || {
                let mut chunk = [0u8; READ_CHUNK];
                loop {
                    match stream.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            // The receiver is gone once the run has returned.
                            if tx.send(chunk[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            debug!(stream = name, error = %e, "read failed, keeping partial output");
                            break;
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            warn!(stream = name, error = %e, "failed to start reader thread");
        }
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    /// Appends every chunk already delivered, without blocking.
    fn take_ready(&mut self) {
        while let Ok(chunk) = self.rx.try_recv() {
            self.buf.extend_from_slice(&chunk);
        }
    }

    /// Appends chunks until EOF or `deadline` (`None` waits for EOF).
    /// Returns whether EOF was reached.
    fn collect_until(&mut self, deadline: Option<Instant>) -> bool {
        loop {
            let next = match deadline {
                Some(deadline) => self
                    .rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(chunk) => self.buf.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => {
                    self.take_ready();
                    return false;
                }
            }
        }
    }
}

fn kill_and_reap(program: &str, child: &mut dyn ChildProcess) {
    if let Err(e) = child.kill() {
        warn!(program, error = %e, "failed to kill process");
    }
    let reap_deadline = Instant::now() + REAP_GRACE;
    while Instant::now() < reap_deadline {
        match child.try_wait() {
            Ok(None) => thread::sleep(DEFAULT_POLL_INTERVAL),
            Ok(Some(_)) | Err(_) => return,
        }
    }
    debug!(program, "process not reaped after kill, abandoning it");
}
