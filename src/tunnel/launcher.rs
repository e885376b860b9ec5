//! Process launching abstraction.
//!
//! The supervisor never touches `tokio::process` directly. Everything goes
//! through [`ProcessLauncher`], so tests can substitute a scripted launcher
//! and the real one stays a thin shell around the OS.

use super::error::TunnelError;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::debug;

/// Buffered output lines kept for the supervisor. Lines beyond this are
/// still logged, just not queued.
const LINE_BUFFER: usize = 64;

/// Maximum stderr kept in install failure messages.
const STDERR_TAIL: usize = 512;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a command specification.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Space-joined command line for logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
}

impl From<ExitStatus> for ChildExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Launches installer commands and the tunnel client.
pub trait ProcessLauncher: Send + Sync {
    /// Handle type for spawned long-running children.
    type Child: TunnelChild;

    /// Locate an executable on the search path.
    fn find_program(&self, name: &str) -> Option<PathBuf>;

    /// Run a command to completion within `timeout`.
    ///
    /// Nonzero exit is `TunnelError::InstallFailed`; exceeding the timeout
    /// kills the process and returns `TunnelError::InstallTimeout`.
    fn run(
        &self,
        command: &CommandSpec,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), TunnelError>> + Send;

    /// Spawn a long-running child with captured output.
    fn spawn(&self, command: &CommandSpec) -> Result<Self::Child, TunnelError>;
}

/// A spawned tunnel client.
pub trait TunnelChild: Send {
    /// OS process id, if still known.
    fn pid(&self) -> Option<u32>;

    /// Next captured output line. `None` once both streams are closed.
    fn next_line(&mut self) -> impl Future<Output = Option<String>> + Send;

    /// Non-blocking exit check; reaps the child if it has exited.
    fn try_exit(&mut self) -> Result<Option<ChildExit>, TunnelError>;

    /// Wait for the child to exit and reap it.
    fn wait(&mut self) -> impl Future<Output = Result<ChildExit, TunnelError>> + Send;

    /// Ask the child to exit (SIGTERM on Unix).
    fn terminate(&mut self) -> Result<(), TunnelError>;

    /// Force the child to exit and reap it.
    fn kill(&mut self) -> impl Future<Output = Result<(), TunnelError>> + Send;
}

/// Launcher backed by real OS processes.
#[derive(Debug, Clone, Default)]
pub struct SystemLauncher;

impl SystemLauncher {
    /// Create a system launcher.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for SystemLauncher {
    type Child = SystemChild;

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<(), TunnelError> {
        debug!("Running: {}", command.display());

        // stdin stays attached so sudo can prompt.
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(TunnelError::Wait)?,
            Err(_) => {
                return Err(TunnelError::InstallTimeout {
                    command: command.display(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let tail_start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL)
            .map(|(i, _)| i)
            .unwrap_or(0);

        Err(TunnelError::InstallFailed {
            command: command.display(),
            status: ChildExit::from(output.status).to_string(),
            stderr: stderr[tail_start..].to_string(),
        })
    }

    fn spawn(&self, command: &CommandSpec) -> Result<SystemChild, TunnelError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, "stdout", tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, "stderr", tx);
        }

        Ok(SystemChild { child, lines: rx })
    }
}

/// Drain one output stream for the child's whole life.
///
/// Lines are always logged. They are queued for the supervisor only while
/// there is room, so a full queue never stalls the child on a full pipe.
fn spawn_line_reader<R>(stream: R, name: &'static str, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    debug!(target: "dirshare::tunnel::output", "[{}] {}", name, line);
                    let _ = tx.try_send(line);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Tunnel {} closed: {}", name, e);
                    break;
                }
            }
        }
    });
}

/// A tunnel client spawned by [`SystemLauncher`].
pub struct SystemChild {
    child: Child,
    lines: mpsc::Receiver<String>,
}

impl TunnelChild for SystemChild {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    fn try_exit(&mut self) -> Result<Option<ChildExit>, TunnelError> {
        self.child
            .try_wait()
            .map(|status| status.map(ChildExit::from))
            .map_err(TunnelError::Wait)
    }

    async fn wait(&mut self) -> Result<ChildExit, TunnelError> {
        self.child
            .wait()
            .await
            .map(ChildExit::from)
            .map_err(TunnelError::Wait)
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<(), TunnelError> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        // Already reaped.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| TunnelError::Signal(e.to_string()))
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<(), TunnelError> {
        self.child
            .start_kill()
            .map_err(|e| TunnelError::Signal(e.to_string()))
    }

    async fn kill(&mut self) -> Result<(), TunnelError> {
        self.child
            .kill()
            .await
            .map_err(|e| TunnelError::Signal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display() {
        let command = CommandSpec::new("lt", ["--port", "8083"]);
        assert_eq!(command.display(), "lt --port 8083");

        let bare = CommandSpec::new("true", Vec::<String>::new());
        assert_eq!(bare.display(), "true");
    }

    #[test]
    fn test_child_exit_display() {
        assert_eq!(ChildExit { code: Some(1) }.to_string(), "exit code 1");
        assert_eq!(ChildExit { code: None }.to_string(), "terminated by signal");
    }

    #[test]
    fn test_find_missing_program() {
        let launcher = SystemLauncher::new();
        assert!(launcher.find_program("dirshare-no-such-program-xyz").is_none());
    }

    #[tokio::test]
    async fn test_run_missing_program_is_spawn_error() {
        let launcher = SystemLauncher::new();
        let command = CommandSpec::new("dirshare-no-such-program-xyz", ["--version"]);
        let err = launcher
            .run(&command, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_failure_and_timeout() {
        let launcher = SystemLauncher::new();

        let ok = CommandSpec::new("sh", ["-c", "exit 0"]);
        launcher.run(&ok, Duration::from_secs(5)).await.unwrap();

        let failing = CommandSpec::new("sh", ["-c", "echo oops >&2; exit 3"]);
        match launcher.run(&failing, Duration::from_secs(5)).await {
            Err(TunnelError::InstallFailed { status, stderr, .. }) => {
                assert_eq!(status, "exit code 3");
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let slow = CommandSpec::new("sleep", ["5"]);
        let err = launcher
            .run(&slow, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::InstallTimeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawned_child_output_and_terminate() {
        let launcher = SystemLauncher::new();
        let command = CommandSpec::new("sh", ["-c", "echo your url is: https://x.loca.lt; sleep 30"]);
        let mut child = launcher.spawn(&command).unwrap();
        assert!(child.pid().is_some());

        let line = tokio::time::timeout(Duration::from_secs(5), child.next_line())
            .await
            .unwrap()
            .unwrap();
        assert!(line.contains("https://x.loca.lt"));
        assert!(child.try_exit().unwrap().is_none());

        child.terminate().unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit.code, None);
    }
}
