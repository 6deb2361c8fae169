/// One launched instance of the watched binary: the process id, the
/// moment it started, and a completion channel that resolves when the
/// OS reports its exit.
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::SystemTime;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::Target;
use crate::relay::{self, OutputMode};

/// Errors from starting the watched binary.
#[derive(Debug)]
pub enum LaunchError {
    /// The executable file is transiently busy, which happens for a
    /// moment right after the file is overwritten. Retryable.
    Busy { source: io::Error },
    /// Any other spawn failure (missing file, permissions, pipe setup).
    Spawn { source: io::Error },
}

impl LaunchError {
    /// Classify a spawn failure: ETXTBSY is the retryable busy condition.
    fn from_spawn(source: io::Error) -> Self {
        if source.raw_os_error() == Some(Errno::ETXTBSY as i32) {
            LaunchError::Busy { source }
        } else {
            LaunchError::Spawn { source }
        }
    }

    #[allow(dead_code)]
    pub fn is_busy(&self) -> bool {
        matches!(self, LaunchError::Busy { .. })
    }
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::Busy { source } => {
                write!(f, "executable file is busy: {}", source)
            }
            LaunchError::Spawn { source } => {
                write!(f, "failed to spawn process: {}", source)
            }
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::Busy { source } => Some(source),
            LaunchError::Spawn { source } => Some(source),
        }
    }
}

#[derive(Debug)]
pub struct ManagedProcess {
    pid: Option<u32>,
    started_at: SystemTime,
    exit_rx: oneshot::Receiver<io::Result<ExitStatus>>,
}

impl ManagedProcess {
    /// Spawn the target with both output streams captured for relaying.
    ///
    /// On success the start time is recorded, two detached tasks relay
    /// the child's output, and a background wait task publishes the exit
    /// status on the completion channel exactly once.
    pub fn launch(target: &Target, output: OutputMode) -> Result<Self, LaunchError> {
        let mut child = Command::new(&target.path)
            .args(&target.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(LaunchError::from_spawn)?;

        let started_at = SystemTime::now();
        let pid = child.id();
        relay::spawn_relays(&mut child, output);

        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = child.wait().await;
            let _ = exit_tx.send(result);
        });

        debug!(pid = pid.unwrap_or(0), "child process started");
        Ok(Self {
            pid,
            started_at,
            exit_rx,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When the spawn succeeded. Reloads trigger only on file timestamps
    /// strictly after this.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Kill the instance and wait until its death is observed.
    ///
    /// The kill is forcible and best-effort: a failure (typically ESRCH
    /// because the child already exited) is logged, and the completion
    /// channel is still awaited so that no successor can start before
    /// the OS has reaped this instance.
    pub async fn teardown(self) -> io::Result<ExitStatus> {
        if let Some(pid) = self.pid {
            if let Err(errno) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                warn!(pid, error = %errno, "kill failed, waiting for exit anyway");
            }
        }

        match self.exit_rx.await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "exit notification never arrived for the previous instance",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn target(path: &str, args: &[&str]) -> Target {
        Target::new(path, args.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn teardown_reports_the_natural_exit_code() {
        let process =
            ManagedProcess::launch(&target("sh", &["-c", "exit 7"]), OutputMode::Discard).unwrap();
        // Let the child finish on its own before tearing down.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let status = process.teardown().await.unwrap();
        assert_eq!(status.code(), Some(7));
    }

    #[tokio::test]
    async fn teardown_kills_a_long_running_child() {
        let process =
            ManagedProcess::launch(&target("sleep", &["30"]), OutputMode::Discard).unwrap();
        let pid = process.pid().unwrap();

        let began = Instant::now();
        let status = process.teardown().await.unwrap();

        assert!(!status.success());
        assert!(status.code().is_none(), "SIGKILL leaves no exit code");
        assert!(began.elapsed() < Duration::from_secs(5));
        // The old pid must be fully gone once teardown returns.
        let probe = signal::kill(Pid::from_raw(pid as i32), None);
        assert_eq!(probe, Err(Errno::ESRCH));
    }

    #[tokio::test]
    async fn launch_records_a_recent_start_time() {
        let before = SystemTime::now();
        let process = ManagedProcess::launch(&target("echo", &["hi"]), OutputMode::Discard).unwrap();

        assert!(process.started_at() >= before);
        assert!(process.started_at() <= SystemTime::now());
        process.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn missing_executable_is_not_busy() {
        let err = ManagedProcess::launch(
            &target("/no/such/binary-anywhere", &[]),
            OutputMode::Discard,
        )
        .unwrap_err();

        assert!(!err.is_busy());
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[test]
    fn etxtbsy_classifies_as_busy() {
        let err = LaunchError::from_spawn(io::Error::from_raw_os_error(Errno::ETXTBSY as i32));
        assert!(err.is_busy());
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn other_errno_classifies_as_spawn() {
        let err = LaunchError::from_spawn(io::Error::from_raw_os_error(Errno::EACCES as i32));
        assert!(!err.is_busy());
    }
}
