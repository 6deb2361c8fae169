/// The supervision loop: one current child instance, a fixed-interval
/// mtime poll, and kill-before-relaunch sequencing on every change.
use std::path::PathBuf;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::{Target, WatcherConfig};
use crate::detect::{self, PollOutcome};
use crate::process::{LaunchError, ManagedProcess};
use crate::relay::OutputMode;
use crate::retry::{self, BusyRetryPolicy};

/// Fatal supervision failures. Anything here stops the program.
#[derive(Debug)]
pub enum SupervisorError {
    /// The very first launch failed.
    Launch { path: PathBuf, source: LaunchError },
    /// A relaunch after a detected change failed past recovery.
    Relaunch { path: PathBuf, source: LaunchError },
}

impl std::fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorError::Launch { path, source } => {
                write!(f, "failed to launch {}: {}", path.display(), source)
            }
            SupervisorError::Relaunch { path, source } => {
                write!(
                    f,
                    "failed to relaunch {} after it changed: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for SupervisorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SupervisorError::Launch { source, .. } => Some(source),
            SupervisorError::Relaunch { source, .. } => Some(source),
        }
    }
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Binary untouched. The current instance keeps running.
    Unchanged,
    /// Binary momentarily un-statable. Cycle skipped.
    Missing,
    /// A newer binary was detected and the instance was replaced.
    Reloaded,
}

/// Owns the one current [`ManagedProcess`] and all the state the loop
/// needs. The slot has a single writer: this struct, on this task.
pub struct Supervisor {
    target: Target,
    config: WatcherConfig,
    output: OutputMode,
    retry: BusyRetryPolicy,
    current: Option<ManagedProcess>,
}

impl Supervisor {
    pub fn new(target: Target, config: WatcherConfig, output: OutputMode) -> Self {
        let retry = BusyRetryPolicy::new(config.retry.max_attempts, config.retry.base_delay);
        Self {
            target,
            config,
            output,
            retry,
            current: None,
        }
    }

    /// Launch the target once, then poll its file until a fatal error.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        self.start()?;

        let mut ticker = interval_at(
            Instant::now() + self.config.poll_interval,
            self.config.poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await?;
        }
    }

    /// Initial launch. Any failure here, busy included, is fatal.
    fn start(&mut self) -> Result<(), SupervisorError> {
        let process =
            ManagedProcess::launch(&self.target, self.output).map_err(|source| {
                SupervisorError::Launch {
                    path: self.target.path.clone(),
                    source,
                }
            })?;

        info!(
            path = %self.target.path.display(),
            pid = process.pid().unwrap_or(0),
            "started, watching for changes"
        );
        self.current = Some(process);
        Ok(())
    }

    /// One poll cycle: stat the file and reload if it is newer than the
    /// running instance.
    async fn tick(&mut self) -> Result<TickOutcome, SupervisorError> {
        let Some(current) = self.current.as_ref() else {
            return Ok(TickOutcome::Unchanged);
        };

        match detect::poll(&self.target.path, current.started_at()) {
            PollOutcome::Unchanged => Ok(TickOutcome::Unchanged),
            PollOutcome::Missing => Ok(TickOutcome::Missing),
            PollOutcome::Changed => {
                info!(path = %self.target.path.display(), "binary changed, reloading");
                self.reload().await?;
                Ok(TickOutcome::Reloaded)
            }
        }
    }

    /// Kill the current instance, observe its death, wait out the grace
    /// period, then launch the new binary through the busy-retry policy.
    async fn reload(&mut self) -> Result<(), SupervisorError> {
        if let Some(old) = self.current.take() {
            match old.teardown().await {
                Ok(status) => info!(%status, "previous instance terminated"),
                Err(err) => warn!(error = %err, "previous instance exit not observed cleanly"),
            }
        }

        // The file that just changed may not be executable again yet.
        tokio::time::sleep(self.config.grace_period).await;

        let target = &self.target;
        let output = self.output;
        let process = retry::relaunch_with_backoff(&mut self.retry, || async move {
            ManagedProcess::launch(target, output)
        })
        .await
        .map_err(|source| SupervisorError::Relaunch {
            path: self.target.path.clone(),
            source,
        })?;

        info!(pid = process.pid().unwrap_or(0), "relaunched");
        self.current = Some(process);
        Ok(())
    }
}
