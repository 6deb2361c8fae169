use std::path::PathBuf;
use std::time::Duration;

/// The binary to run and watch: the executable path plus the arguments
/// passed to it on every launch. Immutable for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct Target {
    pub path: PathBuf,
    pub args: Vec<String>,
}

impl Target {
    pub fn new(path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            path: path.into(),
            args,
        }
    }
}

/// Timing knobs for the supervision loop.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// How often the watched file's mtime is checked.
    pub poll_interval: Duration,
    /// Delay between killing the old instance and relaunching, so a
    /// freshly overwritten executable has time to become runnable again.
    pub grace_period: Duration,
    pub retry: RetryConfig,
}

/// Bounds for the busy-retry sub-loop around a failed relaunch.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Consecutive "text file busy" failures tolerated before giving up.
    pub max_attempts: u32,
    /// First backoff delay; doubles on each further attempt.
    pub base_delay: Duration,
}

// --- Default implementations ---

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            grace_period: Duration::from_millis(500),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}
