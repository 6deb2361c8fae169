use tokio::io::AsyncRead;
use tokio::process::Child;
use tracing::debug;

/// Where a child's output bytes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Stream both child streams to our stdout as they arrive.
    #[default]
    Forward,
    /// Drop the child's output entirely.
    Discard,
}

/// Detach one copy task per captured stream. The tasks are not joined:
/// each ends on its own once the child exits and the OS closes its pipe,
/// so a superseded instance's relays cannot outlive it.
pub fn spawn_relays(child: &mut Child, mode: OutputMode) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(relay(stdout, mode));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(relay(stderr, mode));
    }
}

/// Copy bytes from one child stream until the pipe closes.
async fn relay<R>(mut source: R, mode: OutputMode)
where
    R: AsyncRead + Unpin,
{
    let result = match mode {
        OutputMode::Forward => tokio::io::copy(&mut source, &mut tokio::io::stdout()).await,
        OutputMode::Discard => tokio::io::copy(&mut source, &mut tokio::io::sink()).await,
    };
    if let Err(err) = result {
        debug!(error = %err, "output relay ended early");
    }
}
