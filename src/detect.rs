/// Change detection for the watched executable, one stat per poll cycle.
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

/// Result of one modification check on the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// File present and not modified since the reference time.
    Unchanged,
    /// File's mtime is strictly newer than the reference time.
    Changed,
    /// File cannot currently be stat'd. Skip this cycle.
    Missing,
}

/// Compare the file's mtime against `reference`, the running instance's
/// start time. Stat failures are treated as transient: the file is
/// typically absent for a moment while a build rewrites it.
pub fn poll(path: &Path, reference: SystemTime) -> PollOutcome {
    let mtime = match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(mtime) => mtime,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "stat failed, skipping this cycle");
            return PollOutcome::Missing;
        }
    };

    if mtime > reference {
        PollOutcome::Changed
    } else {
        PollOutcome::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::time::Duration;

    #[test]
    fn unchanged_when_reference_is_newer_than_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app");
        std::fs::write(&path, "bin").unwrap();

        let reference = SystemTime::now() + Duration::from_secs(5);
        assert_eq!(poll(&path, reference), PollOutcome::Unchanged);
    }

    #[test]
    fn changed_when_mtime_is_newer_than_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app");
        std::fs::write(&path, "bin").unwrap();

        let reference = SystemTime::now() - Duration::from_secs(5);
        assert_eq!(poll(&path, reference), PollOutcome::Changed);
    }

    #[test]
    fn exact_mtime_match_is_unchanged() {
        // Only strictly newer timestamps may trigger a reload.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app");
        std::fs::write(&path, "bin").unwrap();

        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        filetime::set_file_mtime(&path, FileTime::from_system_time(mtime)).unwrap();
        assert_eq!(poll(&path, mtime), PollOutcome::Unchanged);
    }

    #[test]
    fn missing_when_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone");
        assert_eq!(poll(&path, SystemTime::now()), PollOutcome::Missing);
    }

    #[test]
    fn changed_after_an_explicit_mtime_bump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app");
        std::fs::write(&path, "bin").unwrap();

        let reference = SystemTime::now();
        let bumped = reference + Duration::from_secs(2);
        filetime::set_file_mtime(&path, FileTime::from_system_time(bumped)).unwrap();
        assert_eq!(poll(&path, reference), PollOutcome::Changed);
    }
}
