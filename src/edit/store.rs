use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use nix::fcntl::{Flock, FlockArg};

use super::types::EditSessionState;
use crate::common::paths;

const SESSION_FILE_NAME: &str = "session.json";
const LOCK_EXTENSION: &str = "lock";

/// Exclusive hold on the session snapshot. Released on drop.
pub struct SessionLock {
    _flock: Flock<File>,
}

/// Snapshot file for surviving process death. Ordinary presentation
/// rebuilds never go through here.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(paths::vedit_data_dir()?.join(SESSION_FILE_NAME)))
    }

    /// Block until no other process holds the session, then hold it.
    /// Every load-modify-save of the snapshot happens under this lock.
    pub fn lock(&self) -> Result<SessionLock> {
        let lock_path = self.path.with_extension(LOCK_EXTENSION);
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating session directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("opening session lock {}", lock_path.display()))?;
        let flock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            anyhow!("locking session {}: {errno}", lock_path.display())
        })?;
        Ok(SessionLock { _flock: flock })
    }

    pub fn load(&self) -> Result<Option<EditSessionState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading session snapshot {}", self.path.display()))?;
        let state = serde_json::from_str(&contents)
            .with_context(|| format!("parsing session snapshot {}", self.path.display()))?;
        Ok(Some(state))
    }

    /// Write through a temporary file so a crash never leaves half a snapshot
    pub fn save(&self, state: &EditSessionState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating session directory {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(state).context("serializing session snapshot")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("writing session snapshot {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing session snapshot {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("removing session snapshot {}", self.path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::filters::FilterId;
    use crate::edit::types::{MediaRef, PlaybackResumePoint};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn snapshot_survives_a_save_load_cycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/session.json");
        let store = SessionStore::new(&path);
        assert!(store.load().unwrap().is_none());

        let mut state = EditSessionState::new(MediaRef::new("/videos/b.mp4"));
        state.filter.applied = FilterId::Blue;
        state.resume = PlaybackResumePoint::captured(Some(0), 1_500, false);
        state.job_in_flight = true;

        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::new(&path);
        fs::write(&path, "{ not json").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let held = store.lock().unwrap();

        let (tx, rx) = mpsc::channel();
        let contender = store.clone();
        let waiter = thread::spawn(move || {
            let _lock = contender.lock().unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        waiter.join().unwrap();
    }
}
