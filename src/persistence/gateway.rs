//! Persistence gateway bound into the task store.
//!
//! Every save runs inside a [`SaveSession`]: the gateway is acquired when the
//! session opens and released when it drops, whichever way the save ends.

use super::files::{atomic_write, day_file, read_file};
use super::snapshot::StoreSnapshot;
use crate::error::PersistenceError;
use chrono::NaiveDate;
use log::{debug, warn};
use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};

/// Storage behind the task store
pub trait PersistenceGateway {
    /// Load the persisted state for `day`; `None` when nothing was saved yet
    fn load(&mut self, day: NaiveDate) -> Result<Option<StoreSnapshot>, PersistenceError>;

    /// Take whatever exclusive handle a save needs
    fn acquire(&mut self) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError>;

    /// Give back what `acquire` took; must not fail
    fn release(&mut self) {}
}

/// Scoped hold on a gateway; releases on drop
pub struct SaveSession<'a> {
    gateway: &'a mut dyn PersistenceGateway,
}

impl<'a> SaveSession<'a> {
    pub fn open(gateway: &'a mut dyn PersistenceGateway) -> Result<Self, PersistenceError> {
        gateway.acquire()?;
        Ok(Self { gateway })
    }

    pub fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError> {
        self.gateway.save(snapshot)
    }
}

impl Drop for SaveSession<'_> {
    fn drop(&mut self) {
        self.gateway.release();
    }
}

fn save_scoped(
    gateway: &mut dyn PersistenceGateway,
    snapshot: &StoreSnapshot,
) -> Result<(), PersistenceError> {
    let mut session = SaveSession::open(gateway)?;
    session.save(snapshot)
}

/// Save once, and once more if the first attempt fails
pub fn save_with_retry(
    gateway: &mut dyn PersistenceGateway,
    snapshot: &StoreSnapshot,
) -> Result<(), PersistenceError> {
    match save_scoped(gateway, snapshot) {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!("save of {} failed ({}), retrying once", snapshot.day, first);
            save_scoped(gateway, snapshot)
        }
    }
}

/// Locks older than this are left over from a crashed writer
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);
const LOCK_FILE_NAME: &str = ".dayplan.lock";

/// One pretty-printed JSON file per day inside a data directory
pub struct JsonFileGateway {
    dir: PathBuf,
    held_lock: Option<PathBuf>,
}

impl JsonFileGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            held_lock: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }

    fn try_lock(path: &Path) -> std::io::Result<()> {
        OpenOptions::new().write(true).create_new(true).open(path)?;
        Ok(())
    }

    fn is_stale(path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map(|age| age > STALE_LOCK_AGE)
            .unwrap_or(false)
    }
}

impl PersistenceGateway for JsonFileGateway {
    fn load(&mut self, day: NaiveDate) -> Result<Option<StoreSnapshot>, PersistenceError> {
        let path = day_file(&self.dir, day);
        let content =
            read_file(&path).map_err(|e| PersistenceError::Other(format!("{:#}", e)))?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        debug!("loading {}", path.display());
        StoreSnapshot::from_json(&content).map(Some)
    }

    fn acquire(&mut self) -> Result<(), PersistenceError> {
        let path = self.lock_path();
        match Self::try_lock(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists && Self::is_stale(&path) => {
                warn!("removing stale lock {}", path.display());
                fs::remove_file(&path)?;
                Self::try_lock(&path)?;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(PersistenceError::Locked(path));
            }
            Err(e) => return Err(e.into()),
        }
        self.held_lock = Some(path);
        Ok(())
    }

    fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError> {
        let json = snapshot.to_json()?;
        atomic_write(day_file(&self.dir, snapshot.day), &json)
            .map_err(|e| PersistenceError::Other(format!("{:#}", e)))
    }

    fn release(&mut self) {
        if let Some(path) = self.held_lock.take() {
            if let Err(e) = fs::remove_file(&path) {
                warn!("failed to remove lock {}: {}", path.display(), e);
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    saved: Option<String>,
    fail_next: u32,
    saves: u32,
    acquired: u32,
    released: u32,
}

/// In-memory gateway for previews and tests
///
/// Clones share the same storage, so a caller can keep a handle to inspect
/// what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_snapshot(snapshot: &StoreSnapshot) -> Result<Self, PersistenceError> {
        let gateway = Self::new();
        gateway.state.borrow_mut().saved = Some(snapshot.to_json()?);
        Ok(gateway)
    }

    /// Make the next `count` saves fail
    pub fn fail_next(&self, count: u32) {
        self.state.borrow_mut().fail_next = count;
    }

    pub fn saved(&self) -> Option<StoreSnapshot> {
        let state = self.state.borrow();
        state
            .saved
            .as_deref()
            .and_then(|json| StoreSnapshot::from_json(json).ok())
    }

    pub fn save_count(&self) -> u32 {
        self.state.borrow().saves
    }

    pub fn acquire_count(&self) -> u32 {
        self.state.borrow().acquired
    }

    pub fn release_count(&self) -> u32 {
        self.state.borrow().released
    }
}

impl PersistenceGateway for MemoryGateway {
    fn load(&mut self, day: NaiveDate) -> Result<Option<StoreSnapshot>, PersistenceError> {
        let state = self.state.borrow();
        match state.saved.as_deref() {
            Some(json) => {
                let snapshot = StoreSnapshot::from_json(json)?;
                Ok(Some(snapshot).filter(|s| s.day == day))
            }
            None => Ok(None),
        }
    }

    fn acquire(&mut self) -> Result<(), PersistenceError> {
        self.state.borrow_mut().acquired += 1;
        Ok(())
    }

    fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError> {
        let mut state = self.state.borrow_mut();
        state.saves += 1;
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(PersistenceError::Other("simulated storage failure".to_string()));
        }
        state.saved = Some(snapshot.to_json()?);
        Ok(())
    }

    fn release(&mut self) {
        self.state.borrow_mut().released += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskItem, TaskSpec};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn snapshot() -> StoreSnapshot {
        let start = day().and_hms_opt(10, 0, 0).unwrap();
        let task = TaskItem::new(TaskSpec::new("Write", start, chrono::Duration::hours(1))).unwrap();
        StoreSnapshot::new(day(), vec![task], Vec::new(), Vec::new())
    }

    #[test]
    fn test_session_releases_on_failure() {
        let mut gateway = MemoryGateway::new();
        let handle = gateway.clone();
        gateway.fail_next(1);

        let result = save_scoped(&mut gateway, &snapshot());

        assert!(result.is_err());
        assert_eq!(handle.acquire_count(), 1);
        assert_eq!(handle.release_count(), 1);
    }

    #[test]
    fn test_retry_once_recovers() {
        let mut gateway = MemoryGateway::new();
        let handle = gateway.clone();
        gateway.fail_next(1);

        save_with_retry(&mut gateway, &snapshot()).unwrap();

        assert_eq!(handle.save_count(), 2);
        assert_eq!(handle.release_count(), 2);
        assert!(handle.saved().is_some());
    }

    #[test]
    fn test_retry_gives_up_after_second_failure() {
        let mut gateway = MemoryGateway::new();
        let handle = gateway.clone();
        gateway.fail_next(3);

        assert!(save_with_retry(&mut gateway, &snapshot()).is_err());
        assert_eq!(handle.save_count(), 2);
        assert!(handle.saved().is_none());
    }

    #[test]
    fn test_json_gateway_round_trip_and_lock_cleanup() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut gateway = JsonFileGateway::new(temp_dir.path());

        assert!(gateway.load(day()).unwrap().is_none());
        save_with_retry(&mut gateway, &snapshot()).unwrap();

        let loaded = gateway.load(day()).unwrap().unwrap();
        assert_eq!(loaded.tasks.len(), 1);
        assert!(!temp_dir.path().join(LOCK_FILE_NAME).exists());
    }

    #[test]
    fn test_json_gateway_refuses_when_locked() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut gateway = JsonFileGateway::new(temp_dir.path());
        fs::write(temp_dir.path().join(LOCK_FILE_NAME), "").unwrap();

        let err = save_scoped(&mut gateway, &snapshot()).unwrap_err();
        assert!(matches!(err, PersistenceError::Locked(_)));
        // The foreign lock is left alone
        assert!(temp_dir.path().join(LOCK_FILE_NAME).exists());
    }
}
