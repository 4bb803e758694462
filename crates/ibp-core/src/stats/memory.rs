//! In-process store. Handles are cheap clones over shared contents, so a
//! caller can keep one and inspect what the recorder wrote.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{InitialStats, RunInfo, SnapshotStore, StatsSnapshot};
use crate::error::StatsError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStoreContents {
    pub info: Option<RunInfo>,
    pub initial: Option<InitialStats>,
    /// In first-write order; rewriting a key replaces it in place.
    pub snapshots: Vec<StatsSnapshot>,
    pub flushes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreContents>>,
    fail_at: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `save` fails for `iteration`.
    pub fn failing_at(iteration: u64) -> Self {
        Self {
            inner: Arc::default(),
            fail_at: Some(iteration),
        }
    }

    pub fn contents(&self) -> MemoryStoreContents {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreContents> {
        // A panicking writer cannot leave the contents half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SnapshotStore for MemoryStore {
    fn save_info(&mut self, info: RunInfo) -> Result<(), StatsError> {
        self.lock().info = Some(info);
        Ok(())
    }

    fn save_initial(&mut self, initial: InitialStats) -> Result<(), StatsError> {
        self.lock().initial = Some(initial);
        Ok(())
    }

    fn save(&mut self, snapshot: StatsSnapshot) -> Result<(), StatsError> {
        if self.fail_at == Some(snapshot.iteration) {
            return Err(StatsError::Worker(format!(
                "refusing to store iteration {}",
                snapshot.iteration
            )));
        }
        let mut inner = self.lock();
        match inner
            .snapshots
            .iter_mut()
            .find(|s| s.trial == snapshot.trial && s.iteration == snapshot.iteration)
        {
            Some(slot) => *slot = snapshot,
            None => inner.snapshots.push(snapshot),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StatsError> {
        self.lock().flushes += 1;
        Ok(())
    }
}
