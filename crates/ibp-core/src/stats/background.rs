//! Store wrapper that writes on a dedicated thread.
//!
//! One worker drains a FIFO channel, so writes land in submission order.
//! A failed write is reported by the next call on the handle (or by
//! `flush`) and names the snapshot it belonged to; later writes still run.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::warn;

use super::{InitialStats, RunInfo, SnapshotStore, StatsSnapshot};
use crate::error::StatsError;
use crate::logging::event_names;

enum Job {
    Info(RunInfo),
    Initial(InitialStats),
    Save(StatsSnapshot),
    Flush(Sender<()>),
}

pub struct BackgroundStore {
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    failures: Arc<Mutex<Vec<String>>>,
}

impl BackgroundStore {
    pub fn spawn<S: SnapshotStore + 'static>(inner: S) -> Result<Self, StatsError> {
        let (tx, rx) = mpsc::channel();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let worker = std::thread::Builder::new()
            .name("ibp-stats-writer".to_string())
            .spawn(move || run_worker(inner, rx, sink))
            .map_err(|e| StatsError::Worker(format!("failed to start writer thread: {e}")))?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            failures,
        })
    }

    fn submit(&mut self, job: Job) -> Result<(), StatsError> {
        self.take_failure()?;
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| StatsError::Worker("writer already stopped".to_string()))?;
        tx.send(job)
            .map_err(|_| StatsError::Worker("writer thread exited".to_string()))
    }

    fn take_failure(&self) -> Result<(), StatsError> {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        if failures.is_empty() {
            return Ok(());
        }
        let joined = failures.drain(..).collect::<Vec<_>>().join("; ");
        Err(StatsError::Worker(joined))
    }
}

fn run_worker<S: SnapshotStore>(mut inner: S, rx: Receiver<Job>, failures: Arc<Mutex<Vec<String>>>) {
    for job in rx {
        let (what, result) = match job {
            Job::Info(info) => ("run info".to_string(), inner.save_info(info)),
            Job::Initial(initial) => ("initial statistics".to_string(), inner.save_initial(initial)),
            Job::Save(snapshot) => {
                let what = format!(
                    "snapshot of trial {} iteration {}",
                    snapshot.trial, snapshot.iteration
                );
                (what, inner.save(snapshot))
            }
            Job::Flush(ack) => {
                let result = inner.flush();
                if let Err(e) = &result {
                    failures
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(format!("flush: {e}"));
                }
                let _ = ack.send(());
                continue;
            }
        };
        if let Err(e) = result {
            warn!(target: event_names::STATS_SAVED, job = %what, error = %e, "Background write failed");
            failures
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(format!("{what}: {e}"));
        }
    }
}

impl SnapshotStore for BackgroundStore {
    fn save_info(&mut self, info: RunInfo) -> Result<(), StatsError> {
        self.submit(Job::Info(info))
    }

    fn save_initial(&mut self, initial: InitialStats) -> Result<(), StatsError> {
        self.submit(Job::Initial(initial))
    }

    fn save(&mut self, snapshot: StatsSnapshot) -> Result<(), StatsError> {
        self.submit(Job::Save(snapshot))
    }

    fn flush(&mut self) -> Result<(), StatsError> {
        let (ack_tx, ack_rx) = mpsc::channel();
        if let Some(tx) = &self.tx {
            tx.send(Job::Flush(ack_tx))
                .map_err(|_| StatsError::Worker("writer thread exited".to_string()))?;
            ack_rx
                .recv()
                .map_err(|_| StatsError::Worker("writer thread exited".to_string()))?;
        }
        self.take_failure()
    }
}

impl Drop for BackgroundStore {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue drains.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for BackgroundStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundStore")
            .field("running", &self.tx.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparams::Hyperparams;
    use crate::stats::MemoryStore;

    fn snapshot(iteration: u64) -> StatsSnapshot {
        StatsSnapshot {
            trial: 0,
            iteration,
            num_objects: 0,
            hyperparams: Hyperparams {
                alpha: 1.0,
                kappa: 1.0,
                sigma: 1.0,
                gamma: 1.0,
            },
            summaries: Vec::new(),
            features: None,
            transitions: None,
            params: None,
            state_sequences: None,
        }
    }

    #[test]
    fn writes_arrive_in_order() {
        let memory = MemoryStore::new();
        let mut store = BackgroundStore::spawn(memory.clone()).unwrap();
        for i in 1..=20 {
            store.save(snapshot(i)).unwrap();
        }
        store.flush().unwrap();

        let iters: Vec<u64> = memory
            .contents()
            .snapshots
            .iter()
            .map(|s| s.iteration)
            .collect();
        assert_eq!(iters, (1..=20).collect::<Vec<_>>());
        assert_eq!(memory.contents().flushes, 1);
    }

    /// Fails every snapshot write without saying which one.
    struct Refusing;

    impl SnapshotStore for Refusing {
        fn save_info(&mut self, _info: RunInfo) -> Result<(), StatsError> {
            Ok(())
        }

        fn save_initial(&mut self, _initial: InitialStats) -> Result<(), StatsError> {
            Ok(())
        }

        fn save(&mut self, _snapshot: StatsSnapshot) -> Result<(), StatsError> {
            Err(StatsError::Worker("disk full".to_string()))
        }

        fn flush(&mut self) -> Result<(), StatsError> {
            Ok(())
        }
    }

    #[test]
    fn deferred_failure_names_the_iteration_that_failed() {
        let mut store = BackgroundStore::spawn(Refusing).unwrap();
        store.save(snapshot(7)).unwrap();
        let err = store.flush().unwrap_err();
        let StatsError::Worker(msg) = err else {
            panic!("unexpected error {err:?}");
        };
        assert!(msg.starts_with("snapshot of trial 0 iteration 7: "), "{msg}");
        assert!(msg.ends_with("disk full"), "{msg}");
    }

    #[test]
    fn failure_is_reported_by_the_next_submit() {
        let mut store = BackgroundStore::spawn(Refusing).unwrap();
        store.save(snapshot(3)).unwrap();
        // Drain the queue without reading the failure.
        let (ack_tx, ack_rx) = mpsc::channel();
        store.tx.as_ref().unwrap().send(Job::Flush(ack_tx)).unwrap();
        ack_rx.recv().unwrap();

        let err = store.save(snapshot(4)).unwrap_err();
        let StatsError::Worker(msg) = &err else {
            panic!("unexpected error {err:?}");
        };
        assert!(msg.contains("iteration 3"), "{msg}");
        assert!(!msg.contains("iteration 4"), "{msg}");
    }

    #[test]
    fn worker_failure_surfaces_on_flush() {
        let mut store = BackgroundStore::spawn(MemoryStore::failing_at(2)).unwrap();
        store.save(snapshot(1)).unwrap();
        let _ = store.save(snapshot(2));
        let err = store.flush().unwrap_err();
        assert!(matches!(err, StatsError::Worker(msg) if msg.contains("iteration 2")));
        // Reported once.
        assert!(store.flush().is_ok());
    }
}
