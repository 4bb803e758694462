//! JSON files in a save directory.
//!
//! Layout for trial `t`:
//! - `info_trial{t}.json`: settings and priors of the run
//! - `initial_stats_trial{t}.json`: bootstrap transitions and parameters
//! - `ibphmm_stats_trial{t}_iter{NNNNNN}.json`: one per checkpoint
//!
//! Every file is an [`ArtifactEnvelope`] written atomically (temp file,
//! fsync, rename). Reads check the schema version and the payload digest.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::{InitialStats, RunInfo, SnapshotStore, StatsSnapshot};
use crate::error::StatsError;

/// Schema version of persisted statistics.
pub const STATS_SCHEMA_VERSION: &str = "1.0.0";

const SNAPSHOT_PREFIX: &str = "ibphmm_stats_trial";
const ITER_MARKER: &str = "_iter";
const JSON_SUFFIX: &str = ".json";

/// Versioned envelope wrapping every persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope<T> {
    pub schema_version: String,
    /// Run that produced this artifact.
    pub run_id: String,
    /// RFC-3339 creation time.
    pub generated_at: String,
    pub host_id: String,
    /// SHA-256 hex digest of the compact payload JSON.
    pub integrity_sha256: String,
    pub payload: T,
}

impl<T: Serialize> ArtifactEnvelope<T> {
    pub fn new(run_id: &str, host_id: &str, payload: T) -> Result<Self, serde_json::Error> {
        let integrity_sha256 = payload_digest(&payload)?;
        Ok(Self {
            schema_version: STATS_SCHEMA_VERSION.to_string(),
            run_id: run_id.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            host_id: host_id.to_string(),
            integrity_sha256,
            payload,
        })
    }
}

fn payload_digest<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(payload)?;
    Ok(hex::encode(Sha256::digest(json.as_bytes())))
}

/// Same major version.
fn is_compatible(version: &str) -> bool {
    let major = |v: &str| v.split('.').next().map(str::to_string);
    major(version).is_some() && major(version) == major(STATS_SCHEMA_VERSION)
}

/// A checkpoint file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub trial: u32,
    pub iteration: u64,
    pub path: PathBuf,
}

/// Writes statistics under one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    run_id: String,
    host_id: String,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, run_id: &str, host_id: &str) -> Self {
        Self {
            dir: dir.into(),
            run_id: run_id.to_string(),
            host_id: host_id.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(dir: &Path, trial: u32, iteration: u64) -> PathBuf {
        dir.join(format!(
            "{SNAPSHOT_PREFIX}{trial}{ITER_MARKER}{iteration:06}{JSON_SUFFIX}"
        ))
    }

    pub fn info_path(dir: &Path, trial: u32) -> PathBuf {
        dir.join(format!("info_trial{trial}.json"))
    }

    pub fn initial_path(dir: &Path, trial: u32) -> PathBuf {
        dir.join(format!("initial_stats_trial{trial}.json"))
    }

    fn write<T: Serialize>(&self, path: &Path, payload: T) -> Result<(), StatsError> {
        let envelope =
            ArtifactEnvelope::new(&self.run_id, &self.host_id, payload).map_err(|e| {
                StatsError::Json {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
        write_json_pretty_atomic(path, &envelope)
    }

    /// Checkpoints in `dir`, sorted by (trial, iteration). A missing
    /// directory has none.
    pub fn list(dir: &Path, trial: Option<u32>) -> Result<Vec<SnapshotEntry>, StatsError> {
        let read = match std::fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StatsError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
        };

        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| StatsError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let name = entry.file_name();
            let Some((t, iteration)) = name.to_str().and_then(parse_snapshot_name) else {
                continue;
            };
            if trial.is_some_and(|want| want != t) {
                continue;
            }
            entries.push(SnapshotEntry {
                trial: t,
                iteration,
                path: entry.path(),
            });
        }
        entries.sort_by_key(|e| (e.trial, e.iteration));
        Ok(entries)
    }

    /// Load and verify any envelope.
    pub fn load<T: DeserializeOwned + Serialize>(
        path: &Path,
    ) -> Result<ArtifactEnvelope<T>, StatsError> {
        let content = std::fs::read_to_string(path).map_err(|e| StatsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let envelope: ArtifactEnvelope<T> =
            serde_json::from_str(&content).map_err(|e| StatsError::Json {
                path: path.to_path_buf(),
                source: e,
            })?;

        if !is_compatible(&envelope.schema_version) {
            return Err(StatsError::SchemaVersion {
                path: path.to_path_buf(),
                expected: STATS_SCHEMA_VERSION.to_string(),
                actual: envelope.schema_version,
            });
        }

        let computed = payload_digest(&envelope.payload).map_err(|e| StatsError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        if computed != envelope.integrity_sha256 {
            return Err(StatsError::Integrity {
                path: path.to_path_buf(),
            });
        }
        Ok(envelope)
    }

    /// Most recent checkpoint of `trial`, if any.
    pub fn latest(
        dir: &Path,
        trial: u32,
    ) -> Result<Option<ArtifactEnvelope<StatsSnapshot>>, StatsError> {
        match Self::list(dir, Some(trial))?.last() {
            Some(entry) => Self::load(&entry.path).map(Some),
            None => Ok(None),
        }
    }
}

impl SnapshotStore for FileStore {
    fn save_info(&mut self, info: RunInfo) -> Result<(), StatsError> {
        let path = Self::info_path(&self.dir, info.trial);
        self.write(&path, info)
    }

    fn save_initial(&mut self, initial: InitialStats) -> Result<(), StatsError> {
        let path = Self::initial_path(&self.dir, initial.trial);
        self.write(&path, initial)
    }

    fn save(&mut self, snapshot: StatsSnapshot) -> Result<(), StatsError> {
        let path = Self::snapshot_path(&self.dir, snapshot.trial, snapshot.iteration);
        self.write(&path, snapshot)
    }
}

/// `ibphmm_stats_trial{t}_iter{i}.json` → `(t, i)`.
fn parse_snapshot_name(name: &str) -> Option<(u32, u64)> {
    let rest = name.strip_prefix(SNAPSHOT_PREFIX)?.strip_suffix(JSON_SUFFIX)?;
    let (trial, iteration) = rest.split_once(ITER_MARKER)?;
    Some((trial.parse().ok()?, iteration.parse().ok()?))
}

fn write_json_pretty_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StatsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StatsError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let content = serde_json::to_vec_pretty(value).map_err(|e| StatsError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("stats.json");
    let tmp_path = path.with_file_name(format!("{}.tmp.{}", file_name, std::process::id()));
    {
        use std::io::Write;
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| StatsError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        file.write_all(&content).map_err(|e| StatsError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        let _ = file.sync_all();
    }
    std::fs::rename(&tmp_path, path).map_err(|e| StatsError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
