//! Structured event vocabulary for logging.
//!
//! Every event carries a run id, the trial being sampled and a stage, so
//! JSONL output from several trials can be interleaved and still grouped.

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Phases of a sampler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Configuration and data loading.
    Init,
    /// Hyperparameters, feature matrix and the bootstrap draws.
    Bootstrap,
    /// Main Gibbs iterations.
    Sweep,
    /// Statistics persistence.
    Persist,
    /// Evaluation arrays and final summaries.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Bootstrap => "bootstrap",
            Stage::Sweep => "sweep",
            Stage::Persist => "persist",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";
    pub const DATA_LOADED: &str = "data.loaded";

    // Bootstrap
    pub const BOOTSTRAP_STARTED: &str = "bootstrap.started";
    pub const BOOTSTRAP_FINISHED: &str = "bootstrap.finished";

    // Sweep
    pub const SWEEP_ITERATION: &str = "sweep.iteration";
    pub const SWEEP_CANCELLED: &str = "sweep.cancelled";
    pub const SWEEP_FAILED: &str = "sweep.failed";
    pub const SWEEP_RESTORED: &str = "sweep.restored";
    pub const SWEEP_FINISHED: &str = "sweep.finished";

    // Persistence
    pub const STATS_SAVED: &str = "stats.saved";
    pub const STATS_FLUSHED: &str = "stats.flushed";
}

/// Correlation ids shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    /// Host identifier.
    pub host_id: String,
    /// Trial being sampled, once known.
    pub trial: Option<u32>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
            trial: None,
        }
    }

    pub fn with_trial(mut self, trial: u32) -> Self {
        self.trial = Some(trial);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context() {
        let ctx = LogContext::new("run-abc", "host-xyz").with_trial(4);
        assert_eq!(ctx.run_id, "run-abc");
        assert_eq!(ctx.host_id, "host-xyz");
        assert_eq!(ctx.trial, Some(4));
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [
            Stage::Init,
            Stage::Bootstrap,
            Stage::Sweep,
            Stage::Persist,
            Stage::Report,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_names::RUN_STARTED, "run.started");
        assert_eq!(event_names::SWEEP_ITERATION, "sweep.iteration");
        assert_eq!(event_names::STATS_SAVED, "stats.saved");
    }
}
