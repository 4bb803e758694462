//! Exit codes for the ibp-core CLI.
//!
//! Exit code ranges:
//! - 0-9: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/input errors (fix the configuration or data and rerun)
//! - 20-29: Run failures (the chain stopped; restart from the last checkpoint)

/// Exit codes for ibp-core operations.
///
/// These codes are a stable contract for batch drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// All requested iterations completed
    Clean = 0,

    /// Stopped between iterations (cancel or deadline); last iteration persisted
    Interrupted = 1,

    /// Invalid arguments
    ArgsError = 10,

    /// Malformed or invalid model / settings
    ConfigError = 11,

    /// Observation data inconsistent with itself or the model
    DataError = 12,

    /// Checkpoint schema or integrity mismatch
    VersionError = 13,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// Persisting statistics failed
    IoError = 21,

    /// A sampler failed during an iteration
    SamplerError = 22,

    /// Building the initial structures failed
    InitError = 23,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// The run produced a usable chain prefix.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::Interrupted)
    }

    /// Fixable by changing inputs (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Error code name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Interrupted => "OK_INTERRUPTED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::DataError => "ERR_DATA",
            ExitCode::VersionError => "ERR_VERSION",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::SamplerError => "ERR_SAMPLER",
            ExitCode::InitError => "ERR_INIT",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
