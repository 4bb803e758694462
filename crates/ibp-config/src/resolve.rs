//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI arguments → environment variables → XDG paths → defaults.

use std::path::{Path, PathBuf};

/// Discovered configuration file paths.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to model.json (or None if not found).
    pub model: Option<PathBuf>,

    /// Path to settings.json / settings.toml (or None if not found).
    pub settings: Option<PathBuf>,

    /// Source of the model config (for diagnostics).
    pub model_source: ConfigSource,

    /// Source of the settings (for diagnostics).
    pub settings_source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

const ENV_MODEL_PATH: &str = "IBP_MODEL";
const ENV_SETTINGS_PATH: &str = "IBP_SETTINGS";
const ENV_CONFIG_DIR: &str = "IBP_CONFIG_DIR";

const MODEL_FILENAMES: &[&str] = &["model.json"];
const SETTINGS_FILENAMES: &[&str] = &["settings.json", "settings.toml"];

/// Application name for XDG directories.
const APP_NAME: &str = "ibp-hmm";

/// Resolve configuration paths.
///
/// For each file:
/// 1. Explicit CLI path (if it exists)
/// 2. Environment variable (IBP_MODEL, IBP_SETTINGS)
/// 3. IBP_CONFIG_DIR + standard file name
/// 4. XDG config directory (~/.config/ibp-hmm/)
/// 5. Built-in defaults (None)
pub fn resolve_config(cli_model: Option<&Path>, cli_settings: Option<&Path>) -> ConfigPaths {
    let mut paths = ConfigPaths::default();

    paths.model = resolve_single_config(
        cli_model,
        ENV_MODEL_PATH,
        MODEL_FILENAMES,
        &mut paths.model_source,
    );

    paths.settings = resolve_single_config(
        cli_settings,
        ENV_SETTINGS_PATH,
        SETTINGS_FILENAMES,
        &mut paths.settings_source,
    );

    paths
}

fn resolve_single_config(
    cli_path: Option<&Path>,
    env_var: &str,
    filenames: &[&str],
    source: &mut ConfigSource,
) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        if path.exists() {
            *source = ConfigSource::CliArgument;
            return Some(path.to_path_buf());
        }
    }

    if let Ok(env_path) = std::env::var(env_var) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            *source = ConfigSource::Environment;
            return Some(path);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        if let Some(path) = first_existing(Path::new(&config_dir), filenames) {
            *source = ConfigSource::Environment;
            return Some(path);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        if let Some(path) = first_existing(&dir, filenames) {
            *source = ConfigSource::XdgConfig;
            return Some(path);
        }
    }

    *source = ConfigSource::BuiltinDefault;
    None
}

fn first_existing(dir: &Path, filenames: &[&str]) -> Option<PathBuf> {
    filenames
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// XDG config directory for the sampler.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Default directory for persisted statistics when settings name none.
pub fn default_save_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_NAME).join("stats"))
        .unwrap_or_else(|| PathBuf::from("ibp-hmm-stats"))
}
