//! Engine settings: probe defaults loaded from the environment or a settings file.

use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use flowstate_types::ProbeParams;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Overrides the default number of attempts made by assertions.
pub const TIMES_TO_TRY_ENV: &str = "FLOWSTATE_TIMES_TO_TRY";
/// Overrides the default delay between assertion attempts, in milliseconds.
pub const SLEEP_TIME_MS_ENV: &str = "FLOWSTATE_SLEEP_TIME_MS";

/// Settings applied to every run built from them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Retry defaults for assertions that do not carry their own parameters.
    #[serde(default)]
    pub probe: ProbeParams,
}

impl Settings {
    /// Defaults overridden by `FLOWSTATE_*` environment variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        if let Some(times_to_try) = read_env::<u32>(TIMES_TO_TRY_ENV)? {
            settings.probe.times_to_try = times_to_try;
        }
        if let Some(sleep_time_ms) = read_env::<u64>(SLEEP_TIME_MS_ENV)? {
            settings.probe.sleep_time_ms = sleep_time_ms;
        }
        settings.probe.validate()?;
        Ok(settings)
    }

    /// Loads settings from a YAML or JSON file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        settings.probe.validate()?;
        debug!(path = %path.display(), times_to_try = settings.probe.times_to_try, "loaded settings");
        Ok(settings)
    }
}

fn read_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => {
            let parsed = raw.trim().parse::<T>().with_context(|| format!("invalid value for {name}: {raw}"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}
