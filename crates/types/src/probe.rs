//! Retry configuration attached to match assertions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attempts made by an assertion when no configuration is supplied.
pub const DEFAULT_TIMES_TO_TRY: u32 = 1;
/// Delay between attempts when no configuration is supplied.
pub const DEFAULT_SLEEP_TIME_MS: u64 = 200;

/// Controls how often a probed step is re-invoked and how long to wait between attempts.
///
/// A value is immutable once attached to an assertion. `times_to_try` is always at least 1;
/// the fallible [`ProbeParams::new`] constructor and [`ProbeParams::validate`] enforce this for
/// values built by hand or deserialized from settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ProbeParams {
    /// Maximum number of invocations, including the first one.
    #[serde(default = "default_times_to_try")]
    pub times_to_try: u32,
    /// Milliseconds to block between two attempts. Zero retries immediately.
    #[serde(default = "default_sleep_time_ms")]
    pub sleep_time_ms: u64,
}

/// Raised when a [`ProbeParams`] value cannot drive a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("times_to_try must be at least 1 (got {times_to_try})")]
pub struct InvalidProbeParams {
    /// The rejected attempt budget.
    pub times_to_try: u32,
}

impl ProbeParams {
    /// Builds validated parameters.
    pub fn new(times_to_try: u32, sleep_time_ms: u64) -> Result<Self, InvalidProbeParams> {
        let params = Self {
            times_to_try,
            sleep_time_ms,
        };
        params.validate()?;
        Ok(params)
    }

    /// Parameters that invoke exactly once and never sleep.
    pub fn once() -> Self {
        Self {
            times_to_try: 1,
            sleep_time_ms: 0,
        }
    }

    /// Checks the attempt budget.
    pub fn validate(&self) -> Result<(), InvalidProbeParams> {
        if self.times_to_try == 0 {
            return Err(InvalidProbeParams {
                times_to_try: self.times_to_try,
            });
        }
        Ok(())
    }

    /// Inter-attempt delay as a [`Duration`].
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_millis(self.sleep_time_ms)
    }

    /// Whether an assertion using these parameters should go through the probe loop.
    pub fn is_retrying(&self) -> bool {
        self.times_to_try > 1
    }
}

impl Default for ProbeParams {
    fn default() -> Self {
        Self {
            times_to_try: DEFAULT_TIMES_TO_TRY,
            sleep_time_ms: DEFAULT_SLEEP_TIME_MS,
        }
    }
}

fn default_times_to_try() -> u32 {
    DEFAULT_TIMES_TO_TRY
}

fn default_sleep_time_ms() -> u64 {
    DEFAULT_SLEEP_TIME_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_attempts() {
        let error = ProbeParams::new(0, 10).unwrap_err();
        assert_eq!(error.times_to_try, 0);
        assert!(error.to_string().contains("at least 1"));
    }

    #[test]
    fn deserializes_with_defaults_for_missing_fields() {
        let params: ProbeParams = serde_json::from_str(r#"{"times_to_try": 4}"#).expect("deserialize params");
        assert_eq!(params.times_to_try, 4);
        assert_eq!(params.sleep_time_ms, DEFAULT_SLEEP_TIME_MS);
        assert!(params.is_retrying());
    }

    #[test]
    fn once_never_retries() {
        let params = ProbeParams::once();
        assert!(!params.is_retrying());
        assert_eq!(params.sleep_duration(), Duration::ZERO);
    }
}
