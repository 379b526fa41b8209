//! Shared, serializable types used by the Flowstate engine and by anything that consumes its
//! assertion reports.

pub mod probe;
pub mod report;

pub use probe::{DEFAULT_SLEEP_TIME_MS, DEFAULT_TIMES_TO_TRY, InvalidProbeParams, ProbeParams};
pub use report::{AssertionReport, AssertionStatus, DESCRIPTION_SEPARATOR, MatchResult, Mismatch};
