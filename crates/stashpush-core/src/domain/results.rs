//! Build outcome codes as reported by the build engine.

use serde::{Deserialize, Serialize};

/// Outcome of a finished build.
///
/// The build engine encodes results as small integers; the mapping is part of
/// its event contract and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Results {
    Success,
    Warnings,
    Failure,
    Skipped,
    Exception,
    Retry,
    Cancelled,
}

impl Results {
    /// Lower-case name used in human readable messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Results::Success => "success",
            Results::Warnings => "warnings",
            Results::Failure => "failure",
            Results::Skipped => "skipped",
            Results::Exception => "exception",
            Results::Retry => "retry",
            Results::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Results::Success)
    }
}

impl TryFrom<u8> for Results {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match code {
            0 => Results::Success,
            1 => Results::Warnings,
            2 => Results::Failure,
            3 => Results::Skipped,
            4 => Results::Exception,
            5 => Results::Retry,
            6 => Results::Cancelled,
            other => return Err(format!("unknown build result code: {other}")),
        })
    }
}

impl From<Results> for u8 {
    fn from(results: Results) -> u8 {
        match results {
            Results::Success => 0,
            Results::Warnings => 1,
            Results::Failure => 2,
            Results::Skipped => 3,
            Results::Exception => 4,
            Results::Retry => 5,
            Results::Cancelled => 6,
        }
    }
}

impl std::fmt::Display for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
