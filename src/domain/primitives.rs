//! Domain primitives: Timestamp, ResultCode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time in whole seconds since Unix epoch. `0` doubles as "never".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const NEVER: Timestamp = Timestamp(0);

    pub fn new(secs: i64) -> Self {
        Timestamp(secs)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Timestamp(chrono::Utc::now().timestamp())
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Seconds elapsed from `earlier` to `self`.
    pub fn seconds_since(&self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome code of a reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    DeltaZeroNoWrite,
    PercentageChangeThresholdReached,
    TimeSinceLastCommitThresholdReached,
    NoTriggerNoWrite,
    HaltedNoWrite,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::DeltaZeroNoWrite => "DELTA_ZERO_NO_WRITE",
            ResultCode::PercentageChangeThresholdReached => "PERCENTAGE_CHANGE_THRESHOLD_REACHED",
            ResultCode::TimeSinceLastCommitThresholdReached => {
                "TIME_SINCE_LAST_COMMIT_THRESHOLD_REACHED"
            }
            ResultCode::NoTriggerNoWrite => "NO_TRIGGER_NO_WRITE",
            ResultCode::HaltedNoWrite => "HALTED_NO_WRITE",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ResultCode::DeltaZeroNoWrite => "delta is zero - not writing to ledger",
            ResultCode::PercentageChangeThresholdReached => {
                "percentage change threshold reached - writing to ledger"
            }
            ResultCode::TimeSinceLastCommitThresholdReached => {
                "time since last ledger write threshold reached - writing to ledger"
            }
            ResultCode::NoTriggerNoWrite => {
                "delta is not zero, but neither the percentage nor the time threshold was reached"
            }
            ResultCode::HaltedNoWrite => "vault is halted - not writing to ledger",
        }
    }

    /// True for the codes that are accompanied by a ledger commit.
    pub fn commits(&self) -> bool {
        matches!(
            self,
            ResultCode::PercentageChangeThresholdReached
                | ResultCode::TimeSinceLastCommitThresholdReached
        )
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_serialization_matches_as_str() {
        for code in [
            ResultCode::DeltaZeroNoWrite,
            ResultCode::PercentageChangeThresholdReached,
            ResultCode::TimeSinceLastCommitThresholdReached,
            ResultCode::NoTriggerNoWrite,
            ResultCode::HaltedNoWrite,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_seconds_since() {
        assert_eq!(Timestamp::new(111).seconds_since(Timestamp::new(100)), 11);
        assert_eq!(Timestamp::new(5).seconds_since(Timestamp::NEVER), 5);
    }

    #[test]
    fn test_timestamp_is_plain_number_in_json() {
        let json = serde_json::to_string(&Timestamp::new(1_700_000_000)).unwrap();
        assert_eq!(json, "1700000000");
    }
}
