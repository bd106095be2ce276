use crate::domain::{Amount, ResultCode, Timestamp};

/// Thresholds that decide whether a non-zero delta is written to the ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerPolicy {
    /// Absolute percentage change at or above which a commit happens.
    pub threshold_percent: f64,
    /// Seconds since the last commit above which a commit happens.
    pub threshold_period_seconds: i64,
}

impl TriggerPolicy {
    /// First matching rule wins:
    /// zero delta, then percentage threshold, then elapsed time, then no trigger.
    pub fn evaluate(
        &self,
        delta: Amount,
        percentage_change: f64,
        now: Timestamp,
        previous_commit: Timestamp,
    ) -> ResultCode {
        if delta.is_zero() {
            return ResultCode::DeltaZeroNoWrite;
        }
        if percentage_change.abs() >= self.threshold_percent {
            return ResultCode::PercentageChangeThresholdReached;
        }
        if now.seconds_since(previous_commit) > self.threshold_period_seconds {
            return ResultCode::TimeSinceLastCommitThresholdReached;
        }
        ResultCode::NoTriggerNoWrite
    }
}
