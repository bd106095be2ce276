//! Cycle execution: the reconciler applying engine plans, and the scheduler around it.

pub mod clock;
pub mod reconciler;
pub mod scheduler;

pub use clock::{Clock, FixedClock, SystemClock};
pub use reconciler::{EngineError, Reconciler};
pub use scheduler::{run_pull_loop, CycleRunner, SchedulerError, TickOutcome};
