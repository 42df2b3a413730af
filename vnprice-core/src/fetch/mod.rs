//! Fetch resilience layer: planning, orchestration and merging.

pub mod backoff;
pub mod events;
pub mod merge;
pub mod mode;
pub mod orchestrator;
pub mod planner;
pub mod state;

pub use backoff::{RecordingSleeper, RetryPolicy, Sleeper, ThreadSleeper};
pub use events::{EventLog, EventSink, FetchEvent, NullSink, TracingSink};
pub use merge::{merge, merge_outcomes, Gap, MergeError, MergedSeries};
pub use mode::ModeFlag;
pub use orchestrator::{FetchError, Orchestrator, TickerOutcome, DEFAULT_DEGRADED_DELAY};
pub use planner::{plan, split_range, FetchMode, FetchUnit, MAX_SINGLE_REQUEST_DAYS};
pub use state::{FetchPhase, FetchState, Transition};
