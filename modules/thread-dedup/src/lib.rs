pub mod api;
pub mod backoff;
pub mod config;
pub mod error;
pub mod executor;
pub mod normalize;
pub mod paginator;
pub mod planner;
pub mod retry;
pub mod sweep;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use api::{ThreadApi, TopicRef};
pub use config::Config;
pub use error::{CallError, ConfigError, SweepError};
pub use planner::{DeletionPlan, PlanPreview, Planner};
pub use retry::{call_with_retry, RetryPolicy};
pub use sweep::{RunOptions, RunSummary, Sweeper};
