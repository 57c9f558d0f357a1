//! Conversion scheduling: admission, deduplication, retries, caching.

mod scheduler;

pub use scheduler::{Scheduler, SchedulerSettings};
