//! Resilience Features
//!
//! Admission control in front of the generation service and retry logic
//! around each remote call.

pub mod admission;
pub mod retry;

// Re-exports
pub use admission::{AdmissionController, AdmissionStatus, Clock, ManualClock, SystemClock};
pub use retry::{RetryPolicy, RetryStrategy, Retryable};
