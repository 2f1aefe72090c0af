//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway call:
//!     → timeouts.rs (per-call deadline around resolve → sign → upstream)
//!
//! Upstream read (theta.GetAccount, theta.GetStatus):
//!     → retries.rs (idempotent? how many rounds?)
//!     → backoff.rs (jittered delay between rounds)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for idempotent reads, never for broadcasts

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{is_idempotent, RetryPolicy};
pub use timeouts::{with_deadline, DeadlineExceeded};
