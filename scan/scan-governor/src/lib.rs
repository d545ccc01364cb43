//! Resource governor for the scan pipeline.
//!
//! Tracks four counters against fixed quotas and gates admission of new work:
//!
//! - **memory** and **concurrent tasks** are held by a [`ResourceLease`] and
//!   given back when the lease is released or dropped
//! - **storage** persists until [`ResourceGovernor::release_storage`]
//! - **bandwidth** is consumption that resets after a period without activity
//!
//! Admission is all-or-nothing: a refused request leaves every counter as it
//! was. [`ResourceGovernor::acquire_with_retry`] retries with exponential
//! backoff, and [`ResourceGovernor::spawn_reclaimer`] runs the periodic sweep
//! that resets idle bandwidth and reclaims task slots from stale leases.
//!
//! # Example
//!
//! ```
//! use scan_governor::{GovernorConfig, ResourceGovernor, ResourceRequest};
//!
//! let governor = ResourceGovernor::new(GovernorConfig::default());
//! let lease = governor
//!     .try_acquire(ResourceRequest::new().memory(64 * 1024 * 1024).tasks(1))
//!     .unwrap();
//!
//! assert_eq!(governor.usage().tasks, 1);
//! drop(lease);
//! assert_eq!(governor.usage().tasks, 0);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod governor;
mod reclaimer;

pub use config::{GovernorConfig, ResourceQuota, RetryPolicy};
pub use error::{GovernorError, GovernorResult};
pub use governor::{
    ResourceGovernor, ResourceKind, ResourceLease, ResourceRequest, ResourceUsage, UsageEvent,
    UsageSample,
};
pub use reclaimer::ReclaimerHandle;
