//! Bounded history storage and context bookkeeping.
//!
//! Every analyzer in the scan pipeline keeps recent results without unbounded
//! growth and addresses its session state by opaque id:
//!
//! - [`BoundedHistory`] - Fixed-capacity ring buffer, evicts oldest first
//! - [`KeyedHistory`] - One bounded history per key (scan, session, entity)
//! - [`ContextRegistry`] - Generational slot map handing out [`ContextId`]s
//!
//! Readers receive owned snapshots, never references into a live buffer that
//! another writer may be mutating.
//!
//! # Example
//!
//! ```
//! use scan_history::{BoundedHistory, ContextRegistry};
//!
//! let mut history = BoundedHistory::new(2);
//! history.push(1);
//! history.push(2);
//! assert_eq!(history.push(3), Some(1));
//! assert_eq!(history.snapshot(), vec![2, 3]);
//!
//! let mut contexts = ContextRegistry::new();
//! let id = contexts.insert("session");
//! assert_eq!(contexts.remove(id), Some("session"));
//! assert!(contexts.get(id).is_none());
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod keyed;
mod registry;
mod ring;

pub use keyed::KeyedHistory;
pub use registry::ContextRegistry;
pub use ring::BoundedHistory;

pub use scan_types::ContextId;
