//! # opwatch-types
//!
//! Record types for the three feeds an opwatch dashboard polls. These are the
//! shapes external collectors produce and the dashboard consumes read-only.
//!
//! ## Feeds
//!
//! - **Operation history**: [`PhaseRecord`]s, one per logged phase transition
//!   of an operation (in progress, success, error). Records carry no session
//!   identifier; opwatch pairs them back into sessions.
//! - **Monitoring items**: [`MonitoringItem`]s, a tagged union of active
//!   queries, CDC/transfer events and job log entries that share enough shape
//!   to be grouped and filtered together.
//! - **Resource metrics**: [`MetricSample`]s, one scalar per channel per tick,
//!   or a [`MetricHistory`] for bulk hydration.
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON (and other formats) via serde
//!
//! ## Example
//!
//! ```rust
//! use opwatch_types::{PhaseRecord, PhaseStatus};
//!
//! let started = PhaseRecord::new("41", PhaseStatus::InProgress)
//!     .started_at("2024-03-01T10:00:00Z");
//! let finished = PhaseRecord::new("42", PhaseStatus::Success)
//!     .started_at("2024-03-01T10:00:30Z")
//!     .ended_at("2024-03-01T10:00:31Z")
//!     .duration(1.0)
//!     .rows(1200);
//!
//! assert!(!started.status.is_terminal());
//! assert!(finished.status.is_terminal());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod item;
mod message;
mod metric;
mod phase;

pub use item::*;
pub use message::*;
pub use metric::*;
pub use phase::*;

/// Placeholder used wherever a grouping or display field is absent.
pub const UNKNOWN: &str = "Unknown";
