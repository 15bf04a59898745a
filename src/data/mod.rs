//! Data models and processing.
//!
//! Everything in here is synchronous and infallible: malformed input
//! degrades to placeholders instead of errors, so a bad record never takes
//! the dashboard down.
//!
//! ## Submodules
//!
//! - [`session`]: pairing phase records into [`Session`]s
//! - [`tree`]: filtering and grouping monitoring items, expand/selection state
//! - [`history`]: fixed-capacity metric history per channel
//! - [`sparkline`]: window-relative quantization for sparklines
//! - [`duration`]: parsing and formatting of durations ("5s", "24h")
//! - [`timestamp`]: lenient timestamp parsing
//!
//! ## Data Flow
//!
//! ```text
//! phases feed ──▶ SessionReconstructor::reconstruct ──▶ Vec<Session>
//! items feed  ──▶ tree::group(items, filters, by)    ──▶ GroupTree
//! metrics feed ─▶ MetricSeries::record_tick          ──▶ sparkline::levels
//! ```

pub mod duration;
pub mod history;
pub mod session;
pub mod sparkline;
pub mod timestamp;
pub mod tree;

pub use history::{MetricRingBuffer, MetricSeries, MAX_HISTORY_SIZE};
pub use session::{
    check_partition, reconstruct, MatchStrategy, Session, SessionKind, SessionReconstructor,
    SessionSummary,
};
pub use sparkline::{levels, window_levels};
pub use tree::{
    group, reconcile_selection, toggle_expand, ExpandAction, ExpandState, FilterSet, GroupBy,
    GroupTree, ItemKey,
};
