//! # opwatch
//!
//! A terminal dashboard and library for watching data operations: it
//! rebuilds execution sessions from a flat log of phase records, groups live
//! activity (queries, transfers, jobs) into a filterable tree, and keeps
//! rolling resource metrics for sparklines.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  source (Feed) ──▶ poll (Scheduler) ──mpsc──▶ app ──▶ ui        │
//! │  FileFeed | ChannelFeed | StreamFeeds        │                   │
//! │                                              ▼                   │
//! │                                 data: session / tree / history   │
//! │                                                                  │
//! │  app ──outbox──▶ command::dispatch ──▶ CommandSink               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`data`]**: the pure core. Session reconstruction, grouping and
//!   filtering, metric history, sparkline quantization.
//! - **[`source`]**: the [`Feed`] trait and its file, channel and stream
//!   implementations.
//! - **[`poll`]**: one [`Scheduler`] for every feed; skips ticks while a fetch
//!   is in flight and stops delivering on cancellation.
//! - **[`app`]**: dashboard state. Applies updates, keeps stale data on
//!   errors, owns expand/selection state.
//! - **[`command`]**: the "terminate operation" administrative command.
//! - **[`ui`]**: ratatui rendering.
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch JSON files rewritten by an exporter
//! opwatch --phases phases.json --items activity.json --metrics metrics.json
//!
//! # All feeds over one TCP connection (newline-delimited, tagged JSON)
//! opwatch --connect localhost:9090
//!
//! # Reconstruct sessions once and write them out
//! opwatch --phases phases.json --export sessions.json
//! ```
//!
//! ### Reconstructing sessions
//!
//! ```
//! use opwatch::data::{reconstruct, check_partition};
//! use opwatch::data::session::DEFAULT_MATCH_WINDOW;
//! use opwatch_types::{PhaseRecord, PhaseStatus};
//!
//! let records = vec![
//!     PhaseRecord::new("1", PhaseStatus::InProgress).started_at("2024-03-01T10:00:00Z"),
//!     PhaseRecord::new("2", PhaseStatus::Success)
//!         .started_at("2024-03-01T10:00:30Z")
//!         .ended_at("2024-03-01T10:00:30Z"),
//! ];
//!
//! let sessions = reconstruct(&records, DEFAULT_MATCH_WINDOW);
//! assert_eq!(sessions.len(), 1);
//! assert!(check_partition(&sessions).is_ok());
//! ```
//!
//! ### Feeding the dashboard from a channel
//!
//! ```
//! use opwatch::source::{ChannelFeed, FeedPayload};
//!
//! let (tx, feed) = ChannelFeed::create("in-process", FeedPayload::Items(Vec::new()));
//! ```

pub mod app;
pub mod command;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod export;
pub mod logging;
pub mod poll;
pub mod source;
pub mod ui;

pub use app::{App, View};
pub use command::{ChannelCommandSink, CommandSink, NoCommands, StreamCommandSink};
pub use config::Settings;
pub use data::{GroupTree, MetricSeries, Session, SessionReconstructor};
pub use error::{CommandError, FeedError, PartitionViolation};
pub use poll::{Scheduler, TickGate};
pub use source::{ChannelFeed, Feed, FeedKind, FeedPayload, FeedUpdate, FileFeed, StreamFeeds};
