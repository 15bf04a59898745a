//! Envelopes for multiplexed transports.
//!
//! When all three feeds share one connection, each line is a [`FeedMessage`]
//! tagged with the feed it belongs to. Administrative commands travel the
//! other way as [`AdminCommand`]s.

use alloc::string::String;
use alloc::vec::Vec;

use crate::{MetricHistory, MetricSample, MonitoringItem, PhaseRecord};

/// A snapshot for one feed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "feed", content = "data", rename_all = "snake_case"))]
pub enum FeedMessage {
    Phases(Vec<PhaseRecord>),
    Items(Vec<MonitoringItem>),
    Metrics(MetricSample),
    MetricHistory(MetricHistory),
}

/// A command sent from the dashboard to whatever owns the operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "command", rename_all = "snake_case"))]
pub enum AdminCommand {
    /// Terminate the operation (query, job, transfer) with this identifier.
    Terminate { id: String },
}
