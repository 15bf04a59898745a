//! Feed abstraction for receiving snapshots.
//!
//! The dashboard reads three logically separate feeds: phase records,
//! monitoring items and resource metrics. Each is a [`Feed`] that hands back
//! a whole snapshot per fetch; where the bytes come from (a file on disk, an
//! in-process channel, a socket) is up to the implementation.

mod channel;
mod file;
mod stream;

pub use channel::ChannelFeed;
pub use file::FileFeed;
pub use stream::{StreamFeed, StreamFeeds};

use std::fmt::{self, Debug};

use async_trait::async_trait;
use opwatch_types::{FeedMessage, MetricHistory, MetricSample, MonitoringItem, PhaseRecord};
use serde::Deserialize;

use crate::error::FeedError;

/// Which feed a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedKind {
    Phases,
    Items,
    Metrics,
}

impl FeedKind {
    pub const ALL: [FeedKind; 3] = [FeedKind::Phases, FeedKind::Items, FeedKind::Metrics];

    pub fn label(&self) -> &'static str {
        match self {
            FeedKind::Phases => "phases",
            FeedKind::Items => "activity",
            FeedKind::Metrics => "metrics",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One snapshot from one feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPayload {
    Phases(Vec<PhaseRecord>),
    Items(Vec<MonitoringItem>),
    /// A single tick of metric values.
    Metrics(MetricSample),
    /// Full history, used to hydrate the series.
    MetricHistory(MetricHistory),
}

/// Metric files may hold either one tick or a whole history.
#[derive(Deserialize)]
#[serde(untagged)]
enum MetricsWire {
    History(MetricHistory),
    Sample(MetricSample),
}

impl FeedPayload {
    /// The feed this payload is for.
    pub fn kind(&self) -> FeedKind {
        match self {
            FeedPayload::Phases(_) => FeedKind::Phases,
            FeedPayload::Items(_) => FeedKind::Items,
            FeedPayload::Metrics(_) | FeedPayload::MetricHistory(_) => FeedKind::Metrics,
        }
    }

    /// Parse an untagged JSON document as a snapshot of `kind`.
    pub fn decode(kind: FeedKind, json: &str) -> Result<Self, FeedError> {
        let payload = match kind {
            FeedKind::Phases => FeedPayload::Phases(serde_json::from_str(json)?),
            FeedKind::Items => FeedPayload::Items(serde_json::from_str(json)?),
            FeedKind::Metrics => match serde_json::from_str(json)? {
                MetricsWire::History(history) => FeedPayload::MetricHistory(history),
                MetricsWire::Sample(sample) => FeedPayload::Metrics(sample),
            },
        };
        Ok(payload)
    }
}

impl From<FeedMessage> for FeedPayload {
    fn from(message: FeedMessage) -> Self {
        match message {
            FeedMessage::Phases(records) => FeedPayload::Phases(records),
            FeedMessage::Items(items) => FeedPayload::Items(items),
            FeedMessage::Metrics(sample) => FeedPayload::Metrics(sample),
            FeedMessage::MetricHistory(history) => FeedPayload::MetricHistory(history),
        }
    }
}

/// The outcome of one scheduled fetch, as delivered to the app.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedUpdate {
    pub kind: FeedKind,
    pub result: Result<FeedPayload, FeedError>,
}

impl FeedUpdate {
    pub fn ok(payload: FeedPayload) -> Self {
        Self {
            kind: payload.kind(),
            result: Ok(payload),
        }
    }

    pub fn err(kind: FeedKind, error: FeedError) -> Self {
        Self {
            kind,
            result: Err(error),
        }
    }
}

/// A source of snapshots for one feed.
///
/// `fetch` takes `&self` so the scheduler can run it on a spawned task while
/// still owning the feed; implementations keep their change-tracking state
/// behind interior mutability.
///
/// # Example
///
/// ```no_run
/// use opwatch::source::{Feed, FeedKind, FileFeed};
///
/// # tokio_test::block_on(async {
/// let feed = FileFeed::new("phases.json", FeedKind::Phases);
/// if let Ok(Some(payload)) = feed.fetch().await {
///     println!("{:?}", payload.kind());
/// }
/// # });
/// ```
#[async_trait]
pub trait Feed: Send + Sync + Debug {
    /// Fetch the latest snapshot.
    ///
    /// `Ok(None)` means nothing changed since the previous fetch.
    async fn fetch(&self) -> Result<Option<FeedPayload>, FeedError>;

    /// Human-readable origin, shown in the status bar.
    fn description(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_phases() {
        let payload =
            FeedPayload::decode(FeedKind::Phases, r#"[{"id":"a","status":"IN_PROGRESS"}]"#).unwrap();
        assert!(matches!(payload, FeedPayload::Phases(ref r) if r.len() == 1));
        assert_eq!(payload.kind(), FeedKind::Phases);
    }

    #[test]
    fn decode_metrics_sample_or_history() {
        let sample = FeedPayload::decode(
            FeedKind::Metrics,
            r#"{"timestamp_ms":1000,"values":{"cpu":12.5}}"#,
        )
        .unwrap();
        assert!(matches!(sample, FeedPayload::Metrics(ref s) if s.values["cpu"] == 12.5));

        let history = FeedPayload::decode(
            FeedKind::Metrics,
            r#"{"channels":{"cpu":[{"timestamp_ms":1,"value":2.0}]}}"#,
        )
        .unwrap();
        assert!(matches!(history, FeedPayload::MetricHistory(ref h) if h.channels["cpu"].len() == 1));
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        let err = FeedPayload::decode(FeedKind::Items, r#"{"not":"a list"}"#).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }

    #[test]
    fn feed_message_maps_to_payload() {
        let payload: FeedPayload = FeedMessage::Items(Vec::new()).into();
        assert_eq!(payload.kind(), FeedKind::Items);
    }
}
