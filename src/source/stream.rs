//! Stream-based feeds.
//!
//! One connection carries all three feeds as newline-delimited
//! [`FeedMessage`]s. A background task reads the lines and parks the newest
//! snapshot per feed until the scheduler fetches it. A metric history waits
//! in its own slot so a later sample cannot overwrite it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use opwatch_types::{FeedMessage, MetricHistory};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{Feed, FeedKind, FeedPayload};
use crate::error::FeedError;

#[derive(Debug, Default)]
struct Shared {
    pending: HashMap<FeedKind, FeedPayload>,
    /// Delivered before any pending sample.
    history: Option<MetricHistory>,
    error: Option<FeedError>,
}

impl Shared {
    fn take(&mut self, kind: FeedKind) -> Option<FeedPayload> {
        if kind == FeedKind::Metrics {
            if let Some(history) = self.history.take() {
                return Some(FeedPayload::MetricHistory(history));
            }
        }
        self.pending.remove(&kind)
    }

    fn accept(&mut self, line: &[u8]) {
        match serde_json::from_slice::<FeedMessage>(line) {
            Ok(message) => {
                self.error = None;
                match FeedPayload::from(message) {
                    FeedPayload::MetricHistory(history) => {
                        // Samples older than the history are covered by it.
                        self.pending.remove(&FeedKind::Metrics);
                        self.history = Some(history);
                    }
                    payload => {
                        self.pending.insert(payload.kind(), payload);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed feed message");
                self.error = Some(e.into());
            }
        }
    }
}

/// One feed's view of a shared stream.
#[derive(Debug)]
pub struct StreamFeed {
    kind: FeedKind,
    shared: Arc<Mutex<Shared>>,
    description: String,
}

#[async_trait]
impl Feed for StreamFeed {
    async fn fetch(&self) -> Result<Option<FeedPayload>, FeedError> {
        let mut shared = self.shared.lock();
        if let Some(payload) = shared.take(self.kind) {
            return Ok(Some(payload));
        }
        match &shared.error {
            Some(error) => Err(error.clone()),
            None => Ok(None),
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// The three feeds demultiplexed from one stream.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use opwatch::source::StreamFeeds;
///
/// # tokio_test::block_on(async {
/// let data = br#"{"feed":"phases","data":[]}"#.to_vec();
/// let feeds = StreamFeeds::spawn(Cursor::new(data), "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamFeeds {
    pub phases: StreamFeed,
    pub items: StreamFeed,
    pub metrics: StreamFeed,
}

impl StreamFeeds {
    /// Spawn a background task reading newline-delimited feed messages
    /// from `reader`.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let handle = shared.clone();
        let desc = description.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(source = %desc, "Stream closed");
                        handle.lock().error =
                            Some(FeedError::Disconnected("connection closed".to_string()));
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            handle.lock().accept(trimmed.as_bytes());
                        }
                    }
                    Err(e) => {
                        handle.lock().error = Some(e.into());
                        break;
                    }
                }
            }
        });

        Self::with_shared(shared, description)
    }

    /// Demultiplex raw JSON messages pushed through a channel, e.g. from a
    /// message bus subscription.
    pub fn from_bytes_channel(mut rx: mpsc::Receiver<Vec<u8>>, description: &str) -> Self {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let handle = shared.clone();

        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                handle.lock().accept(&bytes);
            }
            handle.lock().error = Some(FeedError::Disconnected("channel closed".to_string()));
        });

        Self::with_shared(shared, description)
    }

    fn with_shared(shared: Arc<Mutex<Shared>>, description: &str) -> Self {
        let feed = |kind: FeedKind| StreamFeed {
            kind,
            shared: shared.clone(),
            description: format!("stream: {}", description),
        };
        Self {
            phases: feed(FeedKind::Phases),
            items: feed(FeedKind::Items),
            metrics: feed(FeedKind::Metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    const PHASES: &str = r#"{"feed":"phases","data":[{"id":"1","status":"SUCCESS"}]}"#;
    const METRICS: &str = r#"{"feed":"metrics","data":{"timestamp_ms":5,"values":{"cpu":1.0}}}"#;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_stream_demultiplexes_feeds() {
        let data = format!("{}\n{}\n", PHASES, METRICS);
        let feeds = StreamFeeds::spawn(Cursor::new(data), "test");
        settle().await;

        assert!(matches!(feeds.phases.fetch().await, Ok(Some(FeedPayload::Phases(_)))));
        assert!(matches!(feeds.metrics.fetch().await, Ok(Some(FeedPayload::Metrics(_)))));
        // Nothing was sent for items, and the stream has ended.
        assert!(matches!(feeds.items.fetch().await, Err(FeedError::Disconnected(_))));
    }

    #[tokio::test]
    async fn test_stream_keeps_newest_per_feed() {
        let older = r#"{"feed":"phases","data":[]}"#;
        let data = format!("{}\n{}\n", older, PHASES);
        let feeds = StreamFeeds::spawn(Cursor::new(data), "test");
        settle().await;

        match feeds.phases.fetch().await {
            Ok(Some(FeedPayload::Phases(records))) => assert_eq!(records.len(), 1),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_history_is_not_lost_to_a_later_sample() {
        let history = r#"{"feed":"metric_history","data":{"channels":{"cpu":[{"timestamp_ms":1,"value":0.5}]}}}"#;
        let data = format!("{}\n{}\n", history, METRICS);
        let feeds = StreamFeeds::spawn(Cursor::new(data), "test");
        settle().await;

        assert!(matches!(
            feeds.metrics.fetch().await,
            Ok(Some(FeedPayload::MetricHistory(_)))
        ));
        assert!(matches!(
            feeds.metrics.fetch().await,
            Ok(Some(FeedPayload::Metrics(_)))
        ));
    }

    #[tokio::test]
    async fn test_stream_history_supersedes_an_earlier_sample() {
        let history = r#"{"feed":"metric_history","data":{"channels":{"cpu":[{"timestamp_ms":9,"value":0.5}]}}}"#;
        let data = format!("{}\n{}\n", METRICS, history);
        let feeds = StreamFeeds::spawn(Cursor::new(data), "test");
        settle().await;

        assert!(matches!(
            feeds.metrics.fetch().await,
            Ok(Some(FeedPayload::MetricHistory(_)))
        ));
        assert!(matches!(feeds.metrics.fetch().await, Err(FeedError::Disconnected(_))));
    }

    #[tokio::test]
    async fn test_stream_description() {
        let feeds = StreamFeeds::spawn(Cursor::new(""), "tcp://localhost:9090");
        assert_eq!(feeds.items.description(), "stream: tcp://localhost:9090");
    }

    #[tokio::test]
    async fn test_stream_from_bytes_channel() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let feeds = StreamFeeds::from_bytes_channel(rx, "bus");

        tx.send(PHASES.as_bytes().to_vec()).await.unwrap();
        settle().await;
        assert!(matches!(feeds.phases.fetch().await, Ok(Some(_))));

        // Still open, nothing new
        assert!(matches!(feeds.phases.fetch().await, Ok(None)));
    }

    #[tokio::test]
    async fn test_stream_parse_error_clears_on_next_message() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let feeds = StreamFeeds::from_bytes_channel(rx, "bus");

        tx.send(b"not json".to_vec()).await.unwrap();
        settle().await;
        assert!(matches!(feeds.items.fetch().await, Err(FeedError::Parse(_))));

        tx.send(METRICS.as_bytes().to_vec()).await.unwrap();
        settle().await;
        assert!(matches!(feeds.items.fetch().await, Ok(None)));
    }
}
