//! Channel-based feed.
//!
//! Receives snapshots through a tokio watch channel, for embedding the
//! dashboard in a process that already has the data in memory.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{Feed, FeedPayload};
use crate::error::FeedError;

/// A feed whose snapshots are pushed by a producer.
///
/// The watch channel only keeps the newest value, so a slow poll interval
/// never builds a backlog.
///
/// # Example
///
/// ```
/// use opwatch::source::{ChannelFeed, FeedPayload};
///
/// let (tx, feed) = ChannelFeed::create("in-process", FeedPayload::Phases(Vec::new()));
/// tx.send(FeedPayload::Phases(Vec::new())).unwrap();
/// ```
#[derive(Debug)]
pub struct ChannelFeed {
    receiver: Mutex<watch::Receiver<FeedPayload>>,
    description: String,
}

impl ChannelFeed {
    /// Wrap an existing receiver. Its current value is returned on the
    /// first fetch.
    pub fn new(mut receiver: watch::Receiver<FeedPayload>, source_description: &str) -> Self {
        receiver.mark_changed();
        Self {
            receiver: Mutex::new(receiver),
            description: format!("channel: {}", source_description),
        }
    }

    /// Create a sender/feed pair seeded with `initial`.
    pub fn create(
        source_description: &str,
        initial: FeedPayload,
    ) -> (watch::Sender<FeedPayload>, Self) {
        let (tx, rx) = watch::channel(initial);
        (tx, Self::new(rx, source_description))
    }
}

#[async_trait]
impl Feed for ChannelFeed {
    async fn fetch(&self) -> Result<Option<FeedPayload>, FeedError> {
        let mut receiver = self.receiver.lock();
        match receiver.has_changed() {
            Ok(true) => Ok(Some(receiver.borrow_and_update().clone())),
            Ok(false) => Ok(None),
            Err(_) => Err(FeedError::Disconnected(self.description.clone())),
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}
