//! Periodic polling of feeds.
//!
//! Every feed is driven by the same [`Scheduler`] loop, parameterised by the
//! feed and its interval. Two rules hold for each feed:
//!
//! - fetches never overlap: a tick that arrives while the previous fetch is
//!   still running is skipped, not queued ([`TickGate`]);
//! - nothing is delivered after shutdown: the cancellation token is checked
//!   once the fetch returns, and the receiving side checks its own token
//!   again before applying.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FeedError;
use crate::source::{Feed, FeedKind, FeedUpdate};

/// Default upper bound on a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// In-flight guard for one feed.
#[derive(Debug, Clone, Default)]
pub struct TickGate {
    busy: Arc<AtomicBool>,
}

impl TickGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate, or `None` if a fetch is already running.
    pub fn try_enter(&self) -> Option<TickGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one fetch; re-opens the gate on drop.
#[derive(Debug)]
pub struct TickGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Handle to one running poll loop.
#[derive(Debug)]
pub struct PollHandle {
    kind: FeedKind,
    gate: TickGate,
    skipped: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// Ticks dropped because a fetch was still in flight.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn is_fetching(&self) -> bool {
        self.gate.is_busy()
    }

    /// Wait for the loop to exit (after cancellation).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawns poll loops that deliver [`FeedUpdate`]s to one channel.
#[derive(Debug, Clone)]
pub struct Scheduler {
    token: CancellationToken,
    tx: mpsc::Sender<FeedUpdate>,
    fetch_timeout: Duration,
}

impl Scheduler {
    pub fn new(token: CancellationToken, tx: mpsc::Sender<FeedUpdate>) -> Self {
        Self {
            token,
            tx,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop every loop spawned by this scheduler.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Poll `feed` every `interval` until the token is cancelled.
    ///
    /// The first tick fires immediately.
    pub fn spawn(&self, feed: Arc<dyn Feed>, kind: FeedKind, interval: Duration) -> PollHandle {
        let gate = TickGate::new();
        let skipped = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(run_loop(
            feed,
            kind,
            interval,
            self.fetch_timeout,
            self.token.clone(),
            self.tx.clone(),
            gate.clone(),
            skipped.clone(),
        ));

        PollHandle {
            kind,
            gate,
            skipped,
            task,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    feed: Arc<dyn Feed>,
    kind: FeedKind,
    interval: Duration,
    fetch_timeout: Duration,
    token: CancellationToken,
    tx: mpsc::Sender<FeedUpdate>,
    gate: TickGate,
    skipped: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(feed = %kind, source = feed.description(), ?interval, "Polling started");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(guard) = gate.try_enter() else {
            let count = skipped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(feed = %kind, skipped = count, "Fetch still in flight, skipping tick");
            continue;
        };

        tokio::spawn(fetch_once(
            feed.clone(),
            kind,
            fetch_timeout,
            token.clone(),
            tx.clone(),
            guard,
        ));
    }

    info!(feed = %kind, skipped = skipped.load(Ordering::Relaxed), "Polling stopped");
}

async fn fetch_once(
    feed: Arc<dyn Feed>,
    kind: FeedKind,
    fetch_timeout: Duration,
    token: CancellationToken,
    tx: mpsc::Sender<FeedUpdate>,
    _guard: TickGuard,
) {
    let result = tokio::select! {
        _ = token.cancelled() => return,
        r = tokio::time::timeout(fetch_timeout, feed.fetch()) => r.unwrap_or(Err(FeedError::Timeout)),
    };

    let update = match result {
        Ok(Some(payload)) => FeedUpdate {
            kind,
            result: Ok(payload),
        },
        Ok(None) => return,
        Err(e) => {
            warn!(feed = %kind, error = %e, "Fetch failed");
            FeedUpdate::err(kind, e)
        }
    };

    if token.is_cancelled() {
        debug!(feed = %kind, "Dropping result delivered after shutdown");
        return;
    }
    // The guard is held until the update is queued, so a stalled consumer
    // turns into skipped ticks rather than piled-up fetches.
    let _ = tx.send(update).await;
}
