//! Rolling metric history for sparklines and rate calculations.

use std::collections::{BTreeMap, VecDeque};

use opwatch_types::{MetricHistory, MetricPoint, MetricSample};

/// Maximum number of samples kept per channel.
pub const MAX_HISTORY_SIZE: usize = 60;

/// Fixed-capacity FIFO of samples for one channel.
#[derive(Debug, Clone)]
pub struct MetricRingBuffer {
    points: VecDeque<MetricPoint>,
    capacity: usize,
}

impl Default for MetricRingBuffer {
    fn default() -> Self {
        Self::new(MAX_HISTORY_SIZE)
    }
}

impl MetricRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a point, dropping the oldest one when full.
    pub fn push(&mut self, point: MetricPoint) {
        self.points.push_back(point);
        if self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// Overwrite the buffer, keeping only the newest `capacity` points.
    pub fn replace_all<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = MetricPoint>,
    {
        self.points.clear();
        for point in points {
            self.push(point);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricPoint> {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<MetricPoint> {
        self.points.back().copied()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Named channels of history for one dashboard view.
///
/// Channels fed through [`MetricSeries::record_tick`] stay index-aligned:
/// position `i` in every channel is the same tick, which is what lets a
/// tooltip or cursor read across channels.
#[derive(Debug, Clone)]
pub struct MetricSeries {
    channels: BTreeMap<String, MetricRingBuffer>,
    capacity: usize,
}

impl Default for MetricSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSeries {
    /// Create an empty series with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append one point to a single channel.
    pub fn append(&mut self, channel: &str, point: MetricPoint) {
        self.buffer_mut(channel).push(point);
    }

    /// Replace a channel's history wholesale.
    pub fn replace_all(&mut self, channel: &str, points: &[MetricPoint]) {
        self.buffer_mut(channel).replace_all(points.iter().copied());
    }

    /// Replace the whole series with `history`, e.g. after the first load.
    ///
    /// Channels are laid out on one shared timeline: the union of every
    /// channel's timestamps, newest `capacity` kept. A channel with no point
    /// at some timestamp repeats its previous value, or 0.0 before its first
    /// point, the same way [`record_tick`](Self::record_tick) fills gaps.
    /// Channels absent from `history` are dropped.
    pub fn hydrate(&mut self, history: &MetricHistory) {
        self.channels.clear();

        let mut timeline: Vec<u64> = history
            .channels
            .values()
            .flat_map(|points| points.iter().map(|p| p.timestamp_ms))
            .collect();
        timeline.sort_unstable();
        timeline.dedup();
        let skip = timeline.len().saturating_sub(self.capacity);
        let timeline = &timeline[skip..];

        for (channel, points) in &history.channels {
            let mut points = points.clone();
            points.sort_by_key(|p| p.timestamp_ms);

            let mut source = points.iter().peekable();
            let mut last = 0.0;
            let aligned: Vec<MetricPoint> = timeline
                .iter()
                .map(|&ts| {
                    while let Some(p) = source.next_if(|p| p.timestamp_ms <= ts) {
                        last = p.value;
                    }
                    MetricPoint::new(ts, last)
                })
                .collect();
            self.replace_all(channel, &aligned);
        }
    }

    /// Record one poll tick across all channels.
    ///
    /// Channels missing from the sample repeat their last value (or 0.0);
    /// channels seen for the first time are back-filled with 0.0 so every
    /// channel keeps the same length.
    pub fn record_tick(&mut self, sample: &MetricSample) {
        let backfill: Vec<u64> = self
            .channels
            .values()
            .max_by_key(|b| b.len())
            .map(|b| b.iter().map(|p| p.timestamp_ms).collect())
            .unwrap_or_default();

        for name in sample.values.keys() {
            if !self.channels.contains_key(name) {
                let mut buffer = MetricRingBuffer::new(self.capacity);
                buffer.replace_all(backfill.iter().map(|&ts| MetricPoint::new(ts, 0.0)));
                self.channels.insert(name.clone(), buffer);
            }
        }

        for (name, buffer) in self.channels.iter_mut() {
            let value = match sample.values.get(name) {
                Some(&v) => v,
                None => buffer.latest().map(|p| p.value).unwrap_or(0.0),
            };
            buffer.push(MetricPoint::new(sample.timestamp_ms, value));
        }
    }

    /// Copy of a channel's points, oldest first. Empty for unknown channels.
    pub fn snapshot(&self, channel: &str) -> Vec<MetricPoint> {
        self.channels
            .get(channel)
            .map(|b| b.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Just the values of a channel, oldest first.
    pub fn values(&self, channel: &str) -> Vec<f64> {
        self.channels
            .get(channel)
            .map(|b| b.iter().map(|p| p.value).collect())
            .unwrap_or_default()
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn latest(&self, channel: &str) -> Option<MetricPoint> {
        self.channels.get(channel)?.latest()
    }

    /// Per-second change between the last two points of a channel.
    ///
    /// Returns None if there's not enough history or no time elapsed.
    pub fn rate(&self, channel: &str) -> Option<f64> {
        let buffer = self.channels.get(channel)?;
        if buffer.len() < 2 {
            return None;
        }
        let current = buffer.points.back()?;
        let previous = buffer.points.get(buffer.len() - 2)?;

        let elapsed_ms = current.timestamp_ms.checked_sub(previous.timestamp_ms)?;
        if elapsed_ms == 0 {
            return None;
        }
        Some((current.value - previous.value) / (elapsed_ms as f64 / 1000.0))
    }

    /// Length of the longest channel.
    pub fn len(&self) -> usize {
        self.channels.values().map(|b| b.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything, as on view teardown.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    fn buffer_mut(&mut self, channel: &str) -> &mut MetricRingBuffer {
        let capacity = self.capacity;
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| MetricRingBuffer::new(capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(range: std::ops::Range<u64>) -> Vec<MetricPoint> {
        range.map(|i| MetricPoint::new(i * 1000, i as f64)).collect()
    }

    #[test]
    fn new_series_is_empty() {
        let series = MetricSeries::new();
        assert!(series.is_empty());
        assert!(series.snapshot("cpu").is_empty());
    }

    #[test]
    fn append_caps_at_capacity_keeping_newest() {
        let mut series = MetricSeries::new();
        for point in points(0..100) {
            series.append("cpu", point);
        }

        let snap = series.snapshot("cpu");
        assert_eq!(snap.len(), MAX_HISTORY_SIZE);
        assert_eq!(snap, points(40..100));
    }

    #[test]
    fn replace_all_overwrites_and_caps() {
        let mut series = MetricSeries::new();
        series.append("cpu", MetricPoint::new(0, 99.0));

        series.replace_all("cpu", &points(0..75));

        let snap = series.snapshot("cpu");
        assert_eq!(snap.len(), 60);
        assert_eq!(snap.first().unwrap().value, 15.0);
        assert_eq!(snap.last().unwrap().value, 74.0);
    }

    #[test]
    fn replace_all_with_fewer_points() {
        let mut series = MetricSeries::new();
        for point in points(0..10) {
            series.append("cpu", point);
        }
        series.replace_all("cpu", &points(0..3));
        assert_eq!(series.snapshot("cpu"), points(0..3));
    }

    #[test]
    fn ticks_keep_channels_aligned() {
        let mut series = MetricSeries::new();
        series.record_tick(&MetricSample::new(1000).with("cpu", 10.0).with("mem", 50.0));
        series.record_tick(&MetricSample::new(2000).with("cpu", 20.0));
        series.record_tick(&MetricSample::new(3000).with("cpu", 30.0).with("io", 5.0));

        assert_eq!(series.values("cpu"), vec![10.0, 20.0, 30.0]);
        // Missing value repeats the previous one.
        assert_eq!(series.values("mem"), vec![50.0, 50.0, 50.0]);
        // Late channel is back-filled.
        assert_eq!(series.values("io"), vec![0.0, 0.0, 5.0]);

        let ts: Vec<u64> = series.snapshot("io").iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(ts, vec![1000, 2000, 3000]);
    }

    #[test]
    fn ticks_stay_aligned_past_capacity() {
        let mut series = MetricSeries::with_capacity(5);
        for i in 0..8u64 {
            series.record_tick(&MetricSample::new(i).with("a", i as f64).with("b", 0.0));
        }
        assert_eq!(series.snapshot("a").len(), 5);
        assert_eq!(series.snapshot("b").len(), 5);
        assert_eq!(series.snapshot("a")[0].timestamp_ms, series.snapshot("b")[0].timestamp_ms);
    }

    #[test]
    fn hydrate_lays_channels_on_one_timeline() {
        let mut history = MetricHistory::default();
        history.channels.insert("cpu".into(), points(0..5));
        history.channels.insert("mem".into(), points(3..5));

        let mut series = MetricSeries::new();
        series.hydrate(&history);

        let cpu = series.snapshot("cpu");
        let mem = series.snapshot("mem");
        assert_eq!(cpu.len(), 5);
        assert_eq!(mem.len(), 5);
        for (a, b) in cpu.iter().zip(&mem) {
            assert_eq!(a.timestamp_ms, b.timestamp_ms);
        }
        assert_eq!(series.values("mem"), vec![0.0, 0.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn hydrate_fills_gaps_with_the_previous_value() {
        let mut history = MetricHistory::default();
        history.channels.insert(
            "cpu".into(),
            vec![MetricPoint::new(1000, 1.0), MetricPoint::new(3000, 3.0)],
        );
        history.channels.insert("mem".into(), points(1..4));

        let mut series = MetricSeries::new();
        series.hydrate(&history);

        assert_eq!(series.values("cpu"), vec![1.0, 1.0, 3.0]);
        assert_eq!(series.values("mem"), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn hydrate_discards_earlier_ticks_and_stays_aligned_afterwards() {
        let mut series = MetricSeries::new();
        for i in 0..3u64 {
            series.record_tick(
                &MetricSample::new(i * 1000)
                    .with("cpu", 1.0)
                    .with("mem", 1.0)
                    .with("io", 1.0),
            );
        }

        let mut history = MetricHistory::default();
        history.channels.insert("cpu".into(), points(10..15));
        history.channels.insert("mem".into(), points(13..15));
        series.hydrate(&history);
        series.record_tick(&MetricSample::new(15_000).with("cpu", 15.0).with("mem", 15.0));

        assert_eq!(series.channels().collect::<Vec<_>>(), vec!["cpu", "mem"]);
        let cpu = series.snapshot("cpu");
        let mem = series.snapshot("mem");
        assert_eq!(cpu.len(), 6);
        assert_eq!(mem.len(), 6);
        for (a, b) in cpu.iter().zip(&mem) {
            assert_eq!(a.timestamp_ms, b.timestamp_ms);
        }
    }

    #[test]
    fn hydrate_keeps_the_newest_capacity_timestamps() {
        let mut history = MetricHistory::default();
        history.channels.insert("cpu".into(), points(0..8));
        history.channels.insert("mem".into(), points(6..10));

        let mut series = MetricSeries::with_capacity(5);
        series.hydrate(&history);

        let stamps: Vec<u64> = series.snapshot("mem").iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(stamps, vec![5000, 6000, 7000, 8000, 9000]);
        assert_eq!(series.values("cpu"), vec![5.0, 6.0, 7.0, 7.0, 7.0]);
    }

    #[test]
    fn rate_from_last_two_points() {
        let mut series = MetricSeries::new();
        series.append("rows", MetricPoint::new(0, 100.0));
        assert!(series.rate("rows").is_none());

        series.append("rows", MetricPoint::new(2000, 300.0));
        assert_eq!(series.rate("rows"), Some(100.0));
    }

    #[test]
    fn rate_none_without_elapsed_time() {
        let mut series = MetricSeries::new();
        series.append("rows", MetricPoint::new(5, 1.0));
        series.append("rows", MetricPoint::new(5, 2.0));
        assert!(series.rate("rows").is_none());
        assert!(series.rate("unknown").is_none());
    }

    #[test]
    fn clear_drops_all_channels() {
        let mut series = MetricSeries::new();
        series.append("cpu", MetricPoint::new(0, 1.0));
        series.clear();
        assert!(series.is_empty());
        assert_eq!(series.channels().count(), 0);
    }
}
