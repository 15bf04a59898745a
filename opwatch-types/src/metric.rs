//! Resource metric samples.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// A single time-stamped value on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricPoint {
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    pub value: f64,
}

impl MetricPoint {
    pub const fn new(timestamp_ms: u64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// One tick of the resource feed: a value per channel, all taken at the
/// same instant.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricSample {
    pub timestamp_ms: u64,
    pub values: BTreeMap<String, f64>,
}

impl MetricSample {
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            values: BTreeMap::new(),
        }
    }

    /// Add a channel value.
    pub fn with(mut self, channel: impl Into<String>, value: f64) -> Self {
        self.values.insert(channel.into(), value);
        self
    }
}

/// Bulk history for hydrating series after a load or a view switch.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricHistory {
    pub channels: BTreeMap<String, Vec<MetricPoint>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_builder() {
        let sample = MetricSample::new(1_000).with("cpu", 12.5).with("mem", 40.0);
        assert_eq!(sample.values.len(), 2);
        assert_eq!(sample.values.get("cpu"), Some(&12.5));
    }
}
