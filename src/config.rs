//! Layered settings.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file,
//! then `OPWATCH__*` environment variables (`OPWATCH__POLL__PHASES_INTERVAL=2s`).
//! Command-line flags are applied on top by the binary.
//!
//! ```toml
//! [poll]
//! phases_interval = "5s"
//! metrics_interval = "10s"
//!
//! [sessions]
//! match_window = "24h"
//! match_strategy = "nearest"
//!
//! [tree]
//! group_by = "database_schema"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::duration::parse_duration;
use crate::data::history::MAX_HISTORY_SIZE;
use crate::data::session::{MatchStrategy, DEFAULT_MATCH_WINDOW};
use crate::data::sparkline::DEFAULT_LEVELS;
use crate::data::tree::GroupBy;
use crate::source::FeedKind;

pub const ENV_PREFIX: &str = "OPWATCH";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poll: PollSettings,
    pub sessions: SessionSettings,
    pub sparkline: SparklineSettings,
    pub tree: TreeSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub phases_interval: String,
    pub items_interval: String,
    pub metrics_interval: String,
    pub fetch_timeout: String,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            phases_interval: "5s".to_string(),
            items_interval: "5s".to_string(),
            metrics_interval: "10s".to_string(),
            fetch_timeout: "30s".to_string(),
        }
    }
}

impl PollSettings {
    /// Poll interval for one feed.
    pub fn interval(&self, kind: FeedKind) -> Duration {
        match kind {
            FeedKind::Phases => duration_or("poll.phases_interval", &self.phases_interval, 5),
            FeedKind::Items => duration_or("poll.items_interval", &self.items_interval, 5),
            FeedKind::Metrics => duration_or("poll.metrics_interval", &self.metrics_interval, 10),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        duration_or("poll.fetch_timeout", &self.fetch_timeout, 30)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub match_window: String,
    pub match_strategy: MatchStrategy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            match_window: "24h".to_string(),
            match_strategy: MatchStrategy::default(),
        }
    }
}

impl SessionSettings {
    pub fn match_window(&self) -> Duration {
        duration_or(
            "sessions.match_window",
            &self.match_window,
            DEFAULT_MATCH_WINDOW.as_secs(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparklineSettings {
    /// Number of distinct bar heights.
    pub levels: usize,
    /// Samples kept per channel.
    pub window: usize,
}

impl Default for SparklineSettings {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS,
            window: MAX_HISTORY_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSettings {
    pub group_by: GroupBy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub file: PathBuf,
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from("opwatch.log"),
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load defaults, the optional file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder.add_source(env).build()?;
        Ok(config.try_deserialize()?)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn duration_or(key: &str, value: &str, default_secs: u64) -> Duration {
    match parse_duration(value) {
        Ok(d) if !d.is_zero() => d,
        Ok(_) => {
            warn!(key, value, "Zero duration, using default");
            Duration::from_secs(default_secs)
        }
        Err(e) => {
            warn!(key, value, error = %e, "Invalid duration, using default");
            Duration::from_secs(default_secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env() -> Environment {
        environment().source(Some(HashMap::new()))
    }

    #[test]
    fn defaults() {
        let settings = Settings::load_with_env(None, no_env()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll.interval(FeedKind::Phases), Duration::from_secs(5));
        assert_eq!(settings.poll.interval(FeedKind::Metrics), Duration::from_secs(10));
        assert_eq!(settings.sessions.match_window(), DEFAULT_MATCH_WINDOW);
        assert_eq!(settings.sparkline.window, 60);
        assert_eq!(settings.sparkline.levels, 8);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[poll]
items_interval = "2s"

[sessions]
match_window = "1h"
match_strategy = "nearest"

[tree]
group_by = "database_schema"
"#
        )
        .unwrap();

        let settings = Settings::load_with_env(Some(file.path()), no_env()).unwrap();
        assert_eq!(settings.poll.interval(FeedKind::Items), Duration::from_secs(2));
        // Untouched keys keep their defaults
        assert_eq!(settings.poll.interval(FeedKind::Phases), Duration::from_secs(5));
        assert_eq!(settings.sessions.match_window(), Duration::from_secs(3600));
        assert_eq!(settings.sessions.match_strategy, MatchStrategy::Nearest);
        assert_eq!(settings.tree.group_by, GroupBy::DatabaseSchema);
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sparkline]\nwindow = 30").unwrap();

        let env = environment().source(Some(HashMap::from([
            ("OPWATCH__SPARKLINE__WINDOW".to_string(), "90".to_string()),
            ("OPWATCH__LOGGING__LEVEL".to_string(), "debug".to_string()),
        ])));

        let settings = Settings::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(settings.sparkline.window, 90);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_durations_fall_back() {
        let poll = PollSettings {
            phases_interval: "soon".to_string(),
            metrics_interval: "0s".to_string(),
            ..PollSettings::default()
        };
        assert_eq!(poll.interval(FeedKind::Phases), Duration::from_secs(5));
        assert_eq!(poll.interval(FeedKind::Metrics), Duration::from_secs(10));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Settings::load_with_env(Some(Path::new("/nonexistent/opwatch.toml")), no_env());
        assert!(result.is_err());
    }
}
