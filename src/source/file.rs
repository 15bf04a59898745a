//! File-based feed.
//!
//! Polls a JSON file holding one feed's snapshot.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Feed, FeedKind, FeedPayload};
use crate::error::FeedError;

/// A feed that reads snapshots from a JSON file.
///
/// Whatever produces the data rewrites the file; this feed tracks the
/// file's modification time and only returns a snapshot when it changed.
#[derive(Debug)]
pub struct FileFeed {
    path: PathBuf,
    kind: FeedKind,
    description: String,
    last_modified: Mutex<Option<SystemTime>>,
}

impl FileFeed {
    /// Create a feed of `kind` backed by the file at `path`.
    pub fn new<P: AsRef<Path>>(path: P, kind: FeedKind) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            kind,
            description,
            last_modified: Mutex::new(None),
        }
    }

    /// Returns the path being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    async fn modified_time(&self) -> Option<SystemTime> {
        tokio::fs::metadata(&self.path).await.ok()?.modified().ok()
    }
}

#[async_trait]
impl Feed for FileFeed {
    async fn fetch(&self) -> Result<Option<FeedPayload>, FeedError> {
        let current = self.modified_time().await;
        let last = *self.last_modified.lock();

        let changed = match (last, current) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(last), Some(current)) => current > last,
        };
        if !changed {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let payload = FeedPayload::decode(self.kind, &content)?;
        *self.last_modified.lock() = current;
        Ok(Some(payload))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn phases_json() -> &'static str {
        r#"[
            {"id": "1", "status": "IN_PROGRESS", "start_time": "2024-03-01T10:00:00Z"},
            {"id": "2", "status": "SUCCESS", "start_time": "2024-03-01T10:00:30Z"}
        ]"#
    }

    #[test]
    fn test_file_feed_new() {
        let feed = FileFeed::new("/tmp/phases.json", FeedKind::Phases);
        assert_eq!(feed.path(), Path::new("/tmp/phases.json"));
        assert_eq!(feed.description(), "file: /tmp/phases.json");
        assert_eq!(feed.kind(), FeedKind::Phases);
    }

    #[tokio::test]
    async fn test_file_feed_reads_once_until_changed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", phases_json()).unwrap();

        let feed = FileFeed::new(file.path(), FeedKind::Phases);

        match feed.fetch().await.unwrap() {
            Some(FeedPayload::Phases(records)) => assert_eq!(records.len(), 2),
            other => panic!("unexpected payload: {:?}", other),
        }

        // Unchanged file
        assert!(feed.fetch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_feed_missing_file() {
        let feed = FileFeed::new("/nonexistent/path/phases.json", FeedKind::Phases);
        let err = feed.fetch().await.unwrap_err();
        assert!(matches!(err, FeedError::Read(_)));
    }

    #[tokio::test]
    async fn test_file_feed_invalid_json_retries() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let feed = FileFeed::new(file.path(), FeedKind::Items);
        assert!(matches!(feed.fetch().await, Err(FeedError::Parse(_))));
        // A failed read does not advance the change marker.
        assert!(matches!(feed.fetch().await, Err(FeedError::Parse(_))));
    }
}
