//! Phase records from the operation history feed.

use alloc::string::String;

/// Status of a single logged phase.
///
/// `Success` and `Error` are terminal. Anything the feed sends that is not
/// one of the known statuses decodes as `Unknown` rather than failing the
/// whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PhaseStatus {
    #[cfg_attr(feature = "serde", serde(alias = "in_progress", alias = "RUNNING"))]
    InProgress,
    #[cfg_attr(feature = "serde", serde(alias = "success", alias = "COMPLETED"))]
    Success,
    #[cfg_attr(feature = "serde", serde(alias = "error", alias = "FAILED"))]
    Error,
    #[cfg_attr(feature = "serde", serde(other))]
    Unknown,
}

impl PhaseStatus {
    /// Whether this status marks the end of an operation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseStatus::Success | PhaseStatus::Error)
    }

    /// Wire/display label.
    pub fn label(&self) -> &'static str {
        match self {
            PhaseStatus::InProgress => "IN_PROGRESS",
            PhaseStatus::Success => "SUCCESS",
            PhaseStatus::Error => "ERROR",
            PhaseStatus::Unknown => "UNKNOWN",
        }
    }
}

/// One logged transition of an operation.
///
/// Identity is `id`. Timestamps stay as the strings the feed sent; parsing
/// (and tolerating garbage) is the consumer's job.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseRecord {
    pub id: String,

    pub status: PhaseStatus,

    /// Name of the operation, when the log records one.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub operation: Option<String>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub start_time: Option<String>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub end_time: Option<String>,

    /// Duration the log itself reported for this phase.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub duration_seconds: Option<f64>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub rows_processed: Option<u64>,

    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub error_message: Option<String>,
}

impl PhaseRecord {
    /// Create a record with only identity and status set.
    pub fn new(id: impl Into<String>, status: PhaseStatus) -> Self {
        Self {
            id: id.into(),
            status,
            operation: None,
            start_time: None,
            end_time: None,
            duration_seconds: None,
            rows_processed: None,
            error_message: None,
        }
    }

    pub fn operation(mut self, name: impl Into<String>) -> Self {
        self.operation = Some(name.into());
        self
    }

    pub fn started_at(mut self, ts: impl Into<String>) -> Self {
        self.start_time = Some(ts.into());
        self
    }

    pub fn ended_at(mut self, ts: impl Into<String>) -> Self {
        self.end_time = Some(ts.into());
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn rows(mut self, rows: u64) -> Self {
        self.rows_processed = Some(rows);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(PhaseStatus::Success.is_terminal());
        assert!(PhaseStatus::Error.is_terminal());
        assert!(!PhaseStatus::InProgress.is_terminal());
        assert!(!PhaseStatus::Unknown.is_terminal());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_with_missing_fields() {
        let json = r#"{"id": "7", "status": "IN_PROGRESS", "start_time": "2024-03-01 10:00:00"}"#;
        let record: PhaseRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.id, "7");
        assert_eq!(record.status, PhaseStatus::InProgress);
        assert_eq!(record.start_time.as_deref(), Some("2024-03-01 10:00:00"));
        assert!(record.end_time.is_none());
        assert!(record.duration_seconds.is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn unrecognised_status_is_unknown() {
        let json = r#"{"id": "8", "status": "PAUSED"}"#;
        let record: PhaseRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, PhaseStatus::Unknown);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn lowercase_status_alias() {
        let record: PhaseRecord = serde_json::from_str(r#"{"id": "9", "status": "error"}"#).unwrap();
        assert_eq!(record.status, PhaseStatus::Error);
    }
}
