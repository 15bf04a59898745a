//! Heterogeneous monitoring items.
//!
//! Active queries, CDC/transfer events and job log entries arrive on
//! different feeds with different fields, but all of them can answer the
//! same small set of questions (which engine, which schema/table, what
//! status, when). [`MonitoringItem`] exposes those through accessors and
//! leaves the rest of each variant untouched.

use alloc::string::String;
use core::fmt;
use core::str::FromStr;

/// Discriminant of a [`MonitoringItem`], used by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ItemKind {
    Query,
    Transfer,
    Job,
}

impl ItemKind {
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Query => "query",
            ItemKind::Transfer => "transfer",
            ItemKind::Job => "job",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown item kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownItemKind(pub String);

impl fmt::Display for UnknownItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown item kind: {}", self.0)
    }
}

impl FromStr for ItemKind {
    type Err = UnknownItemKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" | "queries" => Ok(ItemKind::Query),
            "transfer" | "cdc" => Ok(ItemKind::Transfer),
            "job" | "jobs" => Ok(ItemKind::Job),
            other => Err(UnknownItemKind(other.into())),
        }
    }
}

/// An active (or recently finished) query on a database engine.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QueryActivity {
    pub id: Option<String>,
    pub engine: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub user: Option<String>,
    pub sql: Option<String>,
    pub status: Option<String>,
    pub started_at: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// A change-data-capture or bulk transfer event.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransferEvent {
    pub id: Option<String>,
    pub engine: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    /// INSERT/UPDATE/DELETE/SNAPSHOT and so on, as the feed reports it.
    pub operation: Option<String>,
    pub rows: Option<u64>,
    pub status: Option<String>,
    pub timestamp: Option<String>,
}

/// A line from a scheduled job's log.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JobLogEntry {
    pub id: Option<String>,
    pub job: Option<String>,
    pub engine: Option<String>,
    pub database: Option<String>,
    pub status: Option<String>,
    pub timestamp: Option<String>,
    pub message: Option<String>,
}

/// One record from the monitoring-item feed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum MonitoringItem {
    Query(QueryActivity),
    Transfer(TransferEvent),
    Job(JobLogEntry),
}

impl MonitoringItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            MonitoringItem::Query(_) => ItemKind::Query,
            MonitoringItem::Transfer(_) => ItemKind::Transfer,
            MonitoringItem::Job(_) => ItemKind::Job,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            MonitoringItem::Query(q) => q.id.as_deref(),
            MonitoringItem::Transfer(t) => t.id.as_deref(),
            MonitoringItem::Job(j) => j.id.as_deref(),
        }
    }

    pub fn engine(&self) -> Option<&str> {
        match self {
            MonitoringItem::Query(q) => q.engine.as_deref(),
            MonitoringItem::Transfer(t) => t.engine.as_deref(),
            MonitoringItem::Job(j) => j.engine.as_deref(),
        }
    }

    pub fn database(&self) -> Option<&str> {
        match self {
            MonitoringItem::Query(q) => q.database.as_deref(),
            MonitoringItem::Transfer(t) => t.database.as_deref(),
            MonitoringItem::Job(j) => j.database.as_deref(),
        }
    }

    pub fn schema(&self) -> Option<&str> {
        match self {
            MonitoringItem::Query(q) => q.schema.as_deref(),
            MonitoringItem::Transfer(t) => t.schema.as_deref(),
            MonitoringItem::Job(_) => None,
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            MonitoringItem::Query(q) => q.table.as_deref(),
            MonitoringItem::Transfer(t) => t.table.as_deref(),
            MonitoringItem::Job(_) => None,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            MonitoringItem::Query(q) => q.status.as_deref(),
            MonitoringItem::Transfer(t) => t.status.as_deref(),
            MonitoringItem::Job(j) => j.status.as_deref(),
        }
    }

    pub fn timestamp(&self) -> Option<&str> {
        match self {
            MonitoringItem::Query(q) => q.started_at.as_deref(),
            MonitoringItem::Transfer(t) => t.timestamp.as_deref(),
            MonitoringItem::Job(j) => j.timestamp.as_deref(),
        }
    }

    /// Short one-line description for list rows.
    pub fn headline(&self) -> Option<&str> {
        match self {
            MonitoringItem::Query(q) => q.sql.as_deref(),
            MonitoringItem::Transfer(t) => t.operation.as_deref(),
            MonitoringItem::Job(j) => j.message.as_deref().or(j.job.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_item_kind() {
        assert_eq!("query".parse::<ItemKind>(), Ok(ItemKind::Query));
        assert_eq!(" CDC ".parse::<ItemKind>(), Ok(ItemKind::Transfer));
        assert_eq!("jobs".parse::<ItemKind>(), Ok(ItemKind::Job));
        assert!("sessions".parse::<ItemKind>().is_err());
    }

    #[test]
    fn job_entries_have_no_schema() {
        let item = MonitoringItem::Job(JobLogEntry {
            job: Some("nightly".into()),
            ..Default::default()
        });
        assert_eq!(item.kind(), ItemKind::Job);
        assert!(item.schema().is_none());
        assert_eq!(item.headline(), Some("nightly"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_tagged_items() {
        let json = r#"[
            {"kind": "query", "id": "q1", "engine": "postgres", "sql": "select 1"},
            {"kind": "transfer", "database": "sales", "schema": "public", "table": "orders", "rows": 12},
            {"kind": "job", "job": "vacuum", "status": "running"}
        ]"#;
        let items: alloc::vec::Vec<MonitoringItem> = serde_json::from_str(json).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id(), Some("q1"));
        assert_eq!(items[1].table(), Some("orders"));
        assert_eq!(items[2].status(), Some("running"));
    }
}
