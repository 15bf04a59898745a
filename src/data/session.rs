//! Session reconstruction from phase records.
//!
//! The operation history feed logs each phase of an operation as its own
//! record and gives no session identifier. An operation normally shows up as
//! an `IN_PROGRESS` record followed, some time later, by a `SUCCESS` or
//! `ERROR` record. This module pairs those records back up into [`Session`]s.
//!
//! ## Matching
//!
//! Records are visited in input order. For each unconsumed record:
//!
//! - `IN_PROGRESS`: look for an unconsumed terminal record whose start is
//!   strictly after ours and at most `window` later. Merge on a hit.
//! - terminal: look for an unconsumed `IN_PROGRESS` record that started
//!   strictly before ours, at most `window` earlier. Merge on a hit.
//! - otherwise (no hit, no usable start time, unknown status): the record
//!   becomes a singleton session.
//!
//! Which candidate wins when several qualify is a [`MatchStrategy`].
//! Every record id is consumed at most once, so the output is a partition of
//! the input ids; [`check_partition`] verifies that.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opwatch_types::{PhaseRecord, PhaseStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::timestamp::{parse_opt, seconds_between};
use crate::error::PartitionViolation;

/// Default pairing window between an in-progress record and its outcome.
pub const DEFAULT_MATCH_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// How to choose between several qualifying candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// First qualifying candidate in input order, regardless of how far
    /// away in time it is.
    #[default]
    FirstFound,
    /// Candidate closest in start time; ties go to the earlier input position.
    Nearest,
}

/// Whether a session paired two records or stands alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Merged,
    Singleton,
}

/// Timing of the in-progress portion of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSpan {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
}

/// A reconstructed logical execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Id of the first record consumed (the in-progress one when merged).
    pub id: String,
    pub kind: SessionKind,
    /// Every record id folded into this session.
    pub record_ids: Vec<String>,
    pub operation: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub status_flow: Vec<PhaseStatus>,
    pub final_status: PhaseStatus,
    pub in_progress_phase: Option<PhaseSpan>,
    /// Duration the terminal record reported for itself.
    pub final_phase_duration: Option<f64>,
    pub rows_processed: Option<u64>,
    pub error_message: Option<String>,
}

impl Session {
    /// Start time used for ordering: the start, or the end when only that is known.
    pub fn effective_start(&self) -> Option<DateTime<Utc>> {
        self.start_time.or(self.end_time)
    }

    pub fn is_merged(&self) -> bool {
        self.kind == SessionKind::Merged
    }

    fn merged(
        in_progress: &PhaseRecord,
        in_progress_start: DateTime<Utc>,
        terminal: &PhaseRecord,
        terminal_start: DateTime<Utc>,
    ) -> Self {
        let end_time = parse_opt(terminal.end_time.as_deref());
        let reported = terminal.duration_seconds.unwrap_or(0.0).max(0.0);
        let duration_seconds = match end_time.map(|end| seconds_between(in_progress_start, end)) {
            Some(computed) if computed > 0.0 => computed,
            _ => reported,
        };

        Self {
            id: in_progress.id.clone(),
            kind: SessionKind::Merged,
            record_ids: vec![in_progress.id.clone(), terminal.id.clone()],
            operation: terminal.operation.clone().or_else(|| in_progress.operation.clone()),
            start_time: Some(in_progress_start),
            end_time,
            duration_seconds,
            status_flow: vec![PhaseStatus::InProgress, terminal.status],
            final_status: terminal.status,
            in_progress_phase: Some(PhaseSpan {
                start_time: Some(in_progress_start),
                end_time: Some(terminal_start),
                duration_seconds: seconds_between(in_progress_start, terminal_start).max(0.0),
            }),
            final_phase_duration: terminal.duration_seconds,
            rows_processed: terminal.rows_processed.or(in_progress.rows_processed),
            error_message: terminal.error_message.clone(),
        }
    }

    fn singleton(record: &PhaseRecord) -> Self {
        let start_time = parse_opt(record.start_time.as_deref());
        let end_time = parse_opt(record.end_time.as_deref());
        let computed = match (start_time, end_time) {
            (Some(start), Some(end)) => Some(seconds_between(start, end)),
            _ => None,
        };
        let duration_seconds = record.duration_seconds.or(computed).unwrap_or(0.0).max(0.0);

        let in_progress_phase = (record.status == PhaseStatus::InProgress).then(|| PhaseSpan {
            start_time,
            end_time,
            duration_seconds,
        });
        let final_phase_duration = if record.status.is_terminal() {
            record.duration_seconds
        } else {
            None
        };

        Self {
            id: record.id.clone(),
            kind: SessionKind::Singleton,
            record_ids: vec![record.id.clone()],
            operation: record.operation.clone(),
            start_time,
            end_time,
            duration_seconds,
            status_flow: vec![record.status],
            final_status: record.status,
            in_progress_phase,
            final_phase_duration,
            rows_processed: record.rows_processed,
            error_message: record.error_message.clone(),
        }
    }
}

/// Pairs phase records into sessions.
#[derive(Debug, Clone, Copy)]
pub struct SessionReconstructor {
    window: Duration,
    strategy: MatchStrategy,
}

impl Default for SessionReconstructor {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_WINDOW)
    }
}

impl SessionReconstructor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            strategy: MatchStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Rebuild sessions from one snapshot of the history feed.
    ///
    /// Output is ordered newest first by [`Session::effective_start`];
    /// sessions with no usable time sort last in input order.
    pub fn reconstruct(&self, records: &[PhaseRecord]) -> Vec<Session> {
        let starts: Vec<Option<DateTime<Utc>>> =
            records.iter().map(|r| parse_opt(r.start_time.as_deref())).collect();
        let window_ms = self.window.as_millis().min(i64::MAX as u128) as i64;

        let mut processed: HashSet<&str> = HashSet::with_capacity(records.len());
        let mut sessions = Vec::with_capacity(records.len());
        let mut merged = 0usize;

        for (i, record) in records.iter().enumerate() {
            if processed.contains(record.id.as_str()) {
                continue;
            }

            let partner = match (record.status, starts[i]) {
                (PhaseStatus::InProgress, Some(start)) => self
                    .find_candidate(records, &starts, &processed, i, window_ms, |c| {
                        c.status.is_terminal()
                    }, |cand| cand - start)
                    .map(|j| (i, j)),
                (status, Some(start)) if status.is_terminal() => self
                    .find_candidate(records, &starts, &processed, i, window_ms, |c| {
                        c.status == PhaseStatus::InProgress
                    }, |cand| start - cand)
                    .map(|j| (j, i)),
                _ => None,
            };

            processed.insert(record.id.as_str());
            let session = match partner {
                Some((ip, term)) => {
                    let other = if ip == i { term } else { ip };
                    processed.insert(records[other].id.as_str());
                    merged += 1;
                    // Both starts are Some: the candidate filter requires it.
                    match (starts[ip], starts[term]) {
                        (Some(ip_start), Some(term_start)) => {
                            Session::merged(&records[ip], ip_start, &records[term], term_start)
                        }
                        _ => Session::singleton(record),
                    }
                }
                None => Session::singleton(record),
            };
            sessions.push(session);
        }

        sessions.sort_by(|a, b| match (a.effective_start(), b.effective_start()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        debug!(
            "Reconstructed {} sessions ({} merged) from {} records",
            sessions.len(),
            merged,
            records.len()
        );
        debug_assert!(check_partition(&sessions).is_ok());

        sessions
    }

    /// Find the partner for `records[anchor]`.
    ///
    /// `gap` maps a candidate's start time to the signed distance from the
    /// anchor in the direction the candidate must lie; it has to be positive
    /// and within the window.
    #[allow(clippy::too_many_arguments)]
    fn find_candidate<F, G>(
        &self,
        records: &[PhaseRecord],
        starts: &[Option<DateTime<Utc>>],
        processed: &HashSet<&str>,
        anchor: usize,
        window_ms: i64,
        accept: F,
        gap: G,
    ) -> Option<usize>
    where
        F: Fn(&PhaseRecord) -> bool,
        G: Fn(DateTime<Utc>) -> chrono::TimeDelta,
    {
        let anchor_id = records[anchor].id.as_str();
        let mut candidates = records.iter().enumerate().filter_map(|(j, cand)| {
            if j == anchor || cand.id == anchor_id || processed.contains(cand.id.as_str()) {
                return None;
            }
            if !accept(cand) {
                return None;
            }
            let gap_ms = gap(starts[j]?).num_milliseconds();
            (gap_ms > 0 && gap_ms <= window_ms).then_some((j, gap_ms))
        });

        match self.strategy {
            MatchStrategy::FirstFound => candidates.next().map(|(j, _)| j),
            MatchStrategy::Nearest => candidates.min_by_key(|&(_, gap_ms)| gap_ms).map(|(j, _)| j),
        }
    }
}

/// Reconstruct with the default (first-found) strategy.
pub fn reconstruct(records: &[PhaseRecord], window: Duration) -> Vec<Session> {
    SessionReconstructor::new(window).reconstruct(records)
}

/// Verify that no record id appears in more than one session.
pub fn check_partition(sessions: &[Session]) -> Result<(), PartitionViolation> {
    let mut seen = HashSet::new();
    for session in sessions {
        for id in &session.record_ids {
            if !seen.insert(id.as_str()) {
                return Err(PartitionViolation {
                    id: id.clone(),
                    session: session.id.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Aggregate counts over a list of sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total: usize,
    pub merged: usize,
    pub in_progress: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Mean duration of merged sessions, in seconds.
    pub mean_duration_seconds: Option<f64>,
}

impl SessionSummary {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut summary = Self {
            total: sessions.len(),
            ..Self::default()
        };
        let mut total_duration = 0.0;

        for session in sessions {
            match session.final_status {
                PhaseStatus::InProgress => summary.in_progress += 1,
                PhaseStatus::Success => summary.succeeded += 1,
                PhaseStatus::Error => summary.failed += 1,
                PhaseStatus::Unknown => {}
            }
            if session.is_merged() {
                summary.merged += 1;
                total_duration += session.duration_seconds;
            }
        }

        if summary.merged > 0 {
            summary.mean_duration_seconds = Some(total_duration / summary.merged as f64);
        }
        summary
    }
}
