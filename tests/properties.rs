//! Properties of the reconstruction, grouping, history and quantization core,
//! exercised through the public API only.

use std::time::Duration;

use opwatch::data::session::DEFAULT_MATCH_WINDOW;
use opwatch::data::sparkline::levels;
use opwatch::data::{
    check_partition, group, reconcile_selection, reconstruct, FilterSet, GroupBy, ItemKey,
    MatchStrategy, MetricRingBuffer, SessionKind, SessionReconstructor,
};
use opwatch_types::{
    ItemKind, JobLogEntry, MetricPoint, MonitoringItem, PhaseRecord, PhaseStatus, QueryActivity,
    TransferEvent,
};

fn in_progress(id: &str, start: &str) -> PhaseRecord {
    PhaseRecord::new(id, PhaseStatus::InProgress).started_at(start)
}

fn success(id: &str, start: &str, end: &str) -> PhaseRecord {
    PhaseRecord::new(id, PhaseStatus::Success)
        .started_at(start)
        .ended_at(end)
}

fn failure(id: &str, start: &str) -> PhaseRecord {
    PhaseRecord::new(id, PhaseStatus::Error)
        .started_at(start)
        .error("connection reset")
}

/// A messy log: interleaved runs, orphans, a missing timestamp and garbage.
fn messy_log() -> Vec<PhaseRecord> {
    vec![
        in_progress("1", "2024-03-01T10:00:00Z"),
        success("2", "2024-03-01T10:00:30Z", "2024-03-01T10:00:31Z"),
        in_progress("3", "2024-03-01T11:00:00Z"),
        in_progress("4", "2024-03-01T11:05:00Z"),
        failure("5", "2024-03-01T11:10:00Z"),
        success("6", "2024-03-01T11:20:00Z", "2024-03-01T11:25:00Z"),
        PhaseRecord::new("7", PhaseStatus::Success),
        in_progress("8", "not a timestamp"),
        success("9", "2024-02-01T00:00:00Z", "2024-02-01T00:01:00Z"),
        in_progress("10", "2024-03-03T00:00:00Z"),
    ]
}

#[test]
fn no_record_lands_in_two_sessions() {
    let records = messy_log();
    for strategy in [MatchStrategy::FirstFound, MatchStrategy::Nearest] {
        let sessions = SessionReconstructor::new(DEFAULT_MATCH_WINDOW)
            .with_strategy(strategy)
            .reconstruct(&records);

        assert!(check_partition(&sessions).is_ok());

        let mut consumed: Vec<&str> = sessions
            .iter()
            .flat_map(|s| s.record_ids.iter().map(String::as_str))
            .collect();
        consumed.sort_unstable();
        let mut expected: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(consumed, expected, "every record is used exactly once");
    }
}

#[test]
fn in_progress_and_success_thirty_seconds_apart_merge() {
    let records = vec![
        in_progress("a", "2024-03-01T10:00:00Z"),
        success("b", "2024-03-01T10:00:30Z", "2024-03-01T10:00:30Z"),
    ];

    let sessions = reconstruct(&records, DEFAULT_MATCH_WINDOW);

    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.kind, SessionKind::Merged);
    assert!((session.duration_seconds - 30.0).abs() < 1e-6);
    assert_eq!(
        session.status_flow,
        vec![PhaseStatus::InProgress, PhaseStatus::Success]
    );
    assert_eq!(session.final_status, PhaseStatus::Success);
}

#[test]
fn unmatched_in_progress_stands_alone() {
    let records = vec![
        in_progress("a", "2024-03-01T10:00:00Z"),
        // Starts before the in-progress record, so it cannot be its outcome
        success("b", "2024-03-01T09:00:00Z", "2024-03-01T09:10:00Z"),
    ];

    let sessions = reconstruct(&records, DEFAULT_MATCH_WINDOW);

    assert_eq!(sessions.len(), 2);
    let orphan = sessions
        .iter()
        .find(|s| s.record_ids == ["a"])
        .expect("session for a");
    assert_eq!(orphan.kind, SessionKind::Singleton);
    assert_eq!(orphan.status_flow, vec![PhaseStatus::InProgress]);
    assert_eq!(orphan.final_status, PhaseStatus::InProgress);
}

#[test]
fn outcome_one_second_past_the_window_is_not_merged() {
    let records = vec![
        in_progress("a", "2024-03-01T10:00:00Z"),
        success("b", "2024-03-02T10:00:01Z", "2024-03-02T10:00:05Z"),
    ];

    let sessions = reconstruct(&records, DEFAULT_MATCH_WINDOW);

    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.kind == SessionKind::Singleton));
}

#[test]
fn outcome_exactly_at_the_window_is_merged() {
    let records = vec![
        in_progress("a", "2024-03-01T10:00:00Z"),
        success("b", "2024-03-02T10:00:00Z", "2024-03-02T10:00:05Z"),
    ];

    let sessions = reconstruct(&records, DEFAULT_MATCH_WINDOW);

    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_merged());
}

#[test]
fn custom_window_is_honoured() {
    let records = vec![
        in_progress("a", "2024-03-01T10:00:00Z"),
        success("b", "2024-03-01T10:10:00Z", "2024-03-01T10:11:00Z"),
    ];

    assert_eq!(reconstruct(&records, Duration::from_secs(5 * 60)).len(), 2);
    assert_eq!(reconstruct(&records, Duration::from_secs(15 * 60)).len(), 1);
}

#[test]
fn sessions_come_out_newest_first() {
    let sessions = reconstruct(&messy_log(), DEFAULT_MATCH_WINDOW);

    let starts: Vec<_> = sessions
        .iter()
        .map(|s| s.effective_start())
        .take_while(Option::is_some)
        .collect();
    assert!(starts.windows(2).all(|w| w[0] >= w[1]));

    // Sessions without any usable start sort after the rest
    let first_undated = sessions
        .iter()
        .position(|s| s.effective_start().is_none())
        .unwrap_or(sessions.len());
    assert!(sessions[first_undated..]
        .iter()
        .all(|s| s.effective_start().is_none()));
}

#[test]
fn ring_buffer_keeps_the_most_recent_sixty() {
    let mut buffer = MetricRingBuffer::new(60);
    for i in 0..100u64 {
        buffer.push(MetricPoint::new(i * 1_000, i as f64));
    }

    assert_eq!(buffer.len(), 60);
    let values: Vec<f64> = buffer.iter().map(|p| p.value).collect();
    let expected: Vec<f64> = (40..100).map(|i| i as f64).collect();
    assert_eq!(values, expected);
}

#[test]
fn constant_series_is_flat_at_every_resolution() {
    for len in [0, 1, 2, 17, 60] {
        let series = vec![42.5; len];
        for level_count in [1, 2, 4, 8, 16] {
            let quantized = levels(&series, level_count);
            assert_eq!(quantized.len(), len);
            assert!(quantized.iter().all(|&l| l == 0));
        }
    }
}

#[test]
fn increasing_series_never_steps_down() {
    let series: Vec<f64> = (0..60).map(|i| (i as f64).powf(1.7) - 300.0).collect();
    for level_count in [2, 3, 8, 10] {
        let quantized = levels(&series, level_count);
        assert!(quantized.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(quantized.first(), Some(&0));
        assert_eq!(quantized.last(), Some(&(level_count - 1)));
        assert!(quantized.iter().all(|&l| l < level_count));
    }
}

fn activity() -> Vec<MonitoringItem> {
    vec![
        MonitoringItem::Query(QueryActivity {
            id: Some("q1".into()),
            engine: Some("postgres".into()),
            database: Some("sales".into()),
            schema: Some("public".into()),
            status: Some("active".into()),
            ..QueryActivity::default()
        }),
        MonitoringItem::Transfer(TransferEvent {
            id: Some("t1".into()),
            engine: Some("mysql".into()),
            database: Some("crm".into()),
            schema: Some("core".into()),
            table: Some("accounts".into()),
            status: Some("done".into()),
            ..TransferEvent::default()
        }),
        MonitoringItem::Query(QueryActivity {
            id: Some("q2".into()),
            engine: Some("postgres".into()),
            database: Some("sales".into()),
            status: Some("idle".into()),
            ..QueryActivity::default()
        }),
        MonitoringItem::Job(JobLogEntry {
            job: Some("nightly".into()),
            status: Some("active".into()),
            timestamp: Some("2024-03-01T02:00:00Z".into()),
            ..JobLogEntry::default()
        }),
    ]
}

#[test]
fn filtering_twice_gives_the_same_tree() {
    let items = activity();
    let filters = FilterSet {
        status: Some("active".into()),
        ..FilterSet::default()
    };

    for by in [GroupBy::Engine, GroupBy::Database, GroupBy::DatabaseSchema] {
        let first = group(&items, &filters, by);
        let second = group(&items, &filters, by);
        assert_eq!(first, second);

        let regrouped: Vec<MonitoringItem> = first.items().cloned().collect();
        assert_eq!(group(&regrouped, &filters, by), first);
    }
}

#[test]
fn empty_filter_keeps_everything_and_unknown_collects_the_rest() {
    let items = activity();
    let tree = group(&items, &FilterSet::default(), GroupBy::Engine);

    assert_eq!(tree.item_count(), items.len());
    assert_eq!(
        tree.keys().collect::<Vec<_>>(),
        vec!["postgres", "mysql", "Unknown"]
    );
}

#[test]
fn filters_combine_as_a_conjunction() {
    let items = activity();
    let filters = FilterSet {
        kind: Some(ItemKind::Query),
        engine: Some("postgres".into()),
        status: Some("idle".into()),
        ..FilterSet::default()
    };

    let tree = group(&items, &filters, GroupBy::Engine);
    let ids: Vec<_> = tree.items().filter_map(MonitoringItem::id).collect();
    assert_eq!(ids, vec!["q2"]);
}

#[test]
fn selection_follows_the_item_across_refreshes() {
    let items = activity();
    let selected = Some(ItemKey::of(&items[2]));

    // q2 survives a refresh that reorders and drops other items
    let refreshed = vec![items[2].clone(), items[0].clone()];
    assert_eq!(
        reconcile_selection(selected.clone(), &refreshed),
        selected
    );

    // q2 disappears
    let refreshed = vec![items[0].clone(), items[1].clone()];
    assert_eq!(reconcile_selection(selected, &refreshed), None);
}

#[test]
fn selection_of_an_id_less_item_uses_its_natural_key() {
    let items = activity();
    let job = ItemKey::of(&items[3]);

    assert_eq!(reconcile_selection(Some(job.clone()), &items), Some(job));
    assert_eq!(reconcile_selection(None, &items), None);
}
