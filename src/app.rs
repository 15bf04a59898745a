//! Application state and navigation logic.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use opwatch_types::{AdminCommand, ItemKind, MonitoringItem, PhaseRecord, UNKNOWN};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::CommandOutcome;
use crate::config::Settings;
use crate::data::history::MetricSeries;
use crate::data::session::{Session, SessionReconstructor, SessionSummary};
use crate::data::tree::{
    group, reconcile_selection, toggle_expand, ExpandAction, ExpandState, FilterSet, GroupBy,
    GroupNode, GroupTree, ItemKey, TreeRow,
};
use crate::error::FeedError;
use crate::source::{FeedKind, FeedPayload, FeedUpdate};
use crate::ui::Theme;

/// How long a status message stays on screen.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// The current view/tab in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Reconstructed operation sessions, newest first.
    Sessions,
    /// Live monitoring items grouped into a tree.
    Activity,
    /// Resource metric sparklines.
    Metrics,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Sessions => View::Activity,
            View::Activity => View::Metrics,
            View::Metrics => View::Sessions,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        match self {
            View::Sessions => View::Metrics,
            View::Activity => View::Sessions,
            View::Metrics => View::Activity,
        }
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Sessions => "Sessions",
            View::Activity => "Activity",
            View::Metrics => "Metrics",
        }
    }
}

/// Health of one feed as seen by the app.
#[derive(Debug, Clone, Default)]
pub struct FeedStatus {
    pub last_success: Option<Instant>,
    /// Set by a failed fetch, cleared by the next successful one.
    pub error: Option<FeedError>,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,

    /// Cancelled on teardown; nothing is applied after that.
    live: CancellationToken,
    source_description: String,
    feeds: BTreeMap<FeedKind, FeedStatus>,

    // Sessions view
    reconstructor: SessionReconstructor,
    pub records: Vec<PhaseRecord>,
    pub sessions: Vec<Session>,
    pub summary: SessionSummary,
    /// Cursor row in the sessions table.
    pub selected_session: usize,
    /// Id of the session the detail pane shows; follows it across refreshes.
    pub selected_session_id: Option<String>,

    // Activity view
    pub items: Vec<MonitoringItem>,
    pub tree: GroupTree,
    pub expand: ExpandState,
    pub filters: FilterSet,
    pub group_by: GroupBy,
    pub selection: Option<ItemKey>,
    pub selected_row: usize,
    pub filter_active: bool,

    // Metrics view
    pub metrics: MetricSeries,
    pub sparkline_levels: usize,
    pub selected_channel: usize,

    /// Commands waiting to be handed to the dispatcher.
    outbox: Vec<AdminCommand>,

    // UI
    pub theme: Theme,
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create an app configured from `settings`.
    pub fn new(settings: &Settings, source_description: &str, live: CancellationToken) -> Self {
        let reconstructor = SessionReconstructor::new(settings.sessions.match_window())
            .with_strategy(settings.sessions.match_strategy);

        Self {
            running: true,
            current_view: View::Sessions,
            show_help: false,
            live,
            source_description: source_description.to_string(),
            feeds: FeedKind::ALL.iter().map(|&k| (k, FeedStatus::default())).collect(),
            reconstructor,
            records: Vec::new(),
            sessions: Vec::new(),
            summary: SessionSummary::default(),
            selected_session: 0,
            selected_session_id: None,
            items: Vec::new(),
            tree: GroupTree::default(),
            expand: ExpandState::default(),
            filters: FilterSet::default(),
            group_by: settings.tree.group_by,
            selection: None,
            selected_row: 0,
            filter_active: false,
            metrics: MetricSeries::with_capacity(settings.sparkline.window),
            sparkline_levels: settings.sparkline.levels.max(1),
            selected_channel: 0,
            outbox: Vec::new(),
            theme: Theme::default(),
            status_message: None,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Returns a description of the current data source.
    pub fn source_description(&self) -> &str {
        &self.source_description
    }

    pub fn is_live(&self) -> bool {
        !self.live.is_cancelled()
    }

    pub fn feed_status(&self, kind: FeedKind) -> Option<&FeedStatus> {
        self.feeds.get(&kind)
    }

    /// Feeds whose last fetch failed, with the error.
    pub fn feed_errors(&self) -> impl Iterator<Item = (FeedKind, &FeedError)> {
        self.feeds
            .iter()
            .filter_map(|(kind, status)| status.error.as_ref().map(|e| (*kind, e)))
    }

    /// Time since the most recent successful fetch of any feed.
    pub fn last_updated(&self) -> Option<Duration> {
        self.feeds
            .values()
            .filter_map(|s| s.last_success)
            .max()
            .map(|t| t.elapsed())
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_MESSAGE_TTL {
                return Some(msg);
            }
        }
        None
    }

    /// Apply one scheduled fetch result.
    ///
    /// Returns true if displayed data changed. A failed fetch only sets the
    /// feed's error; whatever was displayed before stays.
    pub fn apply_update(&mut self, update: FeedUpdate) -> bool {
        if !self.is_live() {
            debug!(feed = %update.kind, "Discarding update after teardown");
            return false;
        }

        let status = self.feeds.entry(update.kind).or_default();
        match update.result {
            Ok(payload) => {
                status.error = None;
                status.last_success = Some(Instant::now());
                self.apply_payload(payload);
                true
            }
            Err(e) => {
                status.error = Some(e);
                false
            }
        }
    }

    /// Apply everything queued on `rx` without blocking.
    pub fn drain_updates(&mut self, rx: &mut mpsc::Receiver<FeedUpdate>) -> usize {
        let mut applied = 0;
        while let Ok(update) = rx.try_recv() {
            if self.apply_update(update) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_payload(&mut self, payload: FeedPayload) {
        match payload {
            FeedPayload::Phases(records) => self.set_records(records),
            FeedPayload::Items(items) => {
                self.items = items;
                self.regroup();
            }
            FeedPayload::Metrics(sample) => {
                self.metrics.record_tick(&sample);
                self.clamp_channel();
            }
            FeedPayload::MetricHistory(history) => {
                self.metrics.hydrate(&history);
                self.clamp_channel();
            }
        }
    }

    fn set_records(&mut self, records: Vec<PhaseRecord>) {
        let first_load = self.sessions.is_empty();
        self.sessions = self.reconstructor.reconstruct(&records);
        self.summary = SessionSummary::from_sessions(&self.sessions);
        self.records = records;

        let found = self
            .selected_session_id
            .as_ref()
            .and_then(|id| self.sessions.iter().position(|s| &s.id == id));
        match found {
            Some(i) => self.selected_session = i,
            None => {
                if self.selected_session_id.take().is_some() {
                    debug!("Selected session is gone after refresh");
                }
                self.selected_session = self
                    .selected_session
                    .min(self.sessions.len().saturating_sub(1));
                if first_load {
                    self.selected_session_id =
                        self.sessions.get(self.selected_session).map(|s| s.id.clone());
                }
            }
        }
    }

    fn select_session(&mut self, index: usize) {
        let index = index.min(self.sessions.len().saturating_sub(1));
        self.selected_session = index;
        self.selected_session_id = self.sessions.get(index).map(|s| s.id.clone());
    }

    /// Rebuild the tree from the current items, filters and grouping, then
    /// reconcile the selection against what survived.
    pub fn regroup(&mut self) {
        self.tree = group(&self.items, &self.filters, self.group_by);
        self.selection = reconcile_selection(self.selection.take(), self.tree.items());
        self.sync_selected_row();
    }

    /// Rows currently visible in the activity tree.
    pub fn visible_rows(&self) -> Vec<TreeRow<'_>> {
        self.tree.visible_rows(&self.expand)
    }

    fn sync_selected_row(&mut self) {
        let rows = self.tree.visible_rows(&self.expand);
        let found = self.selection.as_ref().and_then(|key| {
            rows.iter().position(|row| match row {
                TreeRow::Item { item, .. } => &ItemKey::of(item) == key,
                TreeRow::Group { .. } => false,
            })
        });

        // Without a visible selection the cursor rests on a group row,
        // never on an item it does not select.
        let row = match found {
            Some(i) => i,
            None => {
                let mut row = self.selected_row.min(rows.len().saturating_sub(1));
                while row > 0 && matches!(rows.get(row), Some(TreeRow::Item { .. })) {
                    row -= 1;
                }
                row
            }
        };
        drop(rows);

        self.selected_row = row;
    }

    fn select_row(&mut self, row: usize) {
        let rows = self.tree.visible_rows(&self.expand);
        let max = rows.len().saturating_sub(1);
        let row = row.min(max);
        let selection = match rows.get(row) {
            Some(TreeRow::Item { item, .. }) => Some(ItemKey::of(item)),
            _ => None,
        };
        drop(rows);

        self.selected_row = row;
        self.selection = selection;
    }

    /// The selected item, if the cursor is on it.
    pub fn selected_item(&self) -> Option<&MonitoringItem> {
        let key = self.selection.as_ref()?;
        match self.tree.visible_rows(&self.expand).into_iter().nth(self.selected_row)? {
            TreeRow::Item { item, .. } if &ItemKey::of(item) == key => Some(item),
            _ => None,
        }
    }

    /// The session whose id is selected, if it still exists.
    pub fn selected_session(&self) -> Option<&Session> {
        let id = self.selected_session_id.as_ref()?;
        self.sessions
            .get(self.selected_session)
            .filter(|s| &s.id == id)
    }

    fn clamp_channel(&mut self) {
        let count = self.metrics.channels().count();
        self.selected_channel = self.selected_channel.min(count.saturating_sub(1));
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        match self.current_view {
            View::Sessions => self.select_session(self.selected_session.saturating_add(n)),
            View::Activity => self.select_row(self.selected_row + n),
            View::Metrics => {
                let max = self.metrics.channels().count().saturating_sub(1);
                self.selected_channel = (self.selected_channel + n).min(max);
            }
        }
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        match self.current_view {
            View::Sessions => self.select_session(self.selected_session.saturating_sub(n)),
            View::Activity => self.select_row(self.selected_row.saturating_sub(n)),
            View::Metrics => self.selected_channel = self.selected_channel.saturating_sub(n),
        }
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        match self.current_view {
            View::Sessions => self.select_session(0),
            View::Activity => self.select_row(0),
            View::Metrics => self.selected_channel = 0,
        }
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        self.select_next_n(usize::MAX / 2);
    }

    /// Open or close the group under the cursor.
    pub fn toggle_selected_group(&mut self) {
        let key = match self.tree.visible_rows(&self.expand).into_iter().nth(self.selected_row) {
            Some(TreeRow::Group { key, .. }) => key,
            _ => return,
        };
        self.expand = toggle_expand(&self.expand, &key);
        self.sync_selected_row();
    }

    /// Open every group, both levels.
    pub fn expand_all(&mut self) {
        let mut keys = Vec::new();
        for group in self.tree.groups() {
            keys.push(group.key.clone());
            if let GroupNode::Nested(subs) = &group.node {
                keys.extend(subs.iter().map(|s| ExpandState::child_key(&group.key, &s.key)));
            }
        }
        self.expand = self.expand.apply(ExpandAction::ExpandAll(keys));
        self.sync_selected_row();
    }

    pub fn collapse_all(&mut self) {
        self.expand = self.expand.apply(ExpandAction::CollapseAll);
        self.selection = None;
        self.sync_selected_row();
    }

    /// Cycle engine → database → database/schema grouping.
    pub fn cycle_group_by(&mut self) {
        self.group_by = self.group_by.next();
        self.regroup();
        self.set_status_message(format!("Grouping by {}", self.group_by.label()));
    }

    /// Cycle the kind filter: all → query → transfer → job → all.
    pub fn cycle_kind_filter(&mut self) {
        self.filters.kind = match self.filters.kind {
            None => Some(ItemKind::Query),
            Some(ItemKind::Query) => Some(ItemKind::Transfer),
            Some(ItemKind::Transfer) => Some(ItemKind::Job),
            Some(ItemKind::Job) => None,
        };
        self.regroup();
    }

    /// Cycle the status filter through the statuses present in the items.
    pub fn cycle_status_filter(&mut self) {
        let statuses = distinct(self.items.iter().map(|i| i.status()));
        self.filters.status = next_in(&statuses, self.filters.status.as_deref());
        self.regroup();
    }

    /// Cycle the engine filter through the engines present in the items.
    pub fn cycle_engine_filter(&mut self) {
        let engines = distinct(self.items.iter().map(|i| i.engine()));
        self.filters.engine = next_in(&engines, self.filters.engine.as_deref());
        self.regroup();
    }

    /// Ask for the selected query to be terminated.
    ///
    /// The command is queued; [`App::take_outbox`] hands it to the dispatcher.
    pub fn terminate_selected(&mut self) {
        let target = match self.selected_item() {
            Some(item) if item.kind() == ItemKind::Query => item.id().map(str::to_string),
            Some(_) => {
                self.set_status_message("Only queries can be terminated".to_string());
                return;
            }
            None => {
                self.set_status_message("Select a query to terminate".to_string());
                return;
            }
        };

        match target.filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                self.set_status_message(format!("Terminating {}...", id));
                self.outbox.push(AdminCommand::Terminate { id });
            }
            None => self.set_status_message("Selected query has no id".to_string()),
        }
    }

    /// Commands queued since the last call.
    pub fn take_outbox(&mut self) -> Vec<AdminCommand> {
        std::mem::take(&mut self.outbox)
    }

    /// Report a dispatched command's result.
    pub fn apply_command_outcome(&mut self, outcome: CommandOutcome) {
        let AdminCommand::Terminate { id } = &outcome.command;
        let message = match &outcome.result {
            Ok(()) => format!("Terminate sent for {}", id),
            Err(e) => format!("Terminate {} failed: {}", id, e),
        };
        self.set_status_message(message);
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Enter filter input mode (starts capturing keystrokes for search).
    pub fn start_filter(&mut self) {
        self.filter_active = true;
    }

    /// Exit filter input mode without clearing the filter text.
    pub fn cancel_filter(&mut self) {
        self.filter_active = false;
    }

    /// Clear every filter and exit filter mode.
    pub fn clear_filter(&mut self) {
        self.filters = FilterSet::default();
        self.filter_active = false;
        self.regroup();
    }

    pub fn filter_text(&self) -> &str {
        self.filters.text.as_deref().unwrap_or("")
    }

    /// Append a character to the filter text.
    pub fn filter_push(&mut self, c: char) {
        self.filters.text.get_or_insert_with(String::new).push(c);
        self.regroup();
    }

    /// Remove the last character from the filter text.
    pub fn filter_pop(&mut self) {
        if let Some(text) = self.filters.text.as_mut() {
            text.pop();
            if text.is_empty() {
                self.filters.text = None;
            }
        }
        self.regroup();
    }

    /// Stop applying results and drop per-view buffers.
    pub fn teardown(&mut self) {
        self.live.cancel();
        self.metrics.clear();
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
        self.teardown();
    }

    /// Export the reconstructed sessions to a file.
    pub fn export_sessions(&self, path: &std::path::Path) -> anyhow::Result<()> {
        crate::export::write_sessions(path, &self.sessions, &self.summary)
    }
}

fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        let value = value.filter(|v| !v.trim().is_empty()).unwrap_or(UNKNOWN);
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(value)) {
            seen.push(value.to_string());
        }
    }
    seen
}

/// None → first → ... → last → None.
fn next_in(options: &[String], current: Option<&str>) -> Option<String> {
    match current {
        None => options.first().cloned(),
        Some(current) => {
            let pos = options.iter().position(|o| o.eq_ignore_ascii_case(current))?;
            options.get(pos + 1).cloned()
        }
    }
}
