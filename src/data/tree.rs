//! Grouping and filtering of monitoring items.
//!
//! Turns a flat snapshot of [`MonitoringItem`]s into a [`GroupTree`] for the
//! activity view, and keeps the view's expand/selection state as plain
//! values with pure transitions so refreshes can be reasoned about (and
//! tested) without a terminal.
//!
//! ## Ordering
//!
//! Group keys keep first-seen order, items keep source order. Nothing is
//! sorted here; the feed's order is the display order.

use std::collections::{BTreeSet, HashMap};

use opwatch_types::{ItemKind, MonitoringItem, UNKNOWN};
use serde::{Deserialize, Serialize};

/// How a feed's items are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One level, keyed by engine name.
    #[default]
    Engine,
    /// One level, keyed by database name.
    Database,
    /// Two levels: database, then schema.
    DatabaseSchema,
}

impl GroupBy {
    /// Cycle to the next grouping.
    pub fn next(self) -> Self {
        match self {
            GroupBy::Engine => GroupBy::Database,
            GroupBy::Database => GroupBy::DatabaseSchema,
            GroupBy::DatabaseSchema => GroupBy::Engine,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupBy::Engine => "engine",
            GroupBy::Database => "database",
            GroupBy::DatabaseSchema => "database/schema",
        }
    }

    fn top_key<'a>(&self, item: &'a MonitoringItem) -> &'a str {
        let key = match self {
            GroupBy::Engine => item.engine(),
            GroupBy::Database | GroupBy::DatabaseSchema => item.database(),
        };
        non_empty(key).unwrap_or(UNKNOWN)
    }

    fn sub_key<'a>(&self, item: &'a MonitoringItem) -> Option<&'a str> {
        match self {
            GroupBy::DatabaseSchema => Some(non_empty(item.schema()).unwrap_or(UNKNOWN)),
            _ => None,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Conjunction of optional predicates. An unset or empty dimension matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub status: Option<String>,
    pub kind: Option<ItemKind>,
    pub engine: Option<String>,
    /// Case-insensitive substring over group keys, table, id and headline.
    pub text: Option<String>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        non_empty(self.status.as_deref()).is_none()
            && self.kind.is_none()
            && non_empty(self.engine.as_deref()).is_none()
            && non_empty(self.text.as_deref()).is_none()
    }

    pub fn matches(&self, item: &MonitoringItem) -> bool {
        if let Some(status) = non_empty(self.status.as_deref()) {
            let actual = non_empty(item.status()).unwrap_or(UNKNOWN);
            if !actual.eq_ignore_ascii_case(status) {
                return false;
            }
        }

        if let Some(kind) = self.kind {
            if item.kind() != kind {
                return false;
            }
        }

        if let Some(engine) = non_empty(self.engine.as_deref()) {
            let actual = non_empty(item.engine()).unwrap_or(UNKNOWN);
            if !actual.eq_ignore_ascii_case(engine) {
                return false;
            }
        }

        if let Some(text) = non_empty(self.text.as_deref()) {
            let needle = text.to_lowercase();
            let hit = [
                item.engine(),
                item.database(),
                item.schema(),
                item.table(),
                item.id(),
                item.headline(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        true
    }
}

/// Second-level bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Subgroup {
    pub key: String,
    pub items: Vec<MonitoringItem>,
}

/// Contents of a top-level group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupNode {
    Items(Vec<MonitoringItem>),
    Nested(Vec<Subgroup>),
}

impl GroupNode {
    pub fn item_count(&self) -> usize {
        match self {
            GroupNode::Items(items) => items.len(),
            GroupNode::Nested(subs) => subs.iter().map(|s| s.items.len()).sum(),
        }
    }
}

/// Top-level bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: String,
    pub node: GroupNode,
}

/// Ordered, possibly two-level grouping of monitoring items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupTree {
    groups: Vec<Group>,
    index: HashMap<String, usize>,
}

impl GroupTree {
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn get(&self, key: &str) -> Option<&Group> {
        self.index.get(key).map(|&i| &self.groups[i])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.node.item_count()).sum()
    }

    /// Leaf item lists in display order, with their top and second-level keys.
    pub fn leaves(&self) -> impl Iterator<Item = (&str, Option<&str>, &[MonitoringItem])> {
        self.groups.iter().flat_map(|g| {
            let top = g.key.as_str();
            let leaves: Vec<(&str, Option<&str>, &[MonitoringItem])> = match &g.node {
                GroupNode::Items(items) => vec![(top, None, items.as_slice())],
                GroupNode::Nested(subs) => subs
                    .iter()
                    .map(|s| (top, Some(s.key.as_str()), s.items.as_slice()))
                    .collect(),
            };
            leaves
        })
    }

    /// Every item, flattened in display order.
    pub fn items(&self) -> impl Iterator<Item = &MonitoringItem> {
        self.leaves().flat_map(|(_, _, items)| items.iter())
    }

    /// Rows visible under the given expand state.
    pub fn visible_rows(&self, expand: &ExpandState) -> Vec<TreeRow<'_>> {
        let mut rows = Vec::new();
        for group in &self.groups {
            let expanded = expand.is_expanded(&group.key);
            rows.push(TreeRow::Group {
                key: group.key.clone(),
                label: group.key.as_str(),
                depth: 0,
                count: group.node.item_count(),
                expanded,
            });
            if !expanded {
                continue;
            }
            match &group.node {
                GroupNode::Items(items) => {
                    rows.extend(items.iter().map(|item| TreeRow::Item { item, depth: 1 }));
                }
                GroupNode::Nested(subs) => {
                    for sub in subs {
                        let key = ExpandState::child_key(&group.key, &sub.key);
                        let expanded = expand.is_expanded(&key);
                        rows.push(TreeRow::Group {
                            key,
                            label: sub.key.as_str(),
                            depth: 1,
                            count: sub.items.len(),
                            expanded,
                        });
                        if expanded {
                            rows.extend(sub.items.iter().map(|item| TreeRow::Item { item, depth: 2 }));
                        }
                    }
                }
            }
        }
        rows
    }

    fn bucket(&mut self, key: &str) -> &mut Group {
        let i = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.groups.push(Group {
                    key: key.to_string(),
                    node: GroupNode::Items(Vec::new()),
                });
                self.index.insert(key.to_string(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        &mut self.groups[i]
    }

    fn insert(&mut self, top: &str, sub: Option<&str>, item: MonitoringItem) {
        let group = self.bucket(top);
        match sub {
            None => {
                if let GroupNode::Items(items) = &mut group.node {
                    items.push(item);
                }
            }
            Some(sub) => {
                if matches!(&group.node, GroupNode::Items(items) if items.is_empty()) {
                    group.node = GroupNode::Nested(Vec::new());
                }
                if let GroupNode::Nested(subs) = &mut group.node {
                    match subs.iter_mut().find(|s| s.key == sub) {
                        Some(existing) => existing.items.push(item),
                        None => subs.push(Subgroup {
                            key: sub.to_string(),
                            items: vec![item],
                        }),
                    }
                }
            }
        }
    }
}

/// One line of the rendered tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeRow<'a> {
    Group {
        /// Expand-state key (`top` or `top/sub`).
        key: String,
        label: &'a str,
        depth: usize,
        count: usize,
        expanded: bool,
    },
    Item {
        item: &'a MonitoringItem,
        depth: usize,
    },
}

/// Filter and bucket a snapshot of items.
///
/// Missing grouping fields land under [`UNKNOWN`]; nothing that passes the
/// filter is ever dropped.
pub fn group(items: &[MonitoringItem], filters: &FilterSet, by: GroupBy) -> GroupTree {
    let mut tree = GroupTree::default();
    for item in items.iter().filter(|item| filters.matches(item)) {
        let top = by.top_key(item);
        let sub = by.sub_key(item);
        tree.insert(top, sub, item.clone());
    }
    tree
}

/// Which groups are open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandState {
    expanded: BTreeSet<String>,
}

/// Transitions on [`ExpandState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandAction {
    Toggle(String),
    ExpandAll(Vec<String>),
    CollapseAll,
}

impl ExpandState {
    /// Key for a second-level group.
    pub fn child_key(top: &str, sub: &str) -> String {
        format!("{}/{}", top, sub)
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        self.expanded.contains(key)
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    /// Next state after `action`. `self` is left untouched.
    pub fn apply(&self, action: ExpandAction) -> Self {
        let mut expanded = self.expanded.clone();
        match action {
            ExpandAction::Toggle(key) => {
                if !expanded.remove(&key) {
                    expanded.insert(key);
                }
            }
            ExpandAction::ExpandAll(keys) => expanded.extend(keys),
            ExpandAction::CollapseAll => expanded.clear(),
        }
        Self { expanded }
    }
}

/// Flip one group open/closed.
pub fn toggle_expand(state: &ExpandState, key: &str) -> ExpandState {
    state.apply(ExpandAction::Toggle(key.to_string()))
}

/// Stable identity of an item across refreshes.
///
/// Items with an id are keyed by it; the rest by their natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Id(ItemKind, String),
    Natural {
        kind: ItemKind,
        engine: Option<String>,
        database: Option<String>,
        schema: Option<String>,
        table: Option<String>,
        timestamp: Option<String>,
    },
}

impl ItemKey {
    pub fn of(item: &MonitoringItem) -> Self {
        match non_empty(item.id()) {
            Some(id) => ItemKey::Id(item.kind(), id.to_string()),
            None => ItemKey::Natural {
                kind: item.kind(),
                engine: item.engine().map(str::to_string),
                database: item.database().map(str::to_string),
                schema: item.schema().map(str::to_string),
                table: item.table().map(str::to_string),
                timestamp: item.timestamp().map(str::to_string),
            },
        }
    }
}

/// Keep the selection only if the selected item survived the refresh.
pub fn reconcile_selection<'a, I>(selected: Option<ItemKey>, current: I) -> Option<ItemKey>
where
    I: IntoIterator<Item = &'a MonitoringItem>,
{
    let key = selected?;
    current.into_iter().any(|item| ItemKey::of(item) == key).then_some(key)
}
