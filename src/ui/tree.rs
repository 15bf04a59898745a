//! Activity tree rendering.

use opwatch_types::MonitoringItem;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::app::App;
use crate::data::tree::TreeRow;

/// Render the grouped activity tree.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = app.visible_rows();

    let items: Vec<ListItem> = rows.iter().map(|row| ListItem::new(row_line(app, row))).collect();

    let title = format!(
        " Activity ({}/{}) by {}{} ",
        app.tree.item_count(),
        app.items.len(),
        app.group_by.label(),
        filter_info(app)
    );

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    if !rows.is_empty() {
        state.select(Some(app.selected_row.min(rows.len() - 1)));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn row_line<'a>(app: &App, row: &TreeRow<'a>) -> Line<'a> {
    match row {
        TreeRow::Group {
            label,
            depth,
            count,
            expanded,
            ..
        } => {
            let marker = if *expanded { "▾" } else { "▸" };
            Line::from(vec![
                Span::raw("  ".repeat(*depth)),
                Span::raw(format!("{} ", marker)),
                Span::styled(*label, app.theme.group),
                Span::styled(format!(" ({})", count), app.theme.muted),
            ])
        }
        TreeRow::Item { item, depth } => item_line(app, item, *depth),
    }
}

fn item_line<'a>(app: &App, item: &'a MonitoringItem, depth: usize) -> Line<'a> {
    let dim = app.theme.muted;
    let status = item.status().unwrap_or("-");
    let location = [item.schema(), item.table()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(".");

    Line::from(vec![
        Span::raw("  ".repeat(depth)),
        Span::styled(format!("{:<9}", item.kind().label()), dim),
        Span::styled(format!("{:<10} ", status), app.theme.item_status_style(item.status())),
        Span::raw(item.id().unwrap_or("-")),
        Span::raw(" "),
        Span::styled(location, dim),
        Span::raw(" "),
        Span::raw(item.headline().unwrap_or("")),
    ])
}

fn filter_info(app: &App) -> String {
    let mut parts = Vec::new();
    if let Some(kind) = app.filters.kind {
        parts.push(format!("kind={}", kind));
    }
    if let Some(status) = &app.filters.status {
        parts.push(format!("status={}", status));
    }
    if let Some(engine) = &app.filters.engine {
        parts.push(format!("engine={}", engine));
    }

    let text = app.filter_text();
    if app.filter_active {
        parts.push(format!("/{}_", text));
    } else if !text.is_empty() {
        parts.push(format!("/{}/", text));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!(" [{}] [c:clear]", parts.join(" "))
    }
}
