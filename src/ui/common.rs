//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, feed error banner, status
//! bar, and help overlay.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};
use crate::data::duration::format_seconds;

/// Render the header bar with the session summary.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let summary = &app.summary;

    if app.last_updated().is_none() {
        let line = Line::from(vec![
            Span::styled(" OPWATCH ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| Waiting for data..."),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let (status_icon, status_style) = if summary.failed > 0 {
        ("●", Style::default().fg(app.theme.critical))
    } else if summary.in_progress > 0 {
        ("●", Style::default().fg(app.theme.running))
    } else {
        ("●", Style::default().fg(app.theme.healthy))
    };

    let count = |n: usize, color: Color| {
        if n > 0 {
            Span::styled(n.to_string(), Style::default().fg(color))
        } else {
            Span::styled("0", app.theme.muted)
        }
    };

    let mean = summary
        .mean_duration_seconds
        .map(format_seconds)
        .unwrap_or_else(|| "-".to_string());

    let line = Line::from(vec![
        Span::styled(format!(" {} ", status_icon), status_style),
        Span::styled("OPWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(summary.total.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" sessions ("),
        Span::styled(summary.merged.to_string(), Style::default().fg(app.theme.merged)),
        Span::raw(" paired) │ "),
        count(summary.in_progress, app.theme.running),
        Span::raw(" running "),
        count(summary.succeeded, app.theme.healthy),
        Span::raw(" ok "),
        count(summary.failed, app.theme.critical),
        Span::raw(" failed │ avg "),
        Span::raw(mean),
        Span::raw(" │ "),
        Span::raw(format!("{} items", app.items.len())),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the tab bar showing available views.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = vec![
        Line::from(" 1:Sessions "),
        Line::from(" 2:Activity "),
        Line::from(" 3:Metrics "),
    ];

    let selected = match app.current_view {
        View::Sessions => 0,
        View::Activity => 1,
        View::Metrics => 2,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// One line per failing feed. Empty when every feed is healthy.
pub fn render_banner(frame: &mut Frame, app: &App, area: Rect) {
    if area.height == 0 {
        return;
    }

    let lines: Vec<Line> = app
        .feed_errors()
        .map(|(kind, err)| {
            Line::from(vec![
                Span::styled(format!(" ! {} feed: {} ", kind, err), app.theme.banner),
                Span::styled("  showing last good data", app.theme.muted),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), area);
}

/// Render the status bar at the bottom.
///
/// Shows: source, time since last update, available controls. Temporary
/// status messages take precedence.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.accent));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = match app.current_view {
        View::Sessions => "↑↓:select Tab:switch e:export ?:help q:quit",
        View::Activity if app.filter_active => "Type to search | Enter:apply Esc:cancel",
        View::Activity => "/:search Enter:expand g:group f/t/n:filter x:terminate ?:help q:quit",
        View::Metrics => "↑↓:select Tab:switch ?:help q:quit",
    };

    let updated = match app.last_updated() {
        Some(elapsed) => format!("Updated {:.1}s ago", elapsed.as_secs_f64()),
        None => "Loading...".to_string(),
    };

    let status = format!(
        " {} | {} | {} | {}",
        app.current_view.label(),
        app.source_description(),
        updated,
        controls
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Shown instead of the dashboard when the terminal is too small.
pub fn render_too_small(frame: &mut Frame, app: &App, area: Rect) {
    let msg = format!(
        "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
        area.width,
        area.height,
        super::MIN_WIDTH,
        super::MIN_HEIGHT
    );
    let paragraph = Paragraph::new(msg)
        .alignment(Alignment::Center)
        .style(Style::default().fg(app.theme.warning));
    let centered = Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5.min(area.height));
    frame.render_widget(paragraph, centered);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(title, Style::default().add_modifier(Modifier::BOLD))])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Navigation"),
        Line::from("  ←/→ h/l     Switch views"),
        Line::from("  1/2/3       Jump to view"),
        Line::from("  ↑/↓ j/k     Navigate list"),
        Line::from("  PgUp/PgDn   Jump 10 items"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from(""),
        section(" Activity"),
        Line::from("  Enter/Space Expand/collapse group"),
        Line::from("  E / z       Expand all / collapse all"),
        Line::from("  g           Cycle grouping"),
        Line::from("  f t n       Filter kind/status/engine"),
        Line::from("  /           Search"),
        Line::from("  c           Clear filters"),
        Line::from("  x           Terminate selected query"),
        Line::from(""),
        section(" General"),
        Line::from("  e           Export sessions to JSON"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.accent));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 44u16.min(area.width.saturating_sub(4));
    let help_height = 28u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
