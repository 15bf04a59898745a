//! Session timeline rendering.
//!
//! A table of reconstructed sessions, newest first, with a detail pane for
//! the selected one.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_seconds;
use crate::data::session::Session;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render the Sessions view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::horizontal([Constraint::Fill(3), Constraint::Fill(2)]).split(area);
    render_table(frame, app, chunks[0]);
    render_detail(frame, app, chunks[1]);
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec!["", "Started", "Operation", "Flow", "Duration", "Rows"])
        .height(1)
        .style(app.theme.header);

    let rows: Vec<Row> = app
        .sessions
        .iter()
        .map(|s| {
            let (marker, marker_style) = app.theme.kind_marker(s.kind);
            Row::new(vec![
                Cell::from(marker).style(marker_style),
                Cell::from(format_time(s.start_time.or(s.end_time))),
                Cell::from(s.operation.clone().unwrap_or_else(|| s.id.clone())),
                Cell::from(flow_line(app, s)),
                Cell::from(format_seconds(s.duration_seconds)),
                Cell::from(s.rows_processed.map(|r| r.to_string()).unwrap_or_else(|| "-".into())),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(1),
        Constraint::Length(19),
        Constraint::Fill(2),
        Constraint::Fill(2),
        Constraint::Length(9),
        Constraint::Length(8),
    ];

    let selected = app.selected_session.min(app.sessions.len().saturating_sub(1));
    let position = if app.sessions.is_empty() {
        String::new()
    } else {
        format!(" [{}/{}]", selected + 1, app.sessions.len())
    };
    let title = format!(
        " Sessions ({} from {} records){} ",
        app.sessions.len(),
        app.records.len(),
        position
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    if !app.sessions.is_empty() {
        state.select(Some(selected));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn flow_line(app: &App, session: &Session) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, status) in session.status_flow.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" → "));
        }
        spans.push(Span::styled(status.label(), app.theme.status_style(*status)));
    }
    Line::from(spans)
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Detail ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let Some(session) = app.selected_session() else {
        let hint = if app.sessions.is_empty() {
            " No sessions"
        } else {
            " Selected session is gone, pick another with j/k"
        };
        frame.render_widget(Paragraph::new(hint).block(block), area);
        return;
    };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(format!(" {:<12}", name), bold), Span::raw(value)])
    };

    let mut lines = vec![
        field("Session", session.id.clone()),
        field("Records", session.record_ids.join(", ")),
        Line::from(vec![
            Span::styled(format!(" {:<12}", "Status"), bold),
            Span::styled(
                session.final_status.label(),
                app.theme.status_style(session.final_status),
            ),
        ]),
        field("Started", format_time(session.start_time)),
        field("Ended", format_time(session.end_time)),
        field("Duration", format_seconds(session.duration_seconds)),
    ];

    if let Some(phase) = &session.in_progress_phase {
        lines.push(field("Running for", format_seconds(phase.duration_seconds)));
    }
    if let Some(final_phase) = session.final_phase_duration {
        lines.push(field("Final phase", format_seconds(final_phase)));
    }
    if let Some(rows) = session.rows_processed {
        lines.push(field("Rows", rows.to_string()));
    }
    if let Some(err) = &session.error_message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", err),
            Style::default().fg(app.theme.critical),
        )));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn format_time(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}
