//! Metric sparkline rendering.
//!
//! One row per channel: name, trend over the visible window, latest value
//! and per-second rate.

use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::data::sparkline::render_with_levels;

const NAME_WIDTH: u16 = 16;
const VALUE_WIDTH: u16 = 12;
const RATE_WIDTH: u16 = 12;

/// Render the Metrics view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    // Borders, highlight symbol and the three fixed columns plus spacing
    let trend_width = area
        .width
        .saturating_sub(2 + 2 + NAME_WIDTH + VALUE_WIDTH + RATE_WIDTH + 3)
        .max(1) as usize;

    let header = Row::new(vec!["Channel", "Trend", "Latest", "Rate"])
        .height(1)
        .style(app.theme.header);

    let rows: Vec<Row> = app
        .metrics
        .channels()
        .map(|channel| {
            let values = app.metrics.values(channel);
            let trend = render_with_levels(&values, trend_width, app.sparkline_levels);
            let latest = app
                .metrics
                .latest(channel)
                .map(|p| format_value(p.value))
                .unwrap_or_else(|| "-".to_string());
            let rate = app
                .metrics
                .rate(channel)
                .map(|r| format!("{}/s", format_value(r)))
                .unwrap_or_else(|| "-".to_string());

            Row::new(vec![
                Cell::from(channel.to_string()),
                Cell::from(trend).style(Style::default().fg(app.theme.trend)),
                Cell::from(latest),
                Cell::from(rate),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(NAME_WIDTH),
        Constraint::Min(trend_width as u16),
        Constraint::Length(VALUE_WIDTH),
        Constraint::Length(RATE_WIDTH),
    ];

    let channel_count = rows.len();
    let title = format!(
        " Metrics ({} channels, {} samples) ",
        channel_count,
        app.metrics.len()
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
    if channel_count > 0 {
        state.select(Some(app.selected_channel.min(channel_count - 1)));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

/// Format a value with K/M suffixes.
fn format_value(v: f64) -> String {
    let abs = v.abs();
    if abs >= 1_000_000.0 {
        format!("{:.1}M", v / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}K", v / 1_000.0)
    } else if abs >= 10.0 || v == v.trunc() {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(3.14159), "3.14");
        assert_eq!(format_value(42.7), "43");
        assert_eq!(format_value(1_500.0), "1.5K");
        assert_eq!(format_value(-2_500_000.0), "-2.5M");
    }
}
