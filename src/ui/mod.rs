//! Terminal UI rendering using ratatui.
//!
//! Each view lives in its own submodule with a `render` function:
//!
//! - [`sessions`]: timeline of reconstructed sessions with a detail pane
//! - [`tree`]: grouped, filterable activity tree
//! - [`metrics`]: per-channel sparklines with latest value and rate
//! - [`common`]: header, tabs, error banner, status bar, help overlay
//! - [`theme`]: light/dark theme support with terminal auto-detection
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Tabs (common::render_tabs)           │
//! ├──────────────────────────────────────┤
//! │ Feed errors (common::render_banner)  │
//! ├──────────────────────────────────────┤
//! │ View content                         │
//! ├──────────────────────────────────────┤
//! │ Status bar (common::render_status)   │
//! └──────────────────────────────────────┘
//! ```

pub mod common;
pub mod metrics;
pub mod sessions;
pub mod theme;
pub mod tree;

pub use theme::Theme;

use ratatui::layout::{Constraint, Layout};
use ratatui::Frame;

use crate::app::{App, View};

/// Minimum terminal size for a usable display.
pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 12;

/// Draw one frame.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        common::render_too_small(frame, app, area);
        return;
    }

    let banner_height = app.feed_errors().count() as u16;
    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(banner_height),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .split(area);

    common::render_header(frame, app, chunks[0]);
    common::render_tabs(frame, app, chunks[1]);
    common::render_banner(frame, app, chunks[2]);

    match app.current_view {
        View::Sessions => sessions::render(frame, app, chunks[3]),
        View::Activity => tree::render(frame, app, chunks[3]),
        View::Metrics => metrics::render(frame, app, chunks[3]),
    }

    common::render_status_bar(frame, app, chunks[4]);

    if app.show_help {
        common::render_help(frame, app, area);
    }
}
