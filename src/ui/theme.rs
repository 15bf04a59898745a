//! Palette for the operations dashboard.
//!
//! Colors come from the 256-color table so both palettes render the same on
//! any terminal that draws the tabs at all. Outcome colors (running, failed,
//! succeeded) are shared by the session flow, the activity statuses and the
//! header counters, so a failed phase and a failed query look alike.

use opwatch_types::PhaseStatus;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::session::SessionKind;

/// Styles shared by every view.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Status line and the help popup frame.
    pub accent: Color,
    /// Work still in flight.
    pub running: Color,
    pub critical: Color,
    pub healthy: Color,
    pub border: Color,
    pub border_type: BorderType,
    /// Column headers and the help title.
    pub header: Style,
    /// Row under the cursor.
    pub selected: Style,
    pub tab_active: Style,
    pub tab_inactive: Style,
    /// Sessions paired from an in-progress record and its outcome.
    pub merged: Color,
    /// Sessions made of one unpaired record.
    pub singleton: Color,
    /// Group rows in the activity tree.
    pub group: Style,
    /// Secondary text: item kinds, locations, group counts.
    pub muted: Style,
    /// Per-feed error lines above the view.
    pub banner: Style,
    /// Trend column in the metrics view.
    pub trend: Color,
    pub warning: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            accent: Color::Indexed(75),
            running: Color::Indexed(214),
            critical: Color::Indexed(203),
            healthy: Color::Indexed(114),
            border: Color::Indexed(240),
            border_type: BorderType::Rounded,
            header: Style::default()
                .fg(Color::Indexed(189))
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            selected: Style::default().bg(Color::Indexed(237)),
            tab_active: Style::default()
                .fg(Color::Indexed(16))
                .bg(Color::Indexed(75))
                .add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Indexed(246)),
            merged: Color::Indexed(141),
            singleton: Color::Indexed(248),
            group: Style::default().fg(Color::Indexed(153)).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::Indexed(243)),
            banner: Style::default()
                .fg(Color::Indexed(231))
                .bg(Color::Indexed(88))
                .add_modifier(Modifier::BOLD),
            trend: Color::Indexed(80),
            warning: Color::Indexed(214),
        }
    }

    pub fn light() -> Self {
        Self {
            accent: Color::Indexed(25),
            running: Color::Indexed(130),
            critical: Color::Indexed(160),
            healthy: Color::Indexed(28),
            border: Color::Indexed(249),
            border_type: BorderType::Plain,
            header: Style::default()
                .fg(Color::Indexed(17))
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            selected: Style::default().bg(Color::Indexed(254)),
            tab_active: Style::default()
                .fg(Color::Indexed(231))
                .bg(Color::Indexed(25))
                .add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Indexed(242)),
            merged: Color::Indexed(91),
            singleton: Color::Indexed(241),
            group: Style::default().fg(Color::Indexed(24)).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::Indexed(245)),
            banner: Style::default()
                .fg(Color::Indexed(231))
                .bg(Color::Indexed(160))
                .add_modifier(Modifier::BOLD),
            trend: Color::Indexed(31),
            warning: Color::Indexed(130),
        }
    }

    /// Light palette on bright backgrounds, dark otherwise or when the
    /// terminal does not answer.
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    pub fn status_style(&self, status: PhaseStatus) -> Style {
        match status {
            PhaseStatus::Success => Style::default().fg(self.healthy),
            PhaseStatus::InProgress => Style::default().fg(self.running),
            PhaseStatus::Error => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
            PhaseStatus::Unknown => self.muted.add_modifier(Modifier::ITALIC),
        }
    }

    /// Marker and style for a session's pairing.
    pub fn kind_marker(&self, kind: SessionKind) -> (&'static str, Style) {
        match kind {
            SessionKind::Merged => ("◆", Style::default().fg(self.merged)),
            SessionKind::Singleton => ("◇", Style::default().fg(self.singleton)),
        }
    }

    /// Style for a free-form item status as reported by the activity feed.
    pub fn item_status_style(&self, status: Option<&str>) -> Style {
        let status = status.unwrap_or("").to_ascii_lowercase();
        if status.contains("error") || status.contains("fail") || status.contains("kill") {
            Style::default().fg(self.critical)
        } else if status.contains("run") || status.contains("active") || status.contains("progress")
        {
            Style::default().fg(self.running)
        } else if status.contains("success") || status.contains("done") || status.contains("ok") {
            Style::default().fg(self.healthy)
        } else if status.contains("idle") || status.contains("wait") {
            self.muted
        } else {
            Style::default()
        }
    }
}
