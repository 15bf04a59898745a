use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, View};

/// Where exported sessions go when `e` is pressed.
pub const EXPORT_PATH: &str = "sessions_export.json";

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.filter_active {
        handle_filter_input(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.prev_view();
            } else {
                app.next_view();
            }
        }
        KeyCode::BackTab => app.prev_view(),

        KeyCode::Char('1') => app.set_view(View::Sessions),
        KeyCode::Char('2') => app.set_view(View::Activity),
        KeyCode::Char('3') => app.set_view(View::Metrics),

        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Left | KeyCode::Char('h') => app.prev_view(),
        KeyCode::Right | KeyCode::Char('l') => app.next_view(),
        KeyCode::PageUp => app.select_prev_n(10),
        KeyCode::PageDown => app.select_next_n(10),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        KeyCode::Char('?') => app.toggle_help(),

        KeyCode::Char('e') => {
            let export_path = std::path::PathBuf::from(EXPORT_PATH);
            match app.export_sessions(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        _ if app.current_view == View::Activity => handle_activity_key(app, key),
        _ => {}
    }
}

/// Keys that only mean something in the activity tree.
fn handle_activity_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') => app.toggle_selected_group(),
        KeyCode::Char('E') => app.expand_all(),
        KeyCode::Char('z') => app.collapse_all(),
        KeyCode::Char('g') => app.cycle_group_by(),
        KeyCode::Char('f') => app.cycle_kind_filter(),
        KeyCode::Char('t') => app.cycle_status_filter(),
        KeyCode::Char('n') => app.cycle_engine_filter(),
        KeyCode::Char('/') => app.start_filter(),
        KeyCode::Char('c') => {
            if !app.filters.is_empty() {
                app.clear_filter();
            }
        }
        KeyCode::Char('x') => app.terminate_selected(),
        _ => {}
    }
}

/// Handle key input while filter is active
fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        // Confirm filter
        KeyCode::Enter => {
            app.filter_active = false;
        }

        // Cancel filter (keep text but exit input mode)
        KeyCode::Esc => {
            app.cancel_filter();
        }

        // Clear and exit
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.clear_filter();
        }

        KeyCode::Backspace => {
            app.filter_pop();
            if app.filter_text().is_empty() {
                app.filter_active = false;
            }
        }

        KeyCode::Char(c) => {
            app.filter_push(c);
        }

        _ => {}
    }
}

/// Handle mouse events
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.select_prev(),
        MouseEventKind::ScrollDown => app.select_next(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::source::{FeedPayload, FeedUpdate};
    use opwatch_types::{AdminCommand, MonitoringItem, QueryActivity};
    use tokio_util::sync::CancellationToken;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_with_query() -> App {
        let mut app = App::new(&Settings::default(), "test", CancellationToken::new());
        app.apply_update(FeedUpdate::ok(FeedPayload::Items(vec![MonitoringItem::Query(
            QueryActivity {
                id: Some("q1".into()),
                engine: Some("pg".into()),
                ..QueryActivity::default()
            },
        )])));
        app
    }

    #[test]
    fn number_keys_switch_views() {
        let mut app = app_with_query();
        handle_key_event(&mut app, key(KeyCode::Char('3')));
        assert_eq!(app.current_view, View::Metrics);
        handle_key_event(&mut app, key(KeyCode::Tab));
        assert_eq!(app.current_view, View::Sessions);
    }

    #[test]
    fn help_swallows_next_key() {
        let mut app = app_with_query();
        handle_key_event(&mut app, key(KeyCode::Char('?')));
        assert!(app.show_help);
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.show_help);
        assert!(app.running);
    }

    #[test]
    fn activity_keys_drive_the_tree() {
        let mut app = app_with_query();
        handle_key_event(&mut app, key(KeyCode::Char('2')));

        handle_key_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.visible_rows().len(), 2);

        handle_key_event(&mut app, key(KeyCode::Down));
        handle_key_event(&mut app, key(KeyCode::Char('x')));
        assert_eq!(app.take_outbox(), vec![AdminCommand::Terminate { id: "q1".into() }]);
    }

    #[test]
    fn activity_keys_ignored_elsewhere() {
        let mut app = app_with_query();
        handle_key_event(&mut app, key(KeyCode::Char('x')));
        assert!(app.take_outbox().is_empty());
    }

    #[test]
    fn typing_a_filter() {
        let mut app = app_with_query();
        handle_key_event(&mut app, key(KeyCode::Char('2')));
        handle_key_event(&mut app, key(KeyCode::Char('/')));
        assert!(app.filter_active);

        for c in "zzz".chars() {
            handle_key_event(&mut app, key(KeyCode::Char(c)));
        }
        assert_eq!(app.tree.item_count(), 0);

        handle_key_event(&mut app, key(KeyCode::Enter));
        assert!(!app.filter_active);

        handle_key_event(&mut app, key(KeyCode::Char('c')));
        assert_eq!(app.tree.item_count(), 1);
    }

    #[test]
    fn quit_tears_down() {
        let mut app = app_with_query();
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.running);
        assert!(!app.is_live());
    }
}
