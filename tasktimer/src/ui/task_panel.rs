//! Task list rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};

use super::theme;
use crate::app::{App, InputMode};

/// Render the task list with live elapsed times.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .rows
        .iter()
        .map(|row| {
            let (marker, time_style) = if row.running {
                ("▶", theme::running_time())
            } else {
                ("⏸", theme::normal())
            };

            let mut spans = vec![
                Span::styled(marker, time_style),
                Span::raw(" "),
                Span::styled(app.display_time(row), time_style),
                Span::raw("  "),
                Span::styled(row.title.as_str(), theme::normal()),
            ];
            if let Some(started) = &row.started {
                spans.push(Span::styled(format!("  (since {started})"), theme::dimmed()));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = if app.rows.is_empty() {
        "Tasks (press a to add)".to_string()
    } else {
        format!("Tasks ({})", app.rows.len())
    };

    let block = Block::default()
        .title(Span::styled(title, theme::panel_title(theme::TASKS_TITLE)))
        .borders(Borders::ALL)
        .border_style(if app.mode == InputMode::Normal {
            theme::highlighted()
        } else {
            theme::normal()
        });

    let list = List::new(items)
        .block(block)
        .highlight_style(theme::selected());

    let mut state = ListState::default();
    if !app.rows.is_empty() {
        state.select(Some(app.selected));
    }

    frame.render_stateful_widget(list, area, &mut state);
}
