//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, InputMode, StatusKind};

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let help_text = match app.mode {
        InputMode::Normal => {
            "a: add | e: rename | Enter/Space: start/pause | r: reset | d: delete | x: export | C: clear | q: quit"
        }
        InputMode::Adding | InputMode::Renaming(_) => "Enter: save | Esc: cancel | ←→: move cursor",
        InputMode::ConfirmClear => "y: delete everything | any other key: cancel",
    };

    let running = app.rows.iter().filter(|r| r.running).count();

    let mut spans = vec![
        Span::styled("TaskTimer", theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(if running > 0 {
            theme::RUNNING
        } else {
            theme::FG_SECONDARY
        })),
        Span::raw(format!(" {running} running")),
        Span::raw(" | "),
    ];

    match &app.status {
        Some((StatusKind::Warning, message)) => {
            spans.push(Span::styled(message.as_str(), theme::normal().fg(theme::WARNING)));
            spans.push(Span::raw(" | "));
        }
        Some((StatusKind::Info, message)) => {
            spans.push(Span::raw(message.as_str()));
            spans.push(Span::raw(" | "));
        }
        None => {}
    }
    spans.push(Span::styled(help_text, theme::dimmed()));

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
