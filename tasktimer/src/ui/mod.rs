//! Terminal UI rendering.

pub mod input_line;
pub mod status_bar;
pub mod task_panel;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};

use crate::app::{App, InputMode};

/// Main draw function for the entire UI.
pub fn draw(frame: &mut Frame, app: &App) {
    let editing = matches!(app.mode, InputMode::Adding | InputMode::Renaming(_));
    let input_height = if editing { 3 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(input_height),
            Constraint::Length(1),
        ])
        .split(frame.area());

    task_panel::render(frame, chunks[0], app);
    if editing {
        input_line::render(frame, chunks[1], app);
    }
    status_bar::render(frame, chunks[2], app);
}
