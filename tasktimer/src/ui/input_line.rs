//! Title input box, shown while adding or renaming.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use super::theme;
use crate::app::{App, InputMode};

/// Render the input box with a block cursor.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let title = match app.mode {
        InputMode::Renaming(_) => "Rename task",
        _ => "New task",
    };

    let mut display_text: String = app.input.chars().take(app.cursor_position).collect();
    display_text.push('█');
    display_text.extend(app.input.chars().skip(app.cursor_position));

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(theme::highlighted());

    let paragraph = Paragraph::new(Line::from(Span::styled(display_text, theme::normal())))
        .block(block);

    frame.render_widget(paragraph, area);
}
