//! Application state and event handling.
//!
//! [`App`] holds only what the view needs: a row per task, the selection,
//! the input line, and a status message. It never touches the store
//! directly; key handling produces an [`Action`] for the event loop to
//! dispatch.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tasktimer_proto::duration::{format_hms, format_hms_millis};
use tasktimer_proto::task::{Task, TaskId};

use crate::tracker::{Command, TickEvent};

/// What the keyboard is currently editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    /// Navigating the task list.
    Normal,
    /// Typing the title of a new task.
    Adding,
    /// Typing a new title for an existing task.
    Renaming(TaskId),
    /// Waiting for `y` to delete every task.
    ConfirmClear,
}

/// Something the event loop must do in response to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Apply a task command.
    Command(Command),
    /// Write the CSV export.
    Export,
}

/// Severity of the status bar message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Confirmation of a completed action.
    Info,
    /// Something the user should notice (storage trouble, bad input).
    Warning,
}

/// One task as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    /// Task identifier.
    pub id: TaskId,
    /// Title.
    pub title: String,
    /// Whether the task is running.
    pub running: bool,
    /// Displayed elapsed time. Updated by ticks while running.
    pub elapsed_ms: u64,
    /// First start since the last reset.
    pub started: Option<String>,
}

/// Main application state.
pub struct App {
    /// Rows in display order.
    pub rows: Vec<TaskRow>,
    /// Selected row index.
    pub selected: usize,
    /// Current input mode.
    pub mode: InputMode,
    /// Text being typed in `Adding`/`Renaming` mode.
    pub input: String,
    /// Cursor position in input (character index).
    pub cursor_position: usize,
    /// Message shown in the status bar.
    pub status: Option<(StatusKind, String)>,
    /// Show milliseconds in elapsed times.
    pub show_millis: bool,
    /// Whether the app should quit.
    pub should_quit: bool,
}

impl App {
    /// Create an empty application.
    #[must_use]
    pub const fn new(show_millis: bool) -> Self {
        Self {
            rows: Vec::new(),
            selected: 0,
            mode: InputMode::Normal,
            input: String::new(),
            cursor_position: 0,
            status: None,
            show_millis,
            should_quit: false,
        }
    }

    /// Rebuild rows from the store's tasks, measuring running ones at
    /// `now_ms`. The selection follows the previously selected task when it
    /// still exists.
    pub fn sync_tasks<'a>(
        &mut self,
        tasks: impl IntoIterator<Item = (&'a TaskId, &'a Task)>,
        now_ms: u64,
    ) {
        let previous = self.selected_id().cloned();
        self.rows = tasks
            .into_iter()
            .map(|(id, task)| TaskRow {
                id: id.clone(),
                title: task.title.clone(),
                running: task.running,
                elapsed_ms: task.live_elapsed_ms(now_ms),
                started: task.last_start_iso.clone(),
            })
            .collect();

        if let Some(index) = previous.and_then(|id| self.rows.iter().position(|r| r.id == id)) {
            self.selected = index;
        } else {
            self.selected = self.selected.min(self.rows.len().saturating_sub(1));
        }
    }

    /// Refresh one row's displayed time. Ticks for unknown or paused rows
    /// are ignored.
    pub fn apply_tick(&mut self, event: &TickEvent) {
        if let Some(row) = self
            .rows
            .iter_mut()
            .find(|r| r.id == event.id && r.running)
        {
            row.elapsed_ms = event.live_ms;
        }
    }

    /// Format a row's elapsed time for display.
    #[must_use]
    pub fn display_time(&self, row: &TaskRow) -> String {
        if self.show_millis {
            format_hms_millis(row.elapsed_ms)
        } else {
            format_hms(row.elapsed_ms)
        }
    }

    /// The selected task's identifier.
    #[must_use]
    pub fn selected_id(&self) -> Option<&TaskId> {
        self.rows.get(self.selected).map(|r| &r.id)
    }

    /// Show an informational status message.
    pub fn set_info(&mut self, message: impl Into<String>) {
        self.status = Some((StatusKind::Info, message.into()));
    }

    /// Show a warning in the status bar.
    pub fn set_warning(&mut self, message: impl Into<String>) {
        self.status = Some((StatusKind::Warning, message.into()));
    }

    /// Handle a key event, returning the action it requests, if any.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }

        match self.mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Adding | InputMode::Renaming(_) => self.handle_input_key(key),
            InputMode::ConfirmClear => self.handle_confirm_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_prev();
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
                None
            }
            KeyCode::Char('a') => {
                self.begin_input(InputMode::Adding, String::new());
                None
            }
            KeyCode::Char('e') => {
                let row = self.rows.get(self.selected)?;
                let (id, title) = (row.id.clone(), row.title.clone());
                self.begin_input(InputMode::Renaming(id), title);
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let row = self.rows.get(self.selected)?;
                let id = row.id.clone();
                Some(Action::Command(if row.running {
                    Command::Pause(id)
                } else {
                    Command::Start(id)
                }))
            }
            KeyCode::Char('r') => self
                .selected_id()
                .map(|id| Action::Command(Command::Reset(id.clone()))),
            KeyCode::Char('d') => self
                .selected_id()
                .map(|id| Action::Command(Command::Remove(id.clone()))),
            KeyCode::Char('x') => Some(Action::Export),
            KeyCode::Char('C') => {
                self.mode = InputMode::ConfirmClear;
                self.set_warning("Delete all tasks and times? (y/n)");
                None
            }
            _ => None,
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Enter => self.submit_input(),
            KeyCode::Esc => {
                self.end_input();
                None
            }
            KeyCode::Char(c) => {
                self.enter_char(c);
                None
            }
            KeyCode::Backspace => {
                self.delete_char();
                None
            }
            KeyCode::Left => {
                self.cursor_position = self.cursor_position.saturating_sub(1);
                None
            }
            KeyCode::Right => {
                if self.cursor_position < self.input.chars().count() {
                    self.cursor_position += 1;
                }
                None
            }
            KeyCode::Home => {
                self.cursor_position = 0;
                None
            }
            KeyCode::End => {
                self.cursor_position = self.input.chars().count();
                None
            }
            _ => None,
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Option<Action> {
        self.mode = InputMode::Normal;
        if key.code == KeyCode::Char('y') {
            Some(Action::Command(Command::Clear))
        } else {
            self.set_info("Clear cancelled");
            None
        }
    }

    fn begin_input(&mut self, mode: InputMode, initial: String) {
        self.cursor_position = initial.chars().count();
        self.input = initial;
        self.mode = mode;
    }

    fn end_input(&mut self) {
        self.mode = InputMode::Normal;
        self.input.clear();
        self.cursor_position = 0;
    }

    fn submit_input(&mut self) -> Option<Action> {
        let title = std::mem::take(&mut self.input);
        let mode = std::mem::replace(&mut self.mode, InputMode::Normal);
        self.cursor_position = 0;
        match mode {
            InputMode::Adding => Some(Action::Command(Command::Create { title })),
            InputMode::Renaming(id) => Some(Action::Command(Command::Rename { id, title })),
            InputMode::Normal | InputMode::ConfirmClear => None,
        }
    }

    /// Byte offset of the character at `cursor_position`.
    fn cursor_byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn enter_char(&mut self, c: char) {
        let index = self.cursor_byte_index();
        self.input.insert(index, c);
        self.cursor_position += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let index = self.cursor_byte_index();
            self.input.remove(index);
        }
    }

    const fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    const fn select_next(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(false)
    }
}
