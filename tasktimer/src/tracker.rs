//! Command interface tying task state to display refresh.
//!
//! View layers do not call [`TaskStore`] and [`TickScheduler`] separately.
//! They emit [`Command`]s, and [`Tracker`] applies each one as a single
//! operation: the store mutation and the matching tick (un)registration
//! happen together, so a paused, reset or deleted task never keeps a live
//! refresh callback.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tasktimer_proto::task::{Task, TaskId};

use crate::clock::Clock;
use crate::storage::KeyValueStore;
use crate::tasks::{StorageWarning, TaskError, TaskStore, Transition};
use crate::ticker::TickScheduler;

/// A task store shared between the tracker and its tick samplers.
pub type SharedTaskStore<S, C> = Arc<Mutex<TaskStore<S, C>>>;

/// One refresh of a running task's displayed time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickEvent {
    /// The running task.
    pub id: TaskId,
    /// Its live elapsed time at the tick.
    pub live_ms: u64,
}

/// Receives tick events from every registration.
pub type TickSink = Arc<dyn Fn(TickEvent) + Send + Sync>;

/// A user action emitted by a view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a task with the given title.
    Create {
        /// Requested title (empty becomes "Task").
        title: String,
    },
    /// Start a task.
    Start(TaskId),
    /// Pause a task.
    Pause(TaskId),
    /// Reset a task to zero.
    Reset(TaskId),
    /// Change a task's title.
    Rename {
        /// Task to rename.
        id: TaskId,
        /// New title.
        title: String,
    },
    /// Delete a task.
    Remove(TaskId),
    /// Delete every task.
    Clear,
}

/// The result of applying a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A task was created.
    Created(TaskId),
    /// A start, pause or reset was applied.
    Updated(Transition),
    /// A task was renamed.
    Renamed,
    /// A task was removed; carries its final record.
    Removed(Task),
    /// All tasks were removed.
    Cleared(usize),
}

/// Anything that can receive per-task timer commands.
pub trait TaskCommands {
    /// Starts `id`, beginning its display refresh.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown.
    fn start(&mut self, id: &TaskId) -> Result<Transition, TaskError>;

    /// Pauses `id`, cancelling its display refresh.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown.
    fn pause(&mut self, id: &TaskId) -> Result<Transition, TaskError>;

    /// Resets `id`, cancelling its display refresh.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown.
    fn reset(&mut self, id: &TaskId) -> Result<Transition, TaskError>;

    /// Deletes `id`, cancelling its display refresh.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown.
    fn remove(&mut self, id: &TaskId) -> Result<Task, TaskError>;
}

/// Applies commands to a [`TaskStore`] and keeps a [`TickScheduler`] in step.
pub struct Tracker<S, C> {
    store: SharedTaskStore<S, C>,
    scheduler: TickScheduler,
    interval: Duration,
    sink: TickSink,
}

impl<S, C> Tracker<S, C>
where
    S: KeyValueStore + 'static,
    C: Clock + 'static,
{
    /// Wraps a loaded store. Ticks for running tasks are published to
    /// `sink` every `interval`.
    #[must_use]
    pub fn new(store: TaskStore<S, C>, interval: Duration, sink: TickSink) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            scheduler: TickScheduler::new(),
            interval,
            sink,
        }
    }

    /// Handle to the shared store, for read access from the view.
    #[must_use]
    pub fn store(&self) -> SharedTaskStore<S, C> {
        Arc::clone(&self.store)
    }

    /// The tick scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    /// Registers ticking for every task that is already running, e.g.
    /// after a reload. Returns how many registrations were created.
    pub fn resume_ticking(&mut self) -> usize {
        let running = self.store.lock().running_ids();
        running
            .into_iter()
            .filter(|id| self.begin_ticking(id))
            .count()
    }

    /// Applies one view command.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] if the command references an unknown task or
    /// carries an invalid title.
    pub fn apply(&mut self, command: Command) -> Result<Outcome, TaskError> {
        match command {
            Command::Create { title } => self.create(&title).map(Outcome::Created),
            Command::Start(id) => self.start(&id).map(Outcome::Updated),
            Command::Pause(id) => self.pause(&id).map(Outcome::Updated),
            Command::Reset(id) => self.reset(&id).map(Outcome::Updated),
            Command::Rename { id, title } => {
                self.store.lock().rename(&id, &title).map(|()| Outcome::Renamed)
            }
            Command::Remove(id) => self.remove(&id).map(Outcome::Removed),
            Command::Clear => Ok(Outcome::Cleared(self.clear())),
        }
    }

    /// Creates a paused task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TitleTooLong`] for an over-long title.
    pub fn create(&mut self, title: &str) -> Result<TaskId, TaskError> {
        self.store.lock().create(title)
    }

    /// Deletes every task and cancels all ticking.
    pub fn clear(&mut self) -> usize {
        let removed = self.store.lock().clear();
        self.scheduler.stop_all();
        removed
    }

    /// Cancels all ticking and retries any failed durable write.
    ///
    /// Returns `true` if the durable copy is current.
    pub fn shutdown(&mut self) -> bool {
        let stopped = self.scheduler.stop_all();
        tracing::debug!(stopped, "tracker shutting down");
        self.store.lock().flush()
    }

    /// Drains storage warnings raised by the store.
    pub fn take_warnings(&self) -> Vec<StorageWarning> {
        self.store.lock().take_warnings()
    }

    fn begin_ticking(&mut self, id: &TaskId) -> bool {
        let sampler = {
            let store = Arc::clone(&self.store);
            let id = id.clone();
            move || store.lock().running_elapsed_ms(&id)
        };
        let on_tick = {
            let sink = Arc::clone(&self.sink);
            let id = id.clone();
            move |live_ms| {
                sink(TickEvent {
                    id: id.clone(),
                    live_ms,
                });
            }
        };
        self.scheduler
            .start_ticking(id.clone(), self.interval, sampler, on_tick)
    }
}

impl<S, C> TaskCommands for Tracker<S, C>
where
    S: KeyValueStore + 'static,
    C: Clock + 'static,
{
    fn start(&mut self, id: &TaskId) -> Result<Transition, TaskError> {
        let transition = self.store.lock().start(id)?;
        // Also covers a task that was running before a reload.
        self.begin_ticking(id);
        Ok(transition)
    }

    fn pause(&mut self, id: &TaskId) -> Result<Transition, TaskError> {
        let result = self.store.lock().pause(id);
        self.scheduler.stop_ticking(id);
        result
    }

    fn reset(&mut self, id: &TaskId) -> Result<Transition, TaskError> {
        let result = self.store.lock().reset(id);
        self.scheduler.stop_ticking(id);
        result
    }

    fn remove(&mut self, id: &TaskId) -> Result<Task, TaskError> {
        let result = self.store.lock().remove(id);
        self.scheduler.stop_ticking(id);
        result
    }
}
