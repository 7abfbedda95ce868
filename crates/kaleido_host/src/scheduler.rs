//! Timer and Frame Scheduling
//!
//! Every timer/callback-driven loop in the core (render scheduling, preset
//! rotation, performance sampling windows, playback polling) goes through
//! this abstraction instead of real wall-clock timers, so ordering and
//! cancellation are testable.
//!
//! [`ManualScheduler`] is the provided implementation: a virtual clock that
//! only moves when `advance` is called, firing due tasks in timestamp order.
//! A host shell drives the same scheduler from its real event loop.

use std::cell::RefCell;

/// Task callback; receives the scheduler's current time in milliseconds
pub type TaskFn = Box<dyn FnMut(f64)>;

/// Handle identifying a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Cooperative single-threaded scheduler seam.
///
/// Methods take `&self`: implementations use interior mutability so tasks
/// can schedule and cancel other tasks from inside a callback.
pub trait Scheduler {
    /// Current scheduler time in milliseconds
    fn now_ms(&self) -> f64;

    /// Run `task` once after `delay_ms`
    fn schedule_once(&self, delay_ms: f64, task: TaskFn) -> TaskId;

    /// Run `task` every `interval_ms` until cancelled
    fn schedule_repeating(&self, interval_ms: f64, task: TaskFn) -> TaskId;

    /// Run `task` once per host paint until cancelled (the vsync path)
    fn schedule_frame(&self, task: TaskFn) -> TaskId;

    /// Cancel a task. Idempotent; once this returns the task never fires
    /// again, including a task cancelled from within its own callback.
    fn cancel(&self, id: TaskId);
}

enum Cadence {
    Once,
    Repeating(f64),
    Frame,
}

struct Task {
    id: TaskId,
    due: f64,
    seq: u64,
    cadence: Cadence,
    callback: TaskFn,
}

struct Inner {
    now: f64,
    paint_interval: f64,
    next_id: u64,
    tasks: Vec<Task>,
    /// Task currently executing, removed from the queue while it runs
    in_flight: Option<TaskId>,
    in_flight_cancelled: bool,
}

impl Inner {
    fn push(&mut self, due: f64, cadence: Cadence, callback: TaskFn) -> TaskId {
        let id = TaskId(self.next_id);
        let seq = self.next_id;
        self.next_id += 1;
        self.tasks.push(Task {
            id,
            due,
            seq,
            cadence,
            callback,
        });
        id
    }

    /// Index of the earliest task due at or before `deadline`; ties resolve
    /// by registration order
    fn next_due(&self, deadline: f64) -> Option<usize> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= deadline)
            .min_by(|(_, a), (_, b)| {
                a.due
                    .partial_cmp(&b.due)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(i, _)| i)
    }
}

/// Deterministic virtual-clock scheduler
pub struct ManualScheduler {
    inner: RefCell<Inner>,
}

/// Default simulated paint cadence (~60 Hz)
pub const DEFAULT_PAINT_INTERVAL_MS: f64 = 16.0;

impl ManualScheduler {
    pub fn new() -> Self {
        Self::with_paint_interval(DEFAULT_PAINT_INTERVAL_MS)
    }

    /// Override the simulated paint cadence for frame tasks
    pub fn with_paint_interval(paint_interval_ms: f64) -> Self {
        Self {
            inner: RefCell::new(Inner {
                now: 0.0,
                paint_interval: paint_interval_ms,
                next_id: 1,
                tasks: Vec::new(),
                in_flight: None,
                in_flight_cancelled: false,
            }),
        }
    }

    /// Move the virtual clock forward by `ms`, firing every due task in
    /// timestamp order. Callbacks may schedule and cancel tasks; a task
    /// cancelled mid-advance does not fire again.
    pub fn advance(&self, ms: f64) {
        let deadline = self.inner.borrow().now + ms;
        loop {
            // Take the next due task out of the queue, releasing the borrow
            // before its callback runs so the callback can reach back in.
            let mut task = {
                let mut inner = self.inner.borrow_mut();
                match inner.next_due(deadline) {
                    Some(index) => {
                        let task = inner.tasks.swap_remove(index);
                        inner.now = inner.now.max(task.due);
                        inner.in_flight = Some(task.id);
                        inner.in_flight_cancelled = false;
                        task
                    }
                    None => {
                        inner.now = deadline;
                        return;
                    }
                }
            };

            let now = self.inner.borrow().now;
            (task.callback)(now);

            let mut inner = self.inner.borrow_mut();
            inner.in_flight = None;
            let cancelled = std::mem::take(&mut inner.in_flight_cancelled);
            if !cancelled {
                let interval = match task.cadence {
                    Cadence::Once => None,
                    Cadence::Repeating(interval) => Some(interval),
                    Cadence::Frame => Some(inner.paint_interval),
                };
                if let Some(interval) = interval {
                    task.due += interval.max(f64::EPSILON);
                    inner.tasks.push(task);
                }
            }
        }
    }

    /// Number of live (queued) tasks
    pub fn task_count(&self) -> usize {
        self.inner.borrow().tasks.len()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> f64 {
        self.inner.borrow().now
    }

    fn schedule_once(&self, delay_ms: f64, task: TaskFn) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let due = inner.now + delay_ms.max(0.0);
        inner.push(due, Cadence::Once, task)
    }

    fn schedule_repeating(&self, interval_ms: f64, task: TaskFn) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let due = inner.now + interval_ms.max(f64::EPSILON);
        inner.push(due, Cadence::Repeating(interval_ms.max(f64::EPSILON)), task)
    }

    fn schedule_frame(&self, task: TaskFn) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let due = inner.now + inner.paint_interval;
        inner.push(due, Cadence::Frame, task)
    }

    fn cancel(&self, id: TaskId) {
        let mut inner = self.inner.borrow_mut();
        if inner.in_flight == Some(id) {
            inner.in_flight_cancelled = true;
        } else if let Some(index) = inner.tasks.iter().position(|t| t.id == id) {
            inner.tasks.swap_remove(index);
        }
    }
}
