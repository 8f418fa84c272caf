//! Blocking priority queue backing the VIP lane.
//!
//! Work items execute in ascending priority order (numerically smaller
//! first). Ties break FIFO by a submission sequence number, so equal
//! priorities run in the order they were submitted. `pop` blocks while
//! the queue is empty and the scheduler is running; once `shutdown` is
//! broadcast, every blocked popper is released with a sentinel instead
//! of an error.

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A unit of deferred work submitted to the VIP lane.
pub type Thunk = Box<dyn FnOnce() + Send + 'static>;

struct WorkItem {
    priority: i32,
    seq: u64,
    job: Thunk,
}

impl PartialEq for WorkItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for WorkItem {}

impl PartialOrd for WorkItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WorkItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: invert so the smallest (priority, seq)
        // pair surfaces first.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Result of a blocking `pop`.
pub enum Popped {
    /// A real work item, ready to execute.
    Work(Thunk),
    /// The queue shut down while empty; the worker should exit.
    Shutdown,
}

struct QueueState {
    heap: BinaryHeap<WorkItem>,
    running: bool,
    next_seq: u64,
}

/// Thread-safe blocking priority queue.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                running: true,
                next_seq: 0,
            }),
            cond: Condvar::new(),
        }
    }

    /// Enqueue a work item and wake one waiting worker.
    pub fn push(&self, priority: i32, job: Thunk) {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(WorkItem { priority, seq, job });
        self.cond.notify_one();
    }

    /// Remove and return the highest-priority item, blocking while the
    /// queue is empty and still running.
    ///
    /// After shutdown, remaining items are still drained in order; only
    /// an empty queue yields the sentinel.
    pub fn pop(&self) -> Popped {
        let mut state = self.state.lock();
        while state.heap.is_empty() && state.running {
            self.cond.wait(&mut state);
        }
        match state.heap.pop() {
            Some(item) => Popped::Work(item.job),
            None => Popped::Shutdown,
        }
    }

    /// Stop accepting blocking waits and release every parked popper.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.running = false;
        self.cond.notify_all();
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
