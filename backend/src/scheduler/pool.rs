//! Fixed worker pool draining the VIP task queue.

use crate::scheduler::queue::{Popped, TaskQueue, Thunk};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Fixed-size pool of worker threads executing queue items in priority
/// order. Workers loop pop-then-execute until the queue hands them the
/// shutdown sentinel; teardown broadcasts shutdown and joins every
/// worker, so pending items are drained before the pool goes away.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(queue: Arc<TaskQueue>, num_workers: usize) -> Self {
        let workers = (0..num_workers)
            .map(|index| {
                let queue = Arc::clone(&queue);
                thread::Builder::new()
                    .name(format!("vip-worker-{index}"))
                    .spawn(move || worker_loop(&queue))
                    .expect("failed to spawn vip worker")
            })
            .collect();
        Self { queue, workers }
    }

    /// Submit a work item with the given priority (smaller runs first).
    pub fn submit(&self, priority: i32, job: Thunk) {
        self.queue.push(priority, job);
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.queue.shutdown();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("vip worker panicked");
            }
        }
    }
}

fn worker_loop(queue: &TaskQueue) {
    loop {
        match queue.pop() {
            Popped::Work(job) => job(),
            Popped::Shutdown => break,
        }
    }
}
