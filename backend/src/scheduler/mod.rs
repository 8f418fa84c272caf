//! Priority scheduler: the VIP fast lane.
//!
//! Commands tagged `VIP=<priority>` are not executed on the submitting
//! terminal's thread. They are wrapped as work items and handed to a
//! blocking priority queue drained by a fixed pool of workers, giving
//! them priority-ordered, pool-bounded execution decoupled from
//! terminal throughput.

pub mod pool;
pub mod queue;

pub use pool::WorkerPool;
pub use queue::{Popped, TaskQueue, Thunk};
