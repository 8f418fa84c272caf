//! Concurrency primitives shared across the crate.

pub mod rwlock;
pub mod shutdown;

pub use rwlock::{ReadGuard, ReadWriteLock, WriteGuard};
pub use shutdown::ShutdownToken;
