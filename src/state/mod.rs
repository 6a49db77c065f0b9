//! State owned by the alerter across passes and processes

pub mod cooldown;
pub mod lock;

pub use cooldown::{CooldownGate, StateError};
pub use lock::{FileLock, LockError, LockGuard, MemoryLock, PassLock};
