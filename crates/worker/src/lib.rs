//! Worker pool, background schedulers, and the job handlers.
//!
//! The pool runs a fixed number of polling slots per queue. Each slot
//! claims one broker message at a time, runs the registered handler
//! under soft/hard time limits, and resolves the job through the store's
//! compare-and-set transition.

pub mod config;
pub mod handlers;
pub mod pool;
pub mod reaper;
pub mod runner;
pub mod scheduler;
