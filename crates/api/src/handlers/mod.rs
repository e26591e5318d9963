//! HTTP handlers, grouped by resource.

pub mod jobs;
pub mod speakers;
pub mod usage;
