//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Sweep: Deletes expired cache entries in bounded pages

mod sweeper;

pub use sweeper::{spawn_sweep_task, SweepReport, Sweeper, SWEEP_BATCH_SIZE};
