//! Replay scheduler
//!
//! Strictly sequential playback on the calling thread. Each deadline is hit
//! with a two-phase wait (coarse sleep, then spin) and each event becomes one
//! committed pad report.

pub mod scheduler;
pub mod timing;

pub use scheduler::{ReplayError, ReplayReport, Replayer};
pub use timing::wait_until;
