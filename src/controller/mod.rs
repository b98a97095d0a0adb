//! Controller subsystem: physical gamepad input and the capture engine
//!
//! 1. [`source`] - Input source trait and the channel-fed source
//! 2. [`event_collector`] - gilrs backed input source
//! 3. [`axis_filter`] - Dead zone and per-role debounce
//! 4. [`capture`] - Capture engine and its session state machine
//! 5. [`probe`] - Raw input inspection
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Collector ──► button loop ─┐
//!                 │                      ├──► RecordingSink ──► persistence
//!                 └─► AxisState ─► axis loop (filtered)
//! ```

pub mod axis_filter;
pub mod capture;
pub mod event_collector;
pub mod probe;
pub mod source;

pub use capture::{CaptureEngine, CaptureError, CaptureOutcome};
pub use event_collector::GilrsCollector;
pub use source::{AxisState, ButtonEdge, DeviceInfo, InputSource, SourceError};
