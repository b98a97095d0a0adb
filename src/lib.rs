//! padecho: gamepad input capture and timed replay on a virtual controller
//!
//! ```text
//! capture:  gamepad ─► controller ─► input::Recording ─► persistence (JSON)
//! replay:   persistence ─► replay::Replayer ─► mapping::PadMapper ─► VirtualPad
//! ```
//!
//! Both paths resolve raw channel ids through a [`scheme::Scheme`].

pub mod config;
pub mod controller;
pub mod input;
pub mod mapping;
pub mod persistence;
pub mod replay;
pub mod scheme;
