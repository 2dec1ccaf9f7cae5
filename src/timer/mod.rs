//! Timer engine module
//!
//! The state machine that owns session accounting.

pub mod engine;

pub use engine::TimerEngine;
