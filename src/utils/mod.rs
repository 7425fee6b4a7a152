//! Utility helpers

pub mod logger;
pub mod timer;

pub use timer::Timer;
