//! Headless test harness for the grasp gesture coordinator.
//!
//! [`TestStage`] drives gestures through the same delivery discipline a real
//! host uses (picking, sequence offers, relationship-ordered dispatch), and
//! [`TestMainLoop`] gives tests a deterministic clock for the recognizers'
//! timers. No windowing backend is required.

pub mod main_loop;
pub mod stage;

pub use main_loop::TestMainLoop;
pub use stage::{ClaimRecord, CrossingRecord, TestStage};

/// Opt-in logging for debugging a failing test:
/// `RUST_LOG=debug cargo test -- --nocapture`.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
#[path = "tests/gesture_tests.rs"]
mod gesture_tests;

#[cfg(test)]
#[path = "tests/relationship_tests.rs"]
mod relationship_tests;

#[cfg(test)]
#[path = "tests/recognizer_tests.rs"]
mod recognizer_tests;

#[cfg(test)]
#[path = "tests/grab_tests.rs"]
mod grab_tests;
