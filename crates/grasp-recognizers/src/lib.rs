//! Concrete recognizers built on the grasp gesture base.
//!
//! Each recognizer composes a base [`grasp_core::Gesture`], consumes its
//! `points_*` hooks and drives the state machine through `set_state`. Timers
//! go through the ambient driver in `grasp_core::main_loop`; the host (or
//! the test main loop) must install one for click timeouts and long presses
//! to fire.

pub mod click;
pub mod constants;
pub mod long_press;
pub mod pan;

pub use click::{ClickConfig, ClickGesture};
pub use long_press::{LongPressConfig, LongPressGesture};
pub use pan::{PanAxis, PanConfig, PanGesture};
