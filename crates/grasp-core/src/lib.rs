//! Core of the grasp gesture recognition coordinator.
//!
//! Turns low-level pointer and touch events into discrete gestures while
//! arbitrating between candidates that observe the same input points. The
//! crate provides the gesture base (state machine, point tracking, event
//! dispatch), the relationship engine, the grab abstraction and the thin
//! interfaces the host drives it through. Concrete recognizers live in
//! `grasp-recognizers`.

pub mod actor;
pub mod device;
pub mod events;
pub mod geometry;
pub mod gesture;
pub mod grab;
pub mod host;
pub mod main_loop;
pub mod point;
pub mod registry;

pub use actor::Actor;
pub use device::{DeviceType, DeviceTypeSet, InputDevice};
pub use events::{
    CrossingInfo, CrossingMode, Event, EventFlags, EventKind, EventPropagation, ModifierState,
    TouchSequence,
};
pub use geometry::{Point, Rect, Size, Vector2};
pub use gesture::{Gesture, GestureState, ObserverId, Recognizer};
pub use grab::{ActorGrab, EventSink, Grab};
pub use host::GestureHost;
pub use main_loop::{
    cancel_timer, clear_timer_driver, install_timer_driver, schedule_timer, TimerDriver, TimerId,
};
pub use point::GesturePoint;
