//! Long-press recognition.
//!
//! Starts recognizing once the press has been held for the configured
//! duration, with optional distance cancellation. The duration timer runs on
//! the ambient main loop; its firing is a fresh top-level call into the
//! state machine.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use grasp_core::events::{EventKind, ModifierState};
use grasp_core::gesture::{Gesture, GestureState, Recognizer};
use grasp_core::main_loop::{cancel_timer, schedule_timer, TimerId};
use grasp_core::point::GesturePoint;

use crate::constants::{
    DEFAULT_CANCEL_THRESHOLD_PX, DEFAULT_LONG_PRESS_DURATION_MS, PRIMARY_BUTTON,
};

#[derive(Clone, Debug)]
pub struct LongPressConfig {
    /// Movement past this many pixels cancels the gesture; `None` disables
    /// the check.
    pub cancel_threshold: Option<f32>,
    /// How long the press must be held. A zero duration recognizes on the
    /// press itself.
    pub long_press_duration_ms: u64,
}

impl Default for LongPressConfig {
    fn default() -> Self {
        Self {
            cancel_threshold: Some(DEFAULT_CANCEL_THRESHOLD_PX),
            long_press_duration_ms: DEFAULT_LONG_PRESS_DURATION_MS,
        }
    }
}

impl LongPressConfig {
    pub fn cancel_threshold(mut self, threshold: Option<f32>) -> Self {
        self.cancel_threshold = threshold;
        self
    }

    pub fn long_press_duration_ms(mut self, duration_ms: u64) -> Self {
        self.long_press_duration_ms = duration_ms;
        self
    }
}

type Callback = Rc<dyn Fn(&LongPressGesture)>;

pub struct LongPressGesture {
    gesture: Rc<Gesture>,
    weak_self: Weak<LongPressGesture>,

    cancel_threshold: Cell<Option<f32>>,
    long_press_duration_ms: Cell<u64>,
    long_press_timeout: Cell<TimerId>,

    press_button: Cell<u32>,
    modifier_state: Cell<ModifierState>,

    begin_callbacks: RefCell<Vec<Callback>>,
    end_callbacks: RefCell<Vec<Callback>>,
    cancel_callbacks: RefCell<Vec<Callback>>,
}

impl LongPressGesture {
    pub fn new() -> Rc<Self> {
        Self::with_config(LongPressConfig::default())
    }

    pub fn with_config(config: LongPressConfig) -> Rc<Self> {
        let gesture = Gesture::new();

        let long_press = Rc::new_cyclic(|weak: &Weak<LongPressGesture>| LongPressGesture {
            gesture: Rc::clone(&gesture),
            weak_self: weak.clone(),
            cancel_threshold: Cell::new(config.cancel_threshold),
            long_press_duration_ms: Cell::new(config.long_press_duration_ms),
            long_press_timeout: Cell::new(TimerId::INERT),
            press_button: Cell::new(0),
            modifier_state: Cell::new(ModifierState::NONE),
            begin_callbacks: RefCell::new(Vec::new()),
            end_callbacks: RefCell::new(Vec::new()),
            cancel_callbacks: RefCell::new(Vec::new()),
        });

        gesture.set_recognizer(Rc::downgrade(&(Rc::clone(&long_press) as Rc<dyn Recognizer>)));
        long_press
    }

    pub fn gesture(&self) -> &Rc<Gesture> {
        &self.gesture
    }

    pub fn button(&self) -> u32 {
        self.press_button.get()
    }

    pub fn modifier_state(&self) -> ModifierState {
        self.modifier_state.get()
    }

    pub fn cancel_threshold(&self) -> Option<f32> {
        self.cancel_threshold.get()
    }

    pub fn set_cancel_threshold(&self, threshold: Option<f32>) {
        self.cancel_threshold.set(threshold);
    }

    pub fn long_press_duration_ms(&self) -> u64 {
        self.long_press_duration_ms.get()
    }

    pub fn set_long_press_duration_ms(&self, duration_ms: u64) {
        self.long_press_duration_ms.set(duration_ms);
    }

    /// The press has been held long enough; the gesture is recognizing.
    pub fn on_long_press_begin(&self, callback: impl Fn(&LongPressGesture) + 'static) {
        self.begin_callbacks.borrow_mut().push(Rc::new(callback));
    }

    /// The point was released while recognizing; the long press completed.
    pub fn on_long_press_end(&self, callback: impl Fn(&LongPressGesture) + 'static) {
        self.end_callbacks.borrow_mut().push(Rc::new(callback));
    }

    /// The gesture was cancelled after it had begun recognizing.
    pub fn on_long_press_cancel(&self, callback: impl Fn(&LongPressGesture) + 'static) {
        self.cancel_callbacks.borrow_mut().push(Rc::new(callback));
    }

    fn emit(&self, callbacks: &RefCell<Vec<Callback>>) {
        let callbacks: Vec<Callback> = callbacks.borrow().iter().map(Rc::clone).collect();
        for callback in callbacks {
            callback(self);
        }
    }

    fn cancel_pending_timeout(&self) {
        let id = self.long_press_timeout.replace(TimerId::INERT);
        cancel_timer(id);
    }
}

impl Recognizer for LongPressGesture {
    fn points_began(&self, gesture: &Rc<Gesture>, points: &[GesturePoint]) {
        let point = &points[0];

        if gesture.n_points() > 1 {
            gesture.set_state(GestureState::Cancelled);
            return;
        }

        // Touch points report the primary button.
        self.press_button
            .set(if point.latest_event.kind == EventKind::ButtonPress {
                point.latest_event.button
            } else {
                PRIMARY_BUTTON
            });
        self.modifier_state.set(point.latest_event.modifiers);

        if self.long_press_duration_ms.get() == 0 {
            gesture.set_state(GestureState::Recognizing);
        } else {
            let weak = self.weak_self.clone();
            let id = schedule_timer(
                self.long_press_duration_ms.get(),
                Box::new(move || {
                    if let Some(long_press) = weak.upgrade() {
                        long_press.long_press_timeout.set(TimerId::INERT);
                        long_press.gesture.set_state(GestureState::Recognizing);
                    }
                }),
            );
            self.long_press_timeout.set(id);
        }
    }

    fn points_moved(&self, gesture: &Rc<Gesture>, points: &[GesturePoint]) {
        let point = &points[0];
        let distance = point.begin_coords.distance(point.move_coords);

        if self
            .cancel_threshold
            .get()
            .is_some_and(|threshold| distance > threshold)
        {
            gesture.set_state(GestureState::Cancelled);
        }
    }

    fn points_ended(&self, gesture: &Rc<Gesture>, _points: &[GesturePoint]) {
        if gesture.state() == GestureState::Recognizing {
            gesture.set_state(GestureState::Completed);
        } else {
            gesture.set_state(GestureState::Cancelled);
        }
    }

    fn points_cancelled(&self, gesture: &Rc<Gesture>, _points: &[GesturePoint]) {
        gesture.set_state(GestureState::Cancelled);
    }

    fn state_changed(&self, _gesture: &Rc<Gesture>, old: GestureState, new: GestureState) {
        if new == GestureState::Recognizing && old != GestureState::Recognizing {
            self.emit(&self.begin_callbacks);
        }

        if new == GestureState::Completed {
            self.emit(&self.end_callbacks);
        }

        if old == GestureState::Recognizing && new == GestureState::Cancelled {
            self.emit(&self.cancel_callbacks);
        }

        if matches!(new, GestureState::Completed | GestureState::Cancelled) {
            self.cancel_pending_timeout();
            self.press_button.set(0);
            self.modifier_state.set(ModifierState::NONE);
        }
    }
}
