//! Click (tap) recognition.
//!
//! Requires exactly one point, cancels when it strays past the cancel
//! threshold and completes on release. Supports N consecutive clicks with an
//! inter-click timeout, for double- and triple-click bindings. The `pressed`
//! flag tracks whether the attached actor should render a pressed state; it
//! follows press/release and crossing events.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use grasp_core::events::{CrossingInfo, EventFlags, EventKind, ModifierState};
use grasp_core::geometry::Point;
use grasp_core::gesture::{Gesture, GestureState, Recognizer};
use grasp_core::main_loop::{cancel_timer, schedule_timer, TimerId};
use grasp_core::point::GesturePoint;

use crate::constants::{DEFAULT_CANCEL_THRESHOLD_PX, DEFAULT_NEXT_CLICK_TIMEOUT_MS};

/// Construction-time options for [`ClickGesture`].
#[derive(Clone, Debug)]
pub struct ClickConfig {
    /// Movement past this many pixels cancels the gesture; `None` disables
    /// the check.
    pub cancel_threshold: Option<f32>,
    pub n_clicks_required: u32,
    pub next_click_timeout_ms: u64,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            cancel_threshold: Some(DEFAULT_CANCEL_THRESHOLD_PX),
            n_clicks_required: 1,
            next_click_timeout_ms: DEFAULT_NEXT_CLICK_TIMEOUT_MS,
        }
    }
}

impl ClickConfig {
    pub fn cancel_threshold(mut self, threshold: Option<f32>) -> Self {
        self.cancel_threshold = threshold;
        self
    }

    pub fn n_clicks_required(mut self, n: u32) -> Self {
        self.n_clicks_required = n.max(1);
        self
    }

    pub fn next_click_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.next_click_timeout_ms = timeout_ms;
        self
    }
}

type ClickedCallback = Rc<dyn Fn(&ClickGesture)>;
type PressedCallback = Rc<dyn Fn(&ClickGesture, bool)>;

pub struct ClickGesture {
    gesture: Rc<Gesture>,
    weak_self: Weak<ClickGesture>,

    cancel_threshold: Cell<Option<f32>>,
    n_clicks_required: Cell<u32>,
    next_click_timeout_ms: Cell<u64>,

    pressed: Cell<bool>,
    n_clicks_happened: Cell<u32>,
    next_click_timeout: Cell<TimerId>,

    is_touch: Cell<bool>,
    press_coords: Cell<Point>,
    press_button: Cell<u32>,
    modifier_state: Cell<ModifierState>,

    clicked_callbacks: RefCell<Vec<ClickedCallback>>,
    pressed_callbacks: RefCell<Vec<PressedCallback>>,
}

impl ClickGesture {
    pub fn new() -> Rc<Self> {
        Self::with_config(ClickConfig::default())
    }

    pub fn with_config(config: ClickConfig) -> Rc<Self> {
        let gesture = Gesture::new();

        let click = Rc::new_cyclic(|weak: &Weak<ClickGesture>| ClickGesture {
            gesture: Rc::clone(&gesture),
            weak_self: weak.clone(),
            cancel_threshold: Cell::new(config.cancel_threshold),
            n_clicks_required: Cell::new(config.n_clicks_required.max(1)),
            next_click_timeout_ms: Cell::new(config.next_click_timeout_ms),
            pressed: Cell::new(false),
            n_clicks_happened: Cell::new(0),
            next_click_timeout: Cell::new(TimerId::INERT),
            is_touch: Cell::new(false),
            press_coords: Cell::new(Point::ZERO),
            press_button: Cell::new(0),
            modifier_state: Cell::new(ModifierState::NONE),
            clicked_callbacks: RefCell::new(Vec::new()),
            pressed_callbacks: RefCell::new(Vec::new()),
        });

        gesture.set_recognizer(Rc::downgrade(&(Rc::clone(&click) as Rc<dyn Recognizer>)));
        click
    }

    /// The base gesture: attach it to an actor, observe its state, wire
    /// relationships through it.
    pub fn gesture(&self) -> &Rc<Gesture> {
        &self.gesture
    }

    pub fn pressed(&self) -> bool {
        self.pressed.get()
    }

    pub fn button(&self) -> u32 {
        self.press_button.get()
    }

    pub fn modifier_state(&self) -> ModifierState {
        self.modifier_state.get()
    }

    /// Where the (first) click pressed, for use inside a clicked callback.
    pub fn coords(&self) -> Point {
        self.press_coords.get()
    }

    pub fn cancel_threshold(&self) -> Option<f32> {
        self.cancel_threshold.get()
    }

    pub fn set_cancel_threshold(&self, threshold: Option<f32>) {
        self.cancel_threshold.set(threshold);
    }

    pub fn n_clicks_required(&self) -> u32 {
        self.n_clicks_required.get()
    }

    pub fn set_n_clicks_required(&self, n: u32) {
        self.n_clicks_required.set(n.max(1));
    }

    pub fn on_clicked(&self, callback: impl Fn(&ClickGesture) + 'static) {
        self.clicked_callbacks.borrow_mut().push(Rc::new(callback));
    }

    pub fn on_pressed_changed(&self, callback: impl Fn(&ClickGesture, bool) + 'static) {
        self.pressed_callbacks.borrow_mut().push(Rc::new(callback));
    }

    fn set_pressed(&self, pressed: bool) {
        if self.pressed.get() == pressed {
            return;
        }
        self.pressed.set(pressed);

        let callbacks: Vec<PressedCallback> =
            self.pressed_callbacks.borrow().iter().map(Rc::clone).collect();
        for callback in callbacks {
            callback(self, pressed);
        }
    }

    fn emit_clicked(&self) {
        let callbacks: Vec<ClickedCallback> =
            self.clicked_callbacks.borrow().iter().map(Rc::clone).collect();
        for callback in callbacks {
            callback(self);
        }
    }

    fn cancel_pending_timeout(&self) {
        let id = self.next_click_timeout.replace(TimerId::INERT);
        cancel_timer(id);
    }

    fn schedule_next_click_timeout(&self) {
        let weak = self.weak_self.clone();
        let id = schedule_timer(
            self.next_click_timeout_ms.get(),
            Box::new(move || {
                if let Some(click) = weak.upgrade() {
                    click.next_click_timeout.set(TimerId::INERT);
                    click.gesture.set_state(GestureState::Cancelled);
                    click.set_pressed(false);
                }
            }),
        );
        self.next_click_timeout.set(id);
    }
}

impl Recognizer for ClickGesture {
    fn points_began(&self, gesture: &Rc<Gesture>, points: &[GesturePoint]) {
        let point = &points[0];

        if gesture.n_points() != 1 {
            gesture.set_state(GestureState::Cancelled);
            return;
        }

        self.cancel_pending_timeout();

        let is_touch = point.latest_event.kind == EventKind::TouchBegin;
        let press_button = if is_touch { 0 } else { point.latest_event.button };
        let modifier_state = point.latest_event.modifiers;

        if self.n_clicks_happened.get() == 0 {
            self.is_touch.set(is_touch);
            self.press_button.set(press_button);
            self.modifier_state.set(modifier_state);
            self.press_coords.set(point.begin_coords);
        } else {
            let distance = self.press_coords.get().distance(point.begin_coords);
            let too_far = self
                .cancel_threshold
                .get()
                .is_some_and(|threshold| distance > threshold);

            if self.is_touch.get() != is_touch
                || self.press_button.get() != press_button
                || too_far
            {
                self.set_pressed(false);
                gesture.set_state(GestureState::Cancelled);
                return;
            }
        }

        if self.n_clicks_required.get() > 1 {
            self.schedule_next_click_timeout();
        }

        self.set_pressed(true);
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

    fn points_ended(&self, gesture: &Rc<Gesture>, points: &[GesturePoint]) {
        let point = &points[0];

        self.n_clicks_happened.set(self.n_clicks_happened.get() + 1);

        if self.n_clicks_happened.get() == self.n_clicks_required.get() {
            self.cancel_pending_timeout();

            // Modifier keys are expected to be held throughout the whole
            // click; on mismatch between press and release, report none.
            let release_state = point.latest_event.modifiers.without_buttons();
            if release_state != self.modifier_state.get().without_buttons() {
                self.modifier_state.set(ModifierState::NONE);
            }

            if self.pressed.get() {
                gesture.set_state(GestureState::Completed);
            } else {
                gesture.set_state(GestureState::Cancelled);
            }
        }

        self.set_pressed(false);
    }

    fn points_cancelled(&self, gesture: &Rc<Gesture>, _points: &[GesturePoint]) {
        gesture.set_state(GestureState::Cancelled);
    }

    fn crossing_event(
        &self,
        gesture: &Rc<Gesture>,
        _point: &GesturePoint,
        kind: EventKind,
        _time_ms: u64,
        _flags: EventFlags,
        crossing: &CrossingInfo,
    ) {
        if let Some(actor) = gesture.actor() {
            if Rc::ptr_eq(&actor, &crossing.source) {
                self.set_pressed(kind == EventKind::Enter);
            }
        }
    }

    fn state_changed(&self, _gesture: &Rc<Gesture>, _old: GestureState, new: GestureState) {
        if new == GestureState::Completed {
            self.emit_clicked();
        }

        if matches!(new, GestureState::Completed | GestureState::Cancelled) {
            self.set_pressed(false);
            self.cancel_pending_timeout();

            self.n_clicks_happened.set(0);
            self.press_coords.set(Point::ZERO);
            self.press_button.set(0);
            self.modifier_state.set(ModifierState::NONE);
        }
    }
}
