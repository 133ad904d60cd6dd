//! Headless stage for exercising gestures in tests.
//!
//! Mirrors the delivery discipline of a real host without a windowing
//! backend: picking by coordinates, offering new sequences innermost actor
//! first, negotiating pairwise relationships and honoring their dispatch
//! ordering, then feeding events to every gesture tracking the sequence.
//! Also records sequence claims and grab emissions so tests can assert on
//! them.

use std::cell::RefCell;
use std::rc::Rc;

use grasp_core::actor::Actor;
use grasp_core::device::{DeviceType, InputDevice};
use grasp_core::events::{
    CrossingInfo, CrossingMode, Event, EventKind, ModifierState, TouchSequence,
};
use grasp_core::geometry::{Point, Rect};
use grasp_core::gesture::Gesture;
use grasp_core::grab::EventSink;
use grasp_core::host::GestureHost;

use crate::main_loop::TestMainLoop;

struct SequenceRecord {
    device: Rc<InputDevice>,
    sequence: Option<TouchSequence>,
    gestures: Vec<Rc<Gesture>>,
    n_buttons_pressed: u32,
}

/// A recorded `claim_sequence` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRecord {
    pub device_name: String,
    pub sequence: Option<TouchSequence>,
}

/// A crossing pair recorded through the [`EventSink`] side of the stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossingRecord {
    pub old_actor: Option<String>,
    pub new_actor: Option<String>,
    pub topmost: Option<String>,
    pub bottommost: Option<String>,
    pub mode: CrossingMode,
}

pub struct TestStage {
    root: Rc<Actor>,
    main_loop: Rc<TestMainLoop>,
    pointer: Rc<InputDevice>,
    touchscreen: Rc<InputDevice>,
    sequences: RefCell<Vec<SequenceRecord>>,
    claims: RefCell<Vec<ClaimRecord>>,
    crossings: RefCell<Vec<CrossingRecord>>,
    reemitted: RefCell<Vec<(EventKind, String)>>,
}

impl TestStage {
    pub fn new() -> Rc<Self> {
        let main_loop = TestMainLoop::new();
        main_loop.install();

        let root = Actor::new("stage");
        root.set_rect(Rect::new(0.0, 0.0, 640.0, 480.0));
        root.set_reactive(true);

        Rc::new(Self {
            root,
            main_loop,
            pointer: InputDevice::new(DeviceType::Pointer, "test-pointer"),
            touchscreen: InputDevice::new(DeviceType::Touchscreen, "test-touchscreen"),
            sequences: RefCell::new(Vec::new()),
            claims: RefCell::new(Vec::new()),
            crossings: RefCell::new(Vec::new()),
            reemitted: RefCell::new(Vec::new()),
        })
    }

    pub fn root(&self) -> &Rc<Actor> {
        &self.root
    }

    pub fn main_loop(&self) -> &Rc<TestMainLoop> {
        &self.main_loop
    }

    pub fn pointer(&self) -> &Rc<InputDevice> {
        &self.pointer
    }

    /// Adds a reactive child actor with the given geometry.
    pub fn add_actor(&self, name: &str, rect: Rect) -> Rc<Actor> {
        let actor = Actor::new(name);
        actor.set_rect(rect);
        actor.set_reactive(true);
        self.root.add_child(&actor);
        actor
    }

    /// Attaches a gesture to an actor and points it at this stage as its
    /// host.
    pub fn add_gesture(self: &Rc<Self>, actor: &Rc<Actor>, gesture: &Rc<Gesture>) {
        let host: Rc<dyn GestureHost> = Rc::clone(self) as Rc<dyn GestureHost>;
        gesture.set_host(&host);
        actor.add_gesture(gesture);
    }

    pub fn remove_gesture(&self, actor: &Rc<Actor>, gesture: &Rc<Gesture>) {
        actor.remove_gesture(gesture);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.main_loop.advance(delta_ms);
    }

    pub fn now_ms(&self) -> u64 {
        self.main_loop.now_ms()
    }

    pub fn claims(&self) -> Vec<ClaimRecord> {
        self.claims.borrow().clone()
    }

    pub fn crossings(&self) -> Vec<CrossingRecord> {
        self.crossings.borrow().clone()
    }

    pub fn reemitted(&self) -> Vec<(EventKind, String)> {
        self.reemitted.borrow().clone()
    }

    // ------------------------------------------------------------------
    // Event synthesis
    // ------------------------------------------------------------------

    pub fn press(self: &Rc<Self>, x: f32, y: f32) {
        self.press_button(x, y, 1, ModifierState::NONE);
    }

    pub fn press_button(self: &Rc<Self>, x: f32, y: f32, button: u32, modifiers: ModifierState) {
        let event = Event::new(
            EventKind::ButtonPress,
            Rc::clone(&self.pointer),
            Point::new(x, y),
            self.now_ms(),
        )
        .with_button(button)
        .with_modifiers(modifiers);
        self.deliver(&event);
    }

    pub fn motion(self: &Rc<Self>, x: f32, y: f32) {
        let event = Event::new(
            EventKind::Motion,
            Rc::clone(&self.pointer),
            Point::new(x, y),
            self.now_ms(),
        );
        self.deliver(&event);
    }

    pub fn release(self: &Rc<Self>, x: f32, y: f32) {
        self.release_button(x, y, 1, ModifierState::NONE);
    }

    pub fn release_button(self: &Rc<Self>, x: f32, y: f32, button: u32, modifiers: ModifierState) {
        let event = Event::new(
            EventKind::ButtonRelease,
            Rc::clone(&self.pointer),
            Point::new(x, y),
            self.now_ms(),
        )
        .with_button(button)
        .with_modifiers(modifiers);
        self.deliver(&event);
    }

    pub fn touch_begin(self: &Rc<Self>, slot: u64, x: f32, y: f32) {
        self.deliver(&self.touch_event(EventKind::TouchBegin, slot, x, y));
    }

    pub fn touch_update(self: &Rc<Self>, slot: u64, x: f32, y: f32) {
        self.deliver(&self.touch_event(EventKind::TouchUpdate, slot, x, y));
    }

    pub fn touch_end(self: &Rc<Self>, slot: u64, x: f32, y: f32) {
        self.deliver(&self.touch_event(EventKind::TouchEnd, slot, x, y));
    }

    pub fn touch_cancel(self: &Rc<Self>, slot: u64, x: f32, y: f32) {
        self.deliver(&self.touch_event(EventKind::TouchCancel, slot, x, y));
    }

    fn touch_event(&self, kind: EventKind, slot: u64, x: f32, y: f32) -> Event {
        Event::new(
            kind,
            Rc::clone(&self.touchscreen),
            Point::new(x, y),
            self.now_ms(),
        )
        .with_sequence(TouchSequence(slot + 1))
    }

    /// Synthesizes an enter/leave event for the pointer sequence.
    pub fn crossing(self: &Rc<Self>, kind: EventKind, source: &Rc<Actor>, related: Option<&Rc<Actor>>) {
        let event = Event::new(
            kind,
            Rc::clone(&self.pointer),
            Point::ZERO,
            self.now_ms(),
        )
        .with_crossing(CrossingInfo {
            source: Rc::clone(source),
            related: related.cloned(),
            mode: CrossingMode::Normal,
        });
        self.deliver(&event);
    }

    /// Host-side cancellation of a touch sequence, bypassing normal event
    /// flow (what a compositor does when it steals a sequence).
    pub fn cancel_touch_sequence(&self, slot: u64) {
        let sequence = TouchSequence(slot + 1);
        let record_index = self.find_record(&self.touchscreen, Some(sequence));

        if let Some(index) = record_index {
            let gestures = self.sequences.borrow()[index].gestures.clone();
            for gesture in &gestures {
                gesture.sequences_cancelled(&self.touchscreen, &[sequence]);
            }
            self.sequences.borrow_mut().remove(index);
        }
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    fn find_record(&self, device: &Rc<InputDevice>, sequence: Option<TouchSequence>) -> Option<usize> {
        self.sequences
            .borrow()
            .iter()
            .position(|r| Rc::ptr_eq(&r.device, device) && r.sequence == sequence)
    }

    fn deliver(self: &Rc<Self>, event: &Event) {
        let record_index = self.find_record(&event.device, event.sequence);

        match event.kind {
            EventKind::ButtonPress | EventKind::TouchBegin => match record_index {
                Some(index) => {
                    if event.kind == EventKind::ButtonPress {
                        self.sequences.borrow_mut()[index].n_buttons_pressed += 1;
                    }
                    self.dispatch(index, event);
                }
                None => self.begin_sequence(event),
            },

            EventKind::ButtonRelease => {
                if let Some(index) = record_index {
                    let remaining = {
                        let mut sequences = self.sequences.borrow_mut();
                        let record = &mut sequences[index];
                        record.n_buttons_pressed = record.n_buttons_pressed.saturating_sub(1);
                        record.n_buttons_pressed
                    };

                    self.dispatch(index, event);

                    if remaining == 0 {
                        self.sequences.borrow_mut().remove(index);
                    }
                }
            }

            EventKind::TouchEnd | EventKind::TouchCancel => {
                if let Some(index) = record_index {
                    self.dispatch(index, event);
                    self.sequences.borrow_mut().remove(index);
                }
            }

            _ => {
                if let Some(index) = record_index {
                    self.dispatch(index, event);
                }
            }
        }
    }

    /// First event of a new sequence: pick, offer along the bubble chain,
    /// negotiate relationships, sort by their verdicts, dispatch.
    fn begin_sequence(self: &Rc<Self>, event: &Event) {
        let Some(picked) = self.root.pick(event.coords.x, event.coords.y) else {
            return;
        };

        let mut accepted: Vec<Rc<Gesture>> = Vec::new();
        for actor in picked.ancestor_chain() {
            for gesture in actor.gestures() {
                if gesture.should_handle_sequence(event) {
                    accepted.push(gesture);
                }
            }
        }

        // Pairwise negotiation; a gesture that cancels a peer on
        // recognizing but is not cancelled by it is consulted first.
        let n = accepted.len();
        let mut verdicts = vec![vec![0i32; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let verdict = accepted[i].setup_sequence_relationship(
                    &accepted[j],
                    &event.device,
                    event.sequence,
                );
                verdicts[i][j] = verdict;
                verdicts[j][i] = -verdict;
            }
        }

        let mut order: Vec<usize> = (0..n).collect();
        // Stable insertion honoring the pairwise verdicts: each gesture is
        // placed before the first earlier one that must be consulted after
        // it.
        for i in 1..n {
            let current = order[i];
            let position = (0..i)
                .find(|&j| verdicts[order[j]][current] > 0)
                .unwrap_or(i);
            order.remove(i);
            order.insert(position, current);
        }

        let gestures: Vec<Rc<Gesture>> = order.into_iter().map(|i| Rc::clone(&accepted[i])).collect();

        log::debug!(
            "sequence {:?} on {} accepted by {} gestures",
            event.sequence,
            event.device.name(),
            gestures.len()
        );

        self.sequences.borrow_mut().push(SequenceRecord {
            device: Rc::clone(&event.device),
            sequence: event.sequence,
            gestures,
            n_buttons_pressed: u32::from(event.kind == EventKind::ButtonPress),
        });

        let index = self.sequences.borrow().len() - 1;
        self.dispatch(index, event);
    }

    fn dispatch(&self, record_index: usize, event: &Event) {
        let gestures = self.sequences.borrow()[record_index].gestures.clone();
        for gesture in gestures {
            gesture.handle_event(event);
        }
    }
}

impl GestureHost for TestStage {
    fn claim_sequence(&self, device: &Rc<InputDevice>, sequence: Option<TouchSequence>) {
        self.claims.borrow_mut().push(ClaimRecord {
            device_name: device.name().to_string(),
            sequence,
        });
    }
}

impl EventSink for TestStage {
    fn emit_crossing(
        &self,
        _device: &Rc<InputDevice>,
        _sequence: Option<TouchSequence>,
        old_actor: Option<&Rc<Actor>>,
        new_actor: Option<&Rc<Actor>>,
        topmost: Option<&Rc<Actor>>,
        bottommost: Option<&Rc<Actor>>,
        mode: CrossingMode,
    ) {
        self.crossings.borrow_mut().push(CrossingRecord {
            old_actor: old_actor.map(|a| a.name().to_string()),
            new_actor: new_actor.map(|a| a.name().to_string()),
            topmost: topmost.map(|a| a.name().to_string()),
            bottommost: bottommost.map(|a| a.name().to_string()),
            mode,
        });
    }

    fn emit_event(&self, event: &Event, target: &Rc<Actor>) {
        self.reemitted
            .borrow_mut()
            .push((event.kind, target.name().to_string()));
    }
}
