//! The gesture base: state machine, point tracking and the relationship
//! engine.
//!
//! A [`Gesture`] is a stateful recognizer observing zero or more input
//! points. Concrete recognizers compose a base gesture and attach a
//! [`Recognizer`] implementation whose hooks consume the point stream and
//! drive the state machine through [`Gesture::set_state`].
//!
//! Five states make up the machine. A gesture starts in WAITING, moves to
//! POSSIBLE when its first point is accepted, and must then always end up in
//! COMPLETED or CANCELLED; once every remaining point has ended it
//! automatically returns to WAITING. The additional observable value
//! RECOGNIZE_PENDING appears when a recognizer asked for RECOGNIZING while
//! at least one failure requirement (see [`Gesture::require_failure_of`]) is
//! still undecided.
//!
//! When several gestures observe the same points, the first one to move to
//! RECOGNIZING wins and the others are cancelled, unless overridden through
//! [`Gesture::can_not_cancel`] or the influence hooks. Unrelated gestures
//! are subject to a global rule: only a single gesture may recognize at a
//! time, unless allowed through [`Gesture::recognize_independently_from`]
//! or the start hooks.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::actor::Actor;
use crate::device::{DeviceType, DeviceTypeSet, InputDevice};
use crate::events::{CrossingInfo, Event, EventFlags, EventKind, EventPropagation, TouchSequence};
use crate::host::GestureHost;
use crate::point::{GesturePoint, PointData};
use crate::registry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureState {
    Waiting,
    Possible,
    /// RECOGNIZING was requested but a failure requirement is outstanding.
    /// Resolves to RECOGNIZING when every required peer cancels, or to
    /// CANCELLED when one of them recognizes.
    RecognizePending,
    Recognizing,
    Completed,
    Cancelled,
}

impl GestureState {
    fn is_terminal(self) -> bool {
        matches!(self, GestureState::Completed | GestureState::Cancelled)
    }
}

/// Optional hooks implemented by concrete recognizers.
///
/// The base invokes these synchronously during event dispatch and state
/// transitions. Implementations use interior mutability and may re-enter the
/// base through [`Gesture::set_state`], but must not re-enter event dispatch
/// for the same gesture.
pub trait Recognizer {
    fn points_began(&self, _gesture: &Rc<Gesture>, _points: &[GesturePoint]) {}
    fn points_moved(&self, _gesture: &Rc<Gesture>, _points: &[GesturePoint]) {}
    fn points_ended(&self, _gesture: &Rc<Gesture>, _points: &[GesturePoint]) {}
    fn points_cancelled(&self, _gesture: &Rc<Gesture>, _points: &[GesturePoint]) {}

    fn state_changed(&self, _gesture: &Rc<Gesture>, _old: GestureState, _new: GestureState) {}

    /// Enter/leave events for a known point. Coordinate buckets are not
    /// updated for these.
    fn crossing_event(
        &self,
        _gesture: &Rc<Gesture>,
        _point: &GesturePoint,
        _kind: EventKind,
        _time_ms: u64,
        _flags: EventFlags,
        _crossing: &CrossingInfo,
    ) {
    }

    /// Last chance for the implementation to veto entering POSSIBLE or
    /// RECOGNIZING.
    fn may_recognize(&self, _gesture: &Rc<Gesture>) -> bool {
        true
    }

    /// Negotiates whether `gesture` recognizing should cancel `other`.
    /// `cancel_on_recognizing` arrives with the current verdict (default
    /// `true`).
    fn should_influence(
        &self,
        _gesture: &Rc<Gesture>,
        _other: &Rc<Gesture>,
        _cancel_on_recognizing: &mut bool,
    ) {
    }

    /// Mirror of [`Recognizer::should_influence`], consulted on the gesture
    /// that would be cancelled.
    fn should_be_influenced_by(
        &self,
        _gesture: &Rc<Gesture>,
        _other: &Rc<Gesture>,
        _cancelled_on_recognizing: &mut bool,
    ) {
    }

    /// May `gesture` start while the unrelated `other` is recognizing?
    /// Consulted on the gesture that wants to start.
    fn should_start_while(
        &self,
        _gesture: &Rc<Gesture>,
        _other: &Rc<Gesture>,
        _should_start: &mut bool,
    ) {
    }

    /// May the unrelated `other` start while `gesture` is recognizing?
    /// Consulted on the gesture that is already recognizing.
    fn other_gesture_may_start(
        &self,
        _gesture: &Rc<Gesture>,
        _other: &Rc<Gesture>,
        _should_start: &mut bool,
    ) {
    }
}

pub type ObserverId = u64;

type StateObserver = Rc<dyn Fn(&Rc<Gesture>, GestureState, GestureState)>;
type MayRecognizePredicate = Rc<dyn Fn(&Rc<Gesture>) -> bool>;

enum FailureGate {
    /// No undecided requirement remains.
    Clear,
    /// At least one required peer has not decided yet.
    Blocked,
    /// A required peer recognized; the gesture must cancel.
    Failed,
}

pub struct Gesture {
    name: RefCell<Option<String>>,
    state: Cell<GestureState>,
    // A COMPLETED request arrived while the gesture was gated; resolution
    // completes the gesture instead of leaving it in RECOGNIZING.
    pending_complete: Cell<bool>,

    points: RefCell<Vec<PointData>>,
    public_points: RefCell<Vec<GesturePoint>>,
    point_indices: Cell<u64>,

    allowed_device_types: Cell<DeviceTypeSet>,

    in_relationship_with: RefCell<Vec<Weak<Gesture>>>,
    cancel_on_recognizing: RefCell<Vec<Weak<Gesture>>>,
    can_not_cancel: RefCell<Vec<Weak<Gesture>>>,
    recognize_independently_from: RefCell<Vec<Weak<Gesture>>>,
    require_failure_of: RefCell<Vec<Weak<Gesture>>>,

    recognizer: RefCell<Option<Weak<dyn Recognizer>>>,
    actor: RefCell<Weak<Actor>>,
    host: RefCell<Option<Weak<dyn GestureHost>>>,

    next_observer_id: Cell<ObserverId>,
    state_observers: RefCell<Vec<(ObserverId, StateObserver)>>,
    may_recognize_predicates: RefCell<Vec<(ObserverId, MayRecognizePredicate)>>,
}

fn weak_contains(list: &[Weak<Gesture>], gesture: &Rc<Gesture>) -> bool {
    list.iter()
        .any(|weak| weak.upgrade().is_some_and(|g| Rc::ptr_eq(&g, gesture)))
}

fn weak_remove(list: &mut Vec<Weak<Gesture>>, gesture: &Rc<Gesture>) -> bool {
    let before = list.len();
    list.retain(|weak| match weak.upgrade() {
        Some(g) => !Rc::ptr_eq(&g, gesture),
        None => false,
    });
    list.len() < before
}

fn weak_push_unique(list: &mut Vec<Weak<Gesture>>, gesture: &Rc<Gesture>) -> bool {
    if weak_contains(list, gesture) {
        return false;
    }
    list.push(Rc::downgrade(gesture));
    true
}

fn upgrade_all(list: &[Weak<Gesture>]) -> Vec<Rc<Gesture>> {
    list.iter().filter_map(Weak::upgrade).collect()
}

impl Gesture {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            name: RefCell::new(None),
            state: Cell::new(GestureState::Waiting),
            pending_complete: Cell::new(false),
            points: RefCell::new(Vec::new()),
            public_points: RefCell::new(Vec::new()),
            point_indices: Cell::new(0),
            allowed_device_types: Cell::new(DeviceTypeSet::POINTING),
            in_relationship_with: RefCell::new(Vec::new()),
            cancel_on_recognizing: RefCell::new(Vec::new()),
            can_not_cancel: RefCell::new(Vec::new()),
            recognize_independently_from: RefCell::new(Vec::new()),
            require_failure_of: RefCell::new(Vec::new()),
            recognizer: RefCell::new(None),
            actor: RefCell::new(Weak::new()),
            host: RefCell::new(None),
            next_observer_id: Cell::new(1),
            state_observers: RefCell::new(Vec::new()),
            may_recognize_predicates: RefCell::new(Vec::new()),
        })
    }

    pub fn with_name(name: impl Into<String>) -> Rc<Self> {
        let gesture = Self::new();
        gesture.set_name(name);
        gesture
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = Some(name.into());
    }

    pub fn name(&self) -> Option<String> {
        self.name.borrow().clone()
    }

    fn debug_name(&self) -> String {
        self.name.borrow().clone().unwrap_or_else(|| "gesture".into())
    }

    /// Attaches the recognizer hooks. Held weakly: the recognizer owns the
    /// base, not the other way around.
    pub fn set_recognizer(&self, recognizer: Weak<dyn Recognizer>) {
        *self.recognizer.borrow_mut() = Some(recognizer);
    }

    fn recognizer(&self) -> Option<Rc<dyn Recognizer>> {
        self.recognizer.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_host(&self, host: &Rc<dyn GestureHost>) {
        *self.host.borrow_mut() = Some(Rc::downgrade(host));
    }

    fn host(&self) -> Option<Rc<dyn GestureHost>> {
        self.host.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn actor(&self) -> Option<Rc<Actor>> {
        self.actor.borrow().upgrade()
    }

    /// Attaches to or detaches from an actor. Detaching (or re-attaching)
    /// while the gesture has visible points cancels them all.
    pub fn set_actor(self: &Rc<Self>, actor: Option<&Rc<Actor>>) {
        if !self.public_points.borrow().is_empty() {
            log::debug!(
                "<{}> detaching from actor with {} visible points, cancelling",
                self.debug_name(),
                self.public_points.borrow().len()
            );
            self.cancel_all_points();
        }

        *self.actor.borrow_mut() = match actor {
            Some(actor) => Rc::downgrade(actor),
            None => Weak::new(),
        };
    }

    pub fn state(&self) -> GestureState {
        self.state.get()
    }

    /// The current public point view, newest point last.
    pub fn points(&self) -> Vec<GesturePoint> {
        self.public_points.borrow().clone()
    }

    pub fn n_points(&self) -> usize {
        self.public_points.borrow().len()
    }

    pub fn set_allowed_device_types(&self, types: &[DeviceType]) {
        self.allowed_device_types.set(DeviceTypeSet::from_types(types));
    }

    pub fn allowed_device_types(&self) -> DeviceTypeSet {
        self.allowed_device_types.get()
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn add_state_observer(
        &self,
        observer: impl Fn(&Rc<Gesture>, GestureState, GestureState) + 'static,
    ) -> ObserverId {
        let id = self.next_observer_id.get();
        self.next_observer_id.set(id + 1);
        self.state_observers.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    pub fn remove_state_observer(&self, id: ObserverId) {
        self.state_observers.borrow_mut().retain(|(i, _)| *i != id);
    }

    /// Registers a predicate consulted before the gesture may enter POSSIBLE
    /// or RECOGNIZING. Predicates run in registration order; the first
    /// `false` blocks the transition.
    pub fn add_may_recognize_predicate(
        &self,
        predicate: impl Fn(&Rc<Gesture>) -> bool + 'static,
    ) -> ObserverId {
        let id = self.next_observer_id.get();
        self.next_observer_id.set(id + 1);
        self.may_recognize_predicates
            .borrow_mut()
            .push((id, Rc::new(predicate)));
        id
    }

    pub fn remove_may_recognize_predicate(&self, id: ObserverId) {
        self.may_recognize_predicates
            .borrow_mut()
            .retain(|(i, _)| *i != id);
    }

    // ------------------------------------------------------------------
    // Relationship overrides
    // ------------------------------------------------------------------

    /// Prevents `self` from cancelling `other` when `self` recognizes, even
    /// if both observe the same points. Call in both directions to let two
    /// gestures recognize simultaneously on shared points.
    pub fn can_not_cancel(&self, other: &Rc<Gesture>) {
        weak_push_unique(&mut self.can_not_cancel.borrow_mut(), other);
    }

    /// Allows `self` to start while `other` is already recognizing,
    /// overriding the global one-recognizer-at-a-time rule for the pair.
    pub fn recognize_independently_from(&self, other: &Rc<Gesture>) {
        weak_push_unique(&mut self.recognize_independently_from.borrow_mut(), other);
    }

    /// Keeps `self` out of RECOGNIZING until `other` has been cancelled.
    /// While `other` is undecided, a recognize request parks `self` in
    /// RECOGNIZE_PENDING; `other` recognizing cancels `self`.
    pub fn require_failure_of(&self, other: &Rc<Gesture>) {
        weak_push_unique(&mut self.require_failure_of.borrow_mut(), other);
    }

    /// Re-negotiates the influence flags of every pair `self` currently is
    /// in, picking up overrides added mid-sequence. Only the caller's edges
    /// are re-evaluated.
    pub fn relationships_changed(self: &Rc<Self>) {
        let peers = upgrade_all(&self.in_relationship_with.borrow());
        for peer in peers {
            weak_remove(&mut self.cancel_on_recognizing.borrow_mut(), &peer);
            weak_remove(&mut peer.cancel_on_recognizing.borrow_mut(), self);

            let cancel_peer = self.influence_on(&peer);
            let cancel_self = peer.influence_on(self);

            if cancel_peer {
                weak_push_unique(&mut self.cancel_on_recognizing.borrow_mut(), &peer);
            }
            if cancel_self {
                weak_push_unique(&mut peer.cancel_on_recognizing.borrow_mut(), self);
            }
        }
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    /// Requests a state change.
    ///
    /// The request is validated against the allowed transitions and may be
    /// adjusted by the coordinator: a COMPLETED request from POSSIBLE goes
    /// through RECOGNIZING first, outstanding failure requirements park the
    /// gesture in RECOGNIZE_PENDING, and a blocked RECOGNIZING attempt is
    /// forced to CANCELLED. Never assume the state changed after this call;
    /// observe `state_changed` instead. Invalid requests are logged and
    /// refused, except requests to CANCELLED which are always silently
    /// accepted.
    pub fn set_state(self: &Rc<Self>, state: GestureState) {
        #[cfg(debug_assertions)]
        if let Some(host) = self.host() {
            host.main_thread_assert();
        }

        let current = self.state.get();
        log::debug!(
            "<{}> state change requested: {:?} -> {:?}",
            self.debug_name(),
            current,
            state
        );

        use GestureState::*;
        match (current, state) {
            (Waiting, Possible)
            | (Possible, Recognizing)
            | (Possible, Completed)
            | (Possible, Cancelled)
            | (RecognizePending, Cancelled)
            | (Recognizing, Recognizing)
            | (Recognizing, Completed)
            | (Recognizing, Cancelled)
            | (Completed, Waiting)
            | (Cancelled, Waiting) => self.set_state_authoritative(state),

            // The gesture already asked for RECOGNIZING; an upgrade to
            // COMPLETED is recorded and applied when the gate resolves.
            (RecognizePending, Completed) => self.pending_complete.set(true),
            (RecognizePending, Recognizing) => {}

            _ => {
                // Never complain about unnecessary tries to give up.
                if state == Cancelled {
                    return;
                }

                log::warn!(
                    "gesture <{}>: requested invalid state change: {:?} -> {:?}",
                    self.debug_name(),
                    current,
                    state
                );
            }
        }
    }

    /// Applies a state change together with the transitions the coordinator
    /// forces around it (the implicit RECOGNIZING before COMPLETED, the
    /// influence cascade, the automatic return to WAITING).
    fn set_state_authoritative(self: &Rc<Self>, new_state: GestureState) {
        // Moving to COMPLETED always goes through RECOGNIZING.
        if self.state.get() != GestureState::Recognizing && new_state == GestureState::Completed {
            self.transition(GestureState::Recognizing);

            match self.state.get() {
                GestureState::Recognizing => self.transition(GestureState::Completed),
                // Gated; remember the completion for when the gate resolves.
                GestureState::RecognizePending => self.pending_complete.set(true),
                other => debug_assert!(
                    other == GestureState::Cancelled,
                    "recognize attempt left gesture in {:?}",
                    other
                ),
            }

            self.maybe_influence_other_gestures();
            self.maybe_move_to_waiting();
            return;
        }

        self.transition(new_state);
        if matches!(
            self.state.get(),
            GestureState::Recognizing | GestureState::Cancelled
        ) {
            self.maybe_influence_other_gestures();
        }
        self.maybe_move_to_waiting();
    }

    /// Whether the machine permits moving from `from` to `to`. Cascades may
    /// ask for transitions a gesture already outran (a completed gesture
    /// being cancelled by a late winner); those are dropped here.
    fn transition_allowed(from: GestureState, to: GestureState) -> bool {
        use GestureState::*;
        matches!(
            (from, to),
            (Waiting, Possible)
                | (Possible, Recognizing)
                | (Possible, Cancelled)
                | (RecognizePending, Recognizing)
                | (RecognizePending, Cancelled)
                | (Recognizing, Recognizing)
                | (Recognizing, Completed)
                | (Recognizing, Cancelled)
                | (Completed, Waiting)
                | (Cancelled, Waiting)
        )
    }

    /// The single place where `state` is written. Performs the entry side
    /// effects of the target state and emits the change.
    fn transition(self: &Rc<Self>, new_state: GestureState) {
        let current = self.state.get();

        if current == new_state && new_state != GestureState::Recognizing {
            log::debug!(
                "<{}> skipping state change {:?} -> {:?}",
                self.debug_name(),
                current,
                new_state
            );
            return;
        }

        if !Self::transition_allowed(current, new_state) {
            log::debug!(
                "<{}> dropping state change {:?} -> {:?}",
                self.debug_name(),
                current,
                new_state
            );
            return;
        }

        if current == GestureState::Waiting {
            if !self.gesture_may_start() {
                // No hooks have fired yet; pretend nothing happened and
                // remain in WAITING.
                return;
            }

            registry::register(self);
        }

        if matches!(
            current,
            GestureState::Possible | GestureState::RecognizePending
        ) && new_state == GestureState::Recognizing
        {
            if !self.gesture_may_start() {
                self.transition(GestureState::Cancelled);
                return;
            }

            match self.evaluate_failure_requirements() {
                FailureGate::Clear => {}
                FailureGate::Blocked => {
                    if current != GestureState::RecognizePending {
                        self.state.set(GestureState::RecognizePending);
                        self.emit_state_changed(current, GestureState::RecognizePending);
                    }
                    return;
                }
                FailureGate::Failed => {
                    self.transition(GestureState::Cancelled);
                    return;
                }
            }
        }

        self.state.set(new_state);

        if new_state == GestureState::Recognizing {
            debug_assert_eq!(
                self.points.borrow().len(),
                self.public_points.borrow().len(),
                "point stores out of sync on recognize"
            );

            if let Some(host) = self.host() {
                let claims: Vec<_> = self
                    .points
                    .borrow()
                    .iter()
                    .map(|p| (Rc::clone(&p.device), p.sequence))
                    .collect();
                for (device, sequence) in claims {
                    host.claim_sequence(&device, sequence);
                }
            }

            self.maybe_cancel_independent_gestures();
            self.cancel_own_failure_dependents();
        }

        if new_state.is_terminal() {
            self.public_points.borrow_mut().clear();
            self.point_indices.set(0);
            self.pending_complete.set(false);
        }

        if new_state == GestureState::Waiting {
            registry::unregister(self);
            self.points.borrow_mut().clear();

            let peers = upgrade_all(&self.in_relationship_with.borrow());
            for peer in &peers {
                let removed = weak_remove(&mut peer.in_relationship_with.borrow_mut(), self);
                debug_assert!(removed, "relationship backlink missing");
            }
            self.in_relationship_with.borrow_mut().clear();
            self.cancel_on_recognizing.borrow_mut().clear();
        }

        self.emit_state_changed(current, new_state);

        if new_state == GestureState::Cancelled {
            self.resolve_failure_dependents_after_cancel();
        }

        log::debug!(
            "<{}> state changed: {:?} -> {:?}",
            self.debug_name(),
            current,
            new_state
        );
    }

    fn emit_state_changed(self: &Rc<Self>, old: GestureState, new: GestureState) {
        if let Some(recognizer) = self.recognizer() {
            recognizer.state_changed(self, old, new);
        }

        let observers: Vec<StateObserver> = self
            .state_observers
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for observer in observers {
            observer(self, old, new);
        }
    }

    fn maybe_move_to_waiting(self: &Rc<Self>) {
        if self.points.borrow().is_empty() && self.state.get().is_terminal() {
            self.transition(GestureState::Waiting);
        }
    }

    /// Cancels every peer that loses to this gesture recognizing. The set is
    /// emptied up front so recursive cancellations cannot re-enter it.
    fn maybe_influence_other_gestures(self: &Rc<Self>) {
        if !matches!(
            self.state.get(),
            GestureState::Recognizing | GestureState::Completed
        ) {
            return;
        }

        let losers = std::mem::take(&mut *self.cancel_on_recognizing.borrow_mut());
        for other in upgrade_all(&losers) {
            if !weak_contains(&self.in_relationship_with.borrow(), &other) {
                continue;
            }

            other.transition(GestureState::Cancelled);
            other.maybe_move_to_waiting();
        }
    }

    // ------------------------------------------------------------------
    // Global arbitration
    // ------------------------------------------------------------------

    fn gesture_may_start(self: &Rc<Self>) -> bool {
        if !self.new_gesture_allowed_to_start() {
            log::debug!(
                "<{}> may not recognize, another gesture is already running",
                self.debug_name()
            );
            return false;
        }

        let predicates: Vec<MayRecognizePredicate> = self
            .may_recognize_predicates
            .borrow()
            .iter()
            .map(|(_, p)| Rc::clone(p))
            .collect();
        for predicate in predicates {
            if !predicate(self) {
                log::debug!(
                    "<{}> may-recognize predicate prevented recognizing",
                    self.debug_name()
                );
                return false;
            }
        }

        if let Some(recognizer) = self.recognizer() {
            if !recognizer.may_recognize(self) {
                log::debug!(
                    "<{}> recognizer prevented recognizing",
                    self.debug_name()
                );
                return false;
            }
        }

        true
    }

    fn new_gesture_allowed_to_start(self: &Rc<Self>) -> bool {
        for existing in registry::snapshot() {
            if Rc::ptr_eq(&existing, self) {
                continue;
            }

            // Gestures in relationship have their own arbitration.
            if weak_contains(&existing.in_relationship_with.borrow(), self) {
                continue;
            }

            // A pending gesture has claimed intent and blocks like a
            // recognizing one.
            if matches!(
                existing.state.get(),
                GestureState::Recognizing | GestureState::RecognizePending
            ) && !Self::other_gesture_allowed_to_start(&existing, self)
            {
                return false;
            }
        }

        true
    }

    /// May `newcomer` start while `running` is recognizing?
    fn other_gesture_allowed_to_start(running: &Rc<Gesture>, newcomer: &Rc<Gesture>) -> bool {
        if weak_contains(&newcomer.recognize_independently_from.borrow(), running) {
            return true;
        }

        // Default: only a single gesture can be recognizing globally.
        let mut should_start = false;

        if let Some(recognizer) = newcomer.recognizer() {
            recognizer.should_start_while(newcomer, running, &mut should_start);
        }

        if let Some(recognizer) = running.recognizer() {
            recognizer.other_gesture_may_start(running, newcomer, &mut should_start);
        }

        should_start
    }

    /// Cancels every unrelated POSSIBLE gesture that is not allowed to keep
    /// going while this gesture recognizes.
    fn maybe_cancel_independent_gestures(self: &Rc<Self>) {
        for other in registry::snapshot() {
            if Rc::ptr_eq(&other, self) {
                continue;
            }

            if weak_contains(&self.in_relationship_with.borrow(), &other) {
                continue;
            }

            if other.state.get() == GestureState::Possible
                && !Self::other_gesture_allowed_to_start(self, &other)
            {
                other.set_state_authoritative(GestureState::Cancelled);
            }
        }
    }

    // ------------------------------------------------------------------
    // Failure requirements
    // ------------------------------------------------------------------

    fn evaluate_failure_requirements(&self) -> FailureGate {
        let targets = upgrade_all(&self.require_failure_of.borrow());
        let mut blocked = false;

        for target in targets {
            match target.state.get() {
                // The target failed or never started; the requirement holds.
                GestureState::Cancelled | GestureState::Waiting => {}
                GestureState::Possible | GestureState::RecognizePending => blocked = true,
                GestureState::Recognizing | GestureState::Completed => return FailureGate::Failed,
            }
        }

        if blocked {
            FailureGate::Blocked
        } else {
            FailureGate::Clear
        }
    }

    /// After this gesture cancelled, every pending gesture that was waiting
    /// for it re-evaluates its gate. The walk runs in activation order;
    /// each promotion finishes (including the cancellations it causes)
    /// before the next pending gesture is examined.
    fn resolve_failure_dependents_after_cancel(self: &Rc<Self>) {
        for other in registry::snapshot() {
            if Rc::ptr_eq(&other, self) {
                continue;
            }
            if other.state.get() != GestureState::RecognizePending {
                continue;
            }
            if !weak_contains(&other.require_failure_of.borrow(), self) {
                continue;
            }

            match other.evaluate_failure_requirements() {
                FailureGate::Clear => {
                    let target = if other.pending_complete.get() {
                        GestureState::Completed
                    } else {
                        GestureState::Recognizing
                    };
                    other.pending_complete.set(false);
                    other.set_state_authoritative(target);
                }
                FailureGate::Failed => other.set_state_authoritative(GestureState::Cancelled),
                FailureGate::Blocked => {}
            }
        }
    }

    /// This gesture recognized; every pending gesture that required its
    /// failure loses.
    fn cancel_own_failure_dependents(self: &Rc<Self>) {
        for other in registry::snapshot() {
            if Rc::ptr_eq(&other, self) {
                continue;
            }
            if other.state.get() != GestureState::RecognizePending {
                continue;
            }
            if weak_contains(&other.require_failure_of.borrow(), self) {
                other.set_state_authoritative(GestureState::Cancelled);
            }
        }
    }

    // ------------------------------------------------------------------
    // Pairwise relationship setup
    // ------------------------------------------------------------------

    /// Whether `self` recognizing cancels `other`: hooks first, then public
    /// overrides.
    fn influence_on(self: &Rc<Self>, other: &Rc<Gesture>) -> bool {
        // The default: we cancel other gestures when we recognize.
        let mut cancel = true;

        if let Some(recognizer) = self.recognizer() {
            recognizer.should_influence(self, other, &mut cancel);
        }

        if let Some(recognizer) = other.recognizer() {
            recognizer.should_be_influenced_by(other, self, &mut cancel);
        }

        if weak_contains(&self.can_not_cancel.borrow(), other) {
            cancel = false;
        }

        cancel
    }

    /// Called by the host when `self` and `other` first share the sequence.
    /// Negotiates the pair's mutual influence (once per joint episode) and
    /// returns the dispatch-ordering verdict: `-1` when `self` must be
    /// consulted before `other` (it cancels `other` but not vice versa),
    /// `+1` for the opposite, `0` when symmetric.
    pub fn setup_sequence_relationship(
        self: &Rc<Self>,
        other: &Rc<Gesture>,
        device: &Rc<InputDevice>,
        sequence: Option<TouchSequence>,
    ) -> i32 {
        debug_assert!(
            self.find_point_index(device, sequence).is_some()
                && other.find_point_index(device, sequence).is_some(),
            "relationship setup for a sequence one side does not hold"
        );

        let cancel_other;
        let cancel_self;

        // If we know the other gesture already, everything is figured out;
        // never negotiate again for new shared sequences.
        if weak_contains(&self.in_relationship_with.borrow(), other) {
            cancel_self = weak_contains(&other.cancel_on_recognizing.borrow(), self);
            cancel_other = weak_contains(&self.cancel_on_recognizing.borrow(), other);
        } else {
            cancel_other = self.influence_on(other);
            cancel_self = other.influence_on(self);

            log::debug!(
                "setting up relation between <{}> (cancels other: {}) and <{}> (cancels other: {})",
                self.debug_name(),
                cancel_other,
                other.debug_name(),
                cancel_self
            );

            weak_push_unique(&mut self.in_relationship_with.borrow_mut(), other);
            weak_push_unique(&mut other.in_relationship_with.borrow_mut(), self);

            if cancel_other {
                weak_push_unique(&mut self.cancel_on_recognizing.borrow_mut(), other);
            }
            if cancel_self {
                weak_push_unique(&mut other.cancel_on_recognizing.borrow_mut(), self);
            }
        }

        if cancel_other && !cancel_self {
            -1
        } else if !cancel_other && cancel_self {
            1
        } else {
            0
        }
    }

    // ------------------------------------------------------------------
    // Point registration and event dispatch
    // ------------------------------------------------------------------

    fn find_point_index(
        &self,
        device: &Rc<InputDevice>,
        sequence: Option<TouchSequence>,
    ) -> Option<usize> {
        self.points
            .borrow()
            .iter()
            .position(|p| p.matches(device, sequence))
    }

    /// First offer of a new sequence. Returns whether the gesture takes the
    /// point; a refused offer leaves the event untouched for others.
    pub fn should_handle_sequence(self: &Rc<Self>, event: &Event) -> bool {
        if self.state.get() == GestureState::Cancelled {
            return false;
        }

        let first_source = {
            let points = self.points.borrow();
            points.first().map(|p| Rc::clone(&p.source_device))
        };

        match first_source {
            // Only allow new points coming from the same input device.
            Some(source) => {
                if !Rc::ptr_eq(&source, &event.source_device) {
                    return false;
                }
            }
            None => {
                let device_type = event.source_device.device_type();
                if !self.allowed_device_types.get().contains(device_type) {
                    return false;
                }

                if self.state.get() == GestureState::Waiting {
                    self.set_state_authoritative(GestureState::Possible);
                    if self.state.get() != GestureState::Possible {
                        return false;
                    }
                }
            }
        }

        self.points.borrow_mut().push(PointData::from_event(event));
        log::debug!(
            "<{}> registered new point, n points now: {}",
            self.debug_name(),
            self.points.borrow().len()
        );

        true
    }

    fn unregister_point(
        self: &Rc<Self>,
        device: &Rc<InputDevice>,
        sequence: Option<TouchSequence>,
    ) {
        if let Some(index) = self.find_point_index(device, sequence) {
            self.points.borrow_mut().remove(index);
            let mut public = self.public_points.borrow_mut();
            if index < public.len() {
                public.remove(index);
            }
        }

        if self.points.borrow().is_empty() && self.state.get().is_terminal() {
            self.set_state_authoritative(GestureState::Waiting);
        }
    }

    /// Feeds one event to the gesture. Events for unknown sequences,
    /// synthetic events and event kinds gestures do not track are propagated
    /// untouched.
    pub fn handle_event(self: &Rc<Self>, event: &Event) -> EventPropagation {
        #[cfg(debug_assertions)]
        if let Some(host) = self.host() {
            host.main_thread_assert();
        }

        if event.is_synthetic() {
            return EventPropagation::Propagate;
        }

        match event.kind {
            EventKind::ButtonPress
            | EventKind::ButtonRelease
            | EventKind::Motion
            | EventKind::TouchBegin
            | EventKind::TouchUpdate
            | EventKind::TouchEnd
            | EventKind::TouchCancel
            | EventKind::Enter
            | EventKind::Leave => {}
            _ => return EventPropagation::Propagate,
        }

        let Some(index) = self.find_point_index(&event.device, event.sequence) else {
            return EventPropagation::Propagate;
        };

        debug_assert!(self.state.get() != GestureState::Waiting);

        // Further buttons pressed on the same pointer only bump a counter;
        // the point ends when the last one is released.
        if event.kind == EventKind::ButtonPress {
            let mut points = self.points.borrow_mut();
            points[index].n_buttons_pressed += 1;
            if points[index].n_buttons_pressed >= 2 {
                return EventPropagation::Propagate;
            }
        } else if event.kind == EventKind::ButtonRelease {
            let mut points = self.points.borrow_mut();
            points[index].n_buttons_pressed = points[index].n_buttons_pressed.saturating_sub(1);
            if points[index].n_buttons_pressed >= 1 {
                return EventPropagation::Propagate;
            }
        }

        // Terminal states absorb the remaining events of their sequences
        // without reporting them.
        if self.state.get().is_terminal() {
            debug_assert!(self.public_points.borrow().is_empty());

            if event.kind.is_terminal() {
                self.unregister_point(&event.device, event.sequence);
            }

            return EventPropagation::Propagate;
        }

        match event.kind {
            EventKind::ButtonPress | EventKind::TouchBegin => {
                debug_assert_eq!(
                    index,
                    self.public_points.borrow().len(),
                    "public point already exists for new sequence"
                );

                let point_index = self.point_indices.get();
                self.point_indices.set(point_index + 1);

                let point = GesturePoint::new(point_index, event);
                self.public_points.borrow_mut().push(point.clone());

                if let Some(recognizer) = self.recognizer() {
                    recognizer.points_began(self, &[point]);
                }
            }

            EventKind::Motion | EventKind::TouchUpdate => {
                let point = {
                    let mut public = self.public_points.borrow_mut();
                    debug_assert!(index < public.len());
                    public[index].update_from_event(event);
                    public[index].clone()
                };

                if let Some(recognizer) = self.recognizer() {
                    recognizer.points_moved(self, &[point]);
                }
            }

            EventKind::ButtonRelease | EventKind::TouchEnd => {
                let point = {
                    let mut public = self.public_points.borrow_mut();
                    debug_assert!(index < public.len());
                    public[index].update_from_event(event);
                    public[index].clone()
                };

                if let Some(recognizer) = self.recognizer() {
                    recognizer.points_ended(self, &[point]);
                }

                self.unregister_point(&event.device, event.sequence);
            }

            EventKind::TouchCancel => {
                let point = self.public_points.borrow()[index].clone();

                if let Some(recognizer) = self.recognizer() {
                    recognizer.points_cancelled(self, &[point]);
                }

                self.unregister_point(&event.device, event.sequence);
            }

            EventKind::Enter | EventKind::Leave => {
                let point = {
                    let public = self.public_points.borrow();
                    (index < public.len()).then(|| public[index].clone())
                };

                if let (Some(point), Some(crossing)) = (point, event.crossing.as_ref()) {
                    if let Some(recognizer) = self.recognizer() {
                        recognizer.crossing_event(
                            self,
                            &point,
                            event.kind,
                            event.time_ms,
                            event.flags,
                            crossing,
                        );
                    }
                }
            }

            _ => unreachable!(),
        }

        EventPropagation::Propagate
    }

    /// Host-driven cancellation of specific sequences on a device (an empty
    /// slice means the device's pointer point). Reported sequences emit
    /// `points_cancelled` unless the gesture is already in a terminal state.
    pub fn sequences_cancelled(
        self: &Rc<Self>,
        device: &Rc<InputDevice>,
        sequences: &[TouchSequence],
    ) {
        let targets: SmallVec<[Option<TouchSequence>; 3]> = if sequences.is_empty() {
            smallvec::smallvec![None]
        } else {
            sequences.iter().map(|s| Some(*s)).collect()
        };

        if self.state.get().is_terminal() {
            debug_assert!(self.public_points.borrow().is_empty());

            for sequence in targets {
                self.unregister_point(device, sequence);
            }
            return;
        }

        let mut batch: SmallVec<[GesturePoint; 3]> = SmallVec::new();
        {
            let public = self.public_points.borrow();
            for sequence in &targets {
                if let Some(index) = self.find_point_index(device, *sequence) {
                    if index < public.len() {
                        batch.push(public[index].clone());
                    }
                }
            }
        }

        if batch.is_empty() {
            return;
        }

        if let Some(recognizer) = self.recognizer() {
            recognizer.points_cancelled(self, &batch);
        }

        for sequence in targets {
            self.unregister_point(device, sequence);
        }
    }

    /// Cancels every point the gesture holds, used when detaching from an
    /// actor.
    fn cancel_all_points(self: &Rc<Self>) {
        if self.state.get().is_terminal() {
            debug_assert!(self.public_points.borrow().is_empty());

            self.points.borrow_mut().clear();
            self.set_state_authoritative(GestureState::Waiting);
            return;
        }

        let batch: Vec<GesturePoint> = self.public_points.borrow().clone();
        if batch.is_empty() {
            self.points.borrow_mut().clear();
            return;
        }

        if let Some(recognizer) = self.recognizer() {
            recognizer.points_cancelled(self, &batch);
        }

        self.points.borrow_mut().clear();
        self.public_points.borrow_mut().clear();

        // The hook may have moved us to a terminal state; finish the cycle.
        if self.state.get().is_terminal() {
            self.set_state_authoritative(GestureState::Waiting);
        }
    }
}

#[cfg(test)]
#[path = "tests/gesture_tests.rs"]
mod tests;
