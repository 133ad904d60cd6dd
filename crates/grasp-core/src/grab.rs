//! Event grabs: polymorphic delivery targets the host routes events to
//! while a grab is in effect.
//!
//! The base [`Grab`] forwards nothing; every hook defaults to a no-op. The
//! actor-scoped [`ActorGrab`] restricts crossing emission to a subtree and
//! re-emits every other event category on the subtree root. Emission goes
//! through an [`EventSink`] supplied by the host.

use std::rc::Rc;

use crate::actor::Actor;
use crate::device::InputDevice;
use crate::events::{CrossingMode, Event, TouchSequence};

/// Host-side emission interface a grab delivers through.
pub trait EventSink {
    /// Emits a leave/enter pair. `topmost` bounds the leave walk upwards,
    /// `bottommost` bounds the enter walk downwards.
    #[allow(clippy::too_many_arguments)]
    fn emit_crossing(
        &self,
        device: &Rc<InputDevice>,
        sequence: Option<TouchSequence>,
        old_actor: Option<&Rc<Actor>>,
        new_actor: Option<&Rc<Actor>>,
        topmost: Option<&Rc<Actor>>,
        bottommost: Option<&Rc<Actor>>,
        mode: CrossingMode,
    );

    /// Emits an event on an actor, capture and bubble through its chain.
    fn emit_event(&self, event: &Event, target: &Rc<Actor>);
}

/// A delivery target for every event category the host dispatches. All
/// hooks default to swallowing the event.
pub trait Grab {
    #[allow(clippy::too_many_arguments)]
    fn focus_event(
        &self,
        _device: &Rc<InputDevice>,
        _sequence: Option<TouchSequence>,
        _old_actor: Option<&Rc<Actor>>,
        _new_actor: Option<&Rc<Actor>>,
        _mode: CrossingMode,
    ) {
    }

    fn key_event(&self, _event: &Event) {}
    fn motion_event(&self, _event: &Event) {}
    fn button_event(&self, _event: &Event) {}
    fn scroll_event(&self, _event: &Event) {}
    fn touchpad_gesture_event(&self, _event: &Event) {}
    fn touch_event(&self, _event: &Event) {}
    fn pad_event(&self, _event: &Event) {}

    /// A newer grab superseded this one. Return `true` to be reinstated
    /// when the newer grab ends, `false` to abort.
    fn cancel(&self) -> bool {
        false
    }
}

/// Grab scoped to an actor subtree.
pub struct ActorGrab {
    grab_actor: Option<Rc<Actor>>,
    sink: Rc<dyn EventSink>,
}

impl ActorGrab {
    pub fn new(grab_actor: &Rc<Actor>, sink: Rc<dyn EventSink>) -> Self {
        Self {
            grab_actor: Some(Rc::clone(grab_actor)),
            sink,
        }
    }

    pub fn grab_actor(&self) -> Option<&Rc<Actor>> {
        self.grab_actor.as_ref()
    }

    fn reemit(&self, event: &Event) {
        if let Some(actor) = &self.grab_actor {
            self.sink.emit_event(event, actor);
        }
    }
}

impl Grab for ActorGrab {
    fn focus_event(
        &self,
        device: &Rc<InputDevice>,
        sequence: Option<TouchSequence>,
        old_actor: Option<&Rc<Actor>>,
        new_actor: Option<&Rc<Actor>>,
        mode: CrossingMode,
    ) {
        let mut old_actor = old_actor.cloned();
        let mut new_actor = new_actor.cloned();
        let mut topmost: Option<Rc<Actor>> = None;
        let mut bottommost: Option<Rc<Actor>> = None;

        if let Some(grab_actor) = &self.grab_actor {
            if mode == CrossingMode::Grab
                && old_actor.as_ref().is_some_and(|a| grab_actor.contains(a))
            {
                bottommost = Some(Rc::clone(grab_actor));
            }

            if mode == CrossingMode::Ungrab
                && new_actor.as_ref().is_some_and(|a| grab_actor.contains(a))
            {
                bottommost = Some(Rc::clone(grab_actor));
            }
        }

        if old_actor.is_some() && new_actor.is_some() {
            match &self.grab_actor {
                Some(grab_actor) => {
                    topmost = Some(Rc::clone(grab_actor));

                    let contains_old = old_actor.as_ref().is_some_and(|a| grab_actor.contains(a));
                    let contains_new = new_actor.as_ref().is_some_and(|a| grab_actor.contains(a));

                    // Crossings entirely outside the subtree are not the
                    // grab's business.
                    if !contains_old && !contains_new {
                        return;
                    }

                    if contains_old && !contains_new {
                        new_actor = None;
                    }

                    if !contains_old && contains_new {
                        old_actor = None;
                    }
                }
                None => {
                    // Leave events go from the just-left actor up to the
                    // common ancestor, enter events back down to the newly
                    // entered actor.
                    let new = new_actor.clone();
                    let mut cursor = old_actor.clone();
                    while let Some(actor) = cursor {
                        if new.as_ref().is_some_and(|n| actor.contains(n)) {
                            topmost = Some(actor);
                            break;
                        }
                        cursor = actor.parent();
                    }
                }
            }
        }

        self.sink.emit_crossing(
            device,
            sequence,
            old_actor.as_ref(),
            new_actor.as_ref(),
            topmost.as_ref(),
            bottommost.as_ref(),
            mode,
        );
    }

    fn key_event(&self, event: &Event) {
        self.reemit(event);
    }

    fn motion_event(&self, event: &Event) {
        self.reemit(event);
    }

    fn button_event(&self, event: &Event) {
        self.reemit(event);
    }

    fn scroll_event(&self, event: &Event) {
        self.reemit(event);
    }

    fn touchpad_gesture_event(&self, event: &Event) {
        self.reemit(event);
    }

    fn touch_event(&self, event: &Event) {
        self.reemit(event);
    }

    fn pad_event(&self, event: &Event) {
        self.reemit(event);
    }

    /// Actor grabs are implicit while a button or touch is held; regaining
    /// control after the sequence already ended would be wrong, so never
    /// reinstate.
    fn cancel(&self) -> bool {
        true
    }
}
