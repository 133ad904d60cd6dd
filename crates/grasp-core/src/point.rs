//! Per-gesture point bookkeeping.
//!
//! Each gesture keeps two parallel tables: a private one keyed by
//! (device, sequence) that exists from the moment a sequence is accepted
//! until its terminal event, and a public one that subclass hooks and
//! clients observe. The public table is cleared when the gesture reaches a
//! terminal state while the private table keeps absorbing events until every
//! sequence has ended.

use std::rc::Rc;

use crate::device::InputDevice;
use crate::events::{Event, EventKind, TouchSequence};
use crate::geometry::Point;

/// The public view of one active input point.
///
/// Coordinates are bucketed by event class: `begin_coords` from the press or
/// touch-begin, `move_coords` from the newest motion, `end_coords` from the
/// release. `latest_coords` always mirrors the newest event and
/// `last_coords` holds the previous `latest_coords`, so subclasses can
/// compute per-event deltas without storing their own history.
#[derive(Clone)]
pub struct GesturePoint {
    /// Monotonically increasing per-gesture index, assigned when the point
    /// first reports through `points_began`.
    pub index: u64,
    pub begin_coords: Point,
    pub move_coords: Point,
    pub end_coords: Point,
    pub latest_coords: Point,
    pub last_coords: Point,
    pub event_time: u64,
    pub latest_event: Event,
}

impl GesturePoint {
    pub(crate) fn new(index: u64, event: &Event) -> Self {
        let mut point = Self {
            index,
            begin_coords: Point::ZERO,
            move_coords: Point::ZERO,
            end_coords: Point::ZERO,
            latest_coords: Point::ZERO,
            last_coords: Point::ZERO,
            event_time: event.time_ms,
            latest_event: event.clone(),
        };
        point.update_from_event(event);
        point
    }

    pub(crate) fn update_from_event(&mut self, event: &Event) {
        self.latest_event = event.clone();
        self.event_time = event.time_ms;

        let coords = event.coords;
        match event.kind {
            EventKind::ButtonPress | EventKind::TouchBegin => self.begin_coords = coords,
            EventKind::Motion | EventKind::TouchUpdate => self.move_coords = coords,
            _ => self.end_coords = coords,
        }

        self.last_coords = self.latest_coords;
        self.latest_coords = coords;
    }
}

/// Private per-sequence record, owned by exactly one gesture.
pub(crate) struct PointData {
    pub(crate) device: Rc<InputDevice>,
    pub(crate) source_device: Rc<InputDevice>,
    pub(crate) sequence: Option<TouchSequence>,
    pub(crate) n_buttons_pressed: u32,
}

impl PointData {
    pub(crate) fn from_event(event: &Event) -> Self {
        Self {
            device: Rc::clone(&event.device),
            source_device: Rc::clone(&event.source_device),
            sequence: event.sequence,
            n_buttons_pressed: 0,
        }
    }

    pub(crate) fn matches(&self, device: &Rc<InputDevice>, sequence: Option<TouchSequence>) -> bool {
        Rc::ptr_eq(&self.device, device) && self.sequence == sequence
    }
}
