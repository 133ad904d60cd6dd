//! Process-wide set of active gestures.
//!
//! A gesture is active while its state is anything but WAITING. The set is
//! kept in activation order and drives global arbitration (only one gesture
//! recognizes at a time by default) and failure-requirement resolution
//! walks. Entries are weak; a dropped gesture disappears on the next
//! snapshot.
//!
//! The set is thread-local: the coordinator is single-threaded by contract
//! and is never shared across threads.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::gesture::Gesture;

thread_local! {
    static ACTIVE_GESTURES: RefCell<Vec<Weak<Gesture>>> = RefCell::new(Vec::new());
}

pub(crate) fn register(gesture: &Rc<Gesture>) {
    ACTIVE_GESTURES.with(|set| {
        set.borrow_mut().push(Rc::downgrade(gesture));
    });
}

pub(crate) fn unregister(gesture: &Rc<Gesture>) {
    ACTIVE_GESTURES.with(|set| {
        let mut set = set.borrow_mut();
        let before = set.len();
        set.retain(|weak| match weak.upgrade() {
            Some(candidate) => !Rc::ptr_eq(&candidate, gesture),
            None => false,
        });
        debug_assert!(set.len() < before, "gesture was not in the active set");
    });
}

/// All live active gestures in activation order. Snapshots so callers can
/// trigger cascading state changes while iterating; dead entries are pruned
/// as a side effect.
pub(crate) fn snapshot() -> Vec<Rc<Gesture>> {
    ACTIVE_GESTURES.with(|set| {
        let mut set = set.borrow_mut();
        set.retain(|weak| weak.strong_count() > 0);
        set.iter().filter_map(Weak::upgrade).collect()
    })
}

/// Number of live active gestures.
pub fn active_count() -> usize {
    snapshot().len()
}
