//! The gesture-to-host interface.
//!
//! The coordinator is driven entirely by synchronous calls from its host;
//! this trait is the narrow surface it calls back through.

use std::rc::Rc;

use crate::device::InputDevice;
use crate::events::TouchSequence;

pub trait GestureHost {
    /// A gesture entered RECOGNIZING and now owns this sequence. The host
    /// typically stops delivering the sequence to non-gesture handlers.
    fn claim_sequence(&self, device: &Rc<InputDevice>, sequence: Option<TouchSequence>);

    /// Debug-build check that the caller is on the host's main thread. The
    /// coordinator is single-threaded by contract.
    fn main_thread_assert(&self) {}
}
