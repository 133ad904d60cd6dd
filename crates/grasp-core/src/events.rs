//! The normalized input event model consumed by gestures and grabs.
//!
//! Events are a flat payload with a kind tag; gesture dispatch is a single
//! match over [`EventKind`]. The host owns event production and delivery,
//! the coordinator never queues or reorders events.

use std::rc::Rc;

use crate::actor::Actor;
use crate::device::InputDevice;
use crate::geometry::Point;

/// Identifier for a continuous stream of touch events belonging to the same
/// contact. `None` in an event means the point is a pointer button, not a
/// touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TouchSequence(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    ButtonPress,
    ButtonRelease,
    Motion,
    TouchBegin,
    TouchUpdate,
    TouchEnd,
    TouchCancel,
    Enter,
    Leave,
    Key,
    Scroll,
    TouchpadGesture,
    Pad,
}

impl EventKind {
    /// Whether this kind terminates the (device, sequence) point it belongs
    /// to.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventKind::ButtonRelease | EventKind::TouchEnd | EventKind::TouchCancel
        )
    }

    pub fn is_crossing(self) -> bool {
        matches!(self, EventKind::Enter | EventKind::Leave)
    }
}

/// Keyboard modifiers and logical button state carried on every event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ModifierState(u32);

impl ModifierState {
    pub const NONE: Self = Self(0);
    pub const SHIFT: Self = Self(1 << 0);
    pub const CONTROL: Self = Self(1 << 1);
    pub const ALT: Self = Self(1 << 2);
    pub const SUPER: Self = Self(1 << 3);
    pub const BUTTON1: Self = Self(1 << 8);
    pub const BUTTON2: Self = Self(1 << 9);
    pub const BUTTON3: Self = Self(1 << 10);
    pub const BUTTON4: Self = Self(1 << 11);
    pub const BUTTON5: Self = Self(1 << 12);

    const BUTTON_MASK: u32 = Self::BUTTON1.0
        | Self::BUTTON2.0
        | Self::BUTTON3.0
        | Self::BUTTON4.0
        | Self::BUTTON5.0;

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// The modifier state with all logical-button bits stripped, for
    /// comparing press and release states of a click.
    pub fn without_buttons(self) -> Self {
        Self(self.0 & !Self::BUTTON_MASK)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EventFlags(u8);

impl EventFlags {
    pub const NONE: Self = Self(0);
    /// Synthesized by the host rather than produced by hardware; gestures
    /// skip dispatch for these.
    pub const SYNTHETIC: Self = Self(1 << 0);

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// How a crossing (enter/leave) pair came to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossingMode {
    Normal,
    Grab,
    Ungrab,
}

/// Extra payload carried by enter/leave events.
#[derive(Clone)]
pub struct CrossingInfo {
    /// The actor the pointer entered or left.
    pub source: Rc<Actor>,
    /// The actor on the other side of the crossing, if any.
    pub related: Option<Rc<Actor>>,
    pub mode: CrossingMode,
}

/// A single input event as delivered by the host.
///
/// `device` is the logical device the event is attributed to, while
/// `source_device` is the hardware device that produced it; gestures use the
/// source device to keep all their points on one physical device.
#[derive(Clone)]
pub struct Event {
    pub kind: EventKind,
    pub device: Rc<InputDevice>,
    pub source_device: Rc<InputDevice>,
    pub sequence: Option<TouchSequence>,
    pub coords: Point,
    pub time_ms: u64,
    pub button: u32,
    pub modifiers: ModifierState,
    pub flags: EventFlags,
    pub crossing: Option<CrossingInfo>,
}

impl Event {
    pub fn new(kind: EventKind, device: Rc<InputDevice>, coords: Point, time_ms: u64) -> Self {
        Self {
            kind,
            source_device: Rc::clone(&device),
            device,
            sequence: None,
            coords,
            time_ms,
            button: 0,
            modifiers: ModifierState::NONE,
            flags: EventFlags::NONE,
            crossing: None,
        }
    }

    pub fn with_sequence(mut self, sequence: TouchSequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_button(mut self, button: u32) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: ModifierState) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    pub fn with_crossing(mut self, crossing: CrossingInfo) -> Self {
        self.crossing = Some(crossing);
        self
    }

    pub fn is_synthetic(&self) -> bool {
        self.flags.contains(EventFlags::SYNTHETIC)
    }

    pub fn is_touch(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TouchBegin
                | EventKind::TouchUpdate
                | EventKind::TouchEnd
                | EventKind::TouchCancel
        )
    }
}

/// What a gesture tells the host to do with an event after handling it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventPropagation {
    Propagate,
    Consume,
}
