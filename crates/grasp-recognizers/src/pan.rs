//! Pan recognition.
//!
//! Accumulates per-event deltas and starts recognizing once the total
//! displacement crosses the begin threshold, optionally constrained to one
//! axis. A ring buffer of the trailing 150 ms of deltas yields the velocity
//! reported when the pan ends.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use grasp_core::geometry::{Point, Vector2};
use grasp_core::gesture::{Gesture, GestureState, Recognizer};
use grasp_core::point::GesturePoint;

use crate::constants::DEFAULT_PAN_BEGIN_THRESHOLD_PX;

/// How long a tail of deltas feeds the end velocity.
const EVENT_HISTORY_DURATION_MS: u64 = 150;
/// Deltas arriving closer together than this are coalesced.
const EVENT_HISTORY_MIN_STORE_INTERVAL_MS: u64 = 1;
const EVENT_HISTORY_MAX_LENGTH: usize =
    (EVENT_HISTORY_DURATION_MS / EVENT_HISTORY_MIN_STORE_INTERVAL_MS) as usize;

#[derive(Clone, Copy)]
struct HistoryEntry {
    delta: Vector2,
    time: u64,
}

/// Fixed-capacity ring of timestamped deltas.
struct DeltaHistory {
    entries: Vec<HistoryEntry>,
    next: usize,
}

impl DeltaHistory {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next: 0,
        }
    }

    fn last_time(&self) -> Option<u64> {
        if self.entries.is_empty() {
            return None;
        }
        let index = (self.next + self.entries.len() - 1) % self.entries.len();
        Some(self.entries[index].time)
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, delta: Vector2, time: u64) {
        if let Some(last) = self.last_time() {
            if time < last + EVENT_HISTORY_MIN_STORE_INTERVAL_MS {
                return;
            }
        }

        let entry = HistoryEntry { delta, time };
        if self.entries.len() < EVENT_HISTORY_MAX_LENGTH {
            self.entries.push(entry);
            self.next = self.entries.len() % EVENT_HISTORY_MAX_LENGTH;
        } else {
            self.entries[self.next] = entry;
            self.next = (self.next + 1) % EVENT_HISTORY_MAX_LENGTH;
        }
    }

    /// Velocity in pixels per millisecond over the trailing window ending at
    /// `latest_time`. Zero when the window holds fewer than two entries.
    fn velocity(&self, latest_time: u64) -> Vector2 {
        let window_start = latest_time.saturating_sub(EVENT_HISTORY_DURATION_MS);

        let mut first_time: Option<u64> = None;
        let mut last_time = 0;
        let mut accumulated = Vector2::ZERO;

        let len = self.entries.len();
        let start = if len < EVENT_HISTORY_MAX_LENGTH {
            0
        } else {
            self.next
        };

        for i in 0..len {
            let entry = &self.entries[(start + i) % len];
            if entry.time < window_start {
                continue;
            }

            if first_time.is_none() {
                first_time = Some(entry.time);
            }
            accumulated += entry.delta;
            last_time = entry.time;
        }

        match first_time {
            Some(first) if first != last_time => {
                let span = (last_time - first) as f32;
                Vector2::new(accumulated.x / span, accumulated.y / span)
            }
            _ => Vector2::ZERO,
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.next = 0;
    }
}

/// Axis constraint for the pan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanAxis {
    Both,
    X,
    Y,
}

#[derive(Clone, Debug)]
pub struct PanConfig {
    /// Displacement that has to accumulate before the pan starts. Zero
    /// starts the pan on the press itself.
    pub begin_threshold: f32,
    pub pan_axis: PanAxis,
    pub min_n_points: u32,
    /// Zero means unlimited.
    pub max_n_points: u32,
}

impl Default for PanConfig {
    fn default() -> Self {
        Self {
            begin_threshold: DEFAULT_PAN_BEGIN_THRESHOLD_PX,
            pan_axis: PanAxis::Both,
            min_n_points: 1,
            max_n_points: 0,
        }
    }
}

impl PanConfig {
    pub fn begin_threshold(mut self, threshold: f32) -> Self {
        self.begin_threshold = threshold;
        self
    }

    pub fn pan_axis(mut self, axis: PanAxis) -> Self {
        self.pan_axis = axis;
        self
    }

    pub fn min_n_points(mut self, min: u32) -> Self {
        self.min_n_points = min.max(1);
        self
    }

    pub fn max_n_points(mut self, max: u32) -> Self {
        self.max_n_points = max;
        self
    }
}

type BeginCallback = Rc<dyn Fn(&PanGesture, Point)>;
type UpdateCallback = Rc<dyn Fn(&PanGesture, Vector2, f32)>;
type EndCallback = Rc<dyn Fn(&PanGesture, Vector2)>;
type CancelCallback = Rc<dyn Fn(&PanGesture)>;

pub struct PanGesture {
    gesture: Rc<Gesture>,

    begin_threshold: Cell<f32>,
    pan_axis: Cell<PanAxis>,
    min_n_points: Cell<u32>,
    max_n_points: Cell<u32>,

    total_delta: Cell<Vector2>,
    history: RefCell<DeltaHistory>,
    use_point: Cell<u64>,
    last_event_time: Cell<u64>,

    begin_callbacks: RefCell<Vec<BeginCallback>>,
    update_callbacks: RefCell<Vec<UpdateCallback>>,
    end_callbacks: RefCell<Vec<EndCallback>>,
    cancel_callbacks: RefCell<Vec<CancelCallback>>,
}

/// Combines the reported points into one delta: the biggest positive and
/// biggest negative movement per axis, summed.
fn delta_from_points(points: &[GesturePoint]) -> Vector2 {
    let mut biggest_pos = Vector2::ZERO;
    let mut biggest_neg = Vector2::ZERO;

    for point in points {
        let dx = point.move_coords.x - point.last_coords.x;
        let dy = point.move_coords.y - point.last_coords.y;

        if dx > 0.0 {
            biggest_pos.x = dx.max(biggest_pos.x);
        } else {
            biggest_neg.x = dx.min(biggest_neg.x);
        }

        if dy > 0.0 {
            biggest_pos.y = dy.max(biggest_pos.y);
        } else {
            biggest_neg.y = dy.min(biggest_neg.y);
        }
    }

    biggest_pos + biggest_neg
}

impl PanGesture {
    pub fn new() -> Rc<Self> {
        Self::with_config(PanConfig::default())
    }

    pub fn with_config(config: PanConfig) -> Rc<Self> {
        let gesture = Gesture::new();

        let pan = Rc::new(PanGesture {
            gesture: Rc::clone(&gesture),
            begin_threshold: Cell::new(config.begin_threshold),
            pan_axis: Cell::new(config.pan_axis),
            min_n_points: Cell::new(config.min_n_points.max(1)),
            max_n_points: Cell::new(config.max_n_points),
            total_delta: Cell::new(Vector2::ZERO),
            history: RefCell::new(DeltaHistory::new()),
            use_point: Cell::new(0),
            last_event_time: Cell::new(0),
            begin_callbacks: RefCell::new(Vec::new()),
            update_callbacks: RefCell::new(Vec::new()),
            end_callbacks: RefCell::new(Vec::new()),
            cancel_callbacks: RefCell::new(Vec::new()),
        });

        gesture.set_recognizer(Rc::downgrade(&(Rc::clone(&pan) as Rc<dyn Recognizer>)));
        pan
    }

    pub fn gesture(&self) -> &Rc<Gesture> {
        &self.gesture
    }

    pub fn begin_threshold(&self) -> f32 {
        self.begin_threshold.get()
    }

    /// Lowering the threshold while the gesture is POSSIBLE re-evaluates
    /// recognition against the displacement accumulated so far.
    pub fn set_begin_threshold(&self, threshold: f32) {
        if self.begin_threshold.get() == threshold {
            return;
        }
        self.begin_threshold.set(threshold);

        if self.gesture.state() == GestureState::Possible {
            let total = self.gesture.n_points() as u32;
            if total >= self.min_n_points.get()
                && (self.max_n_points.get() == 0 || total <= self.max_n_points.get())
                && self.threshold_crossed()
            {
                self.gesture.set_state(GestureState::Recognizing);
            }
        }
    }

    pub fn pan_axis(&self) -> PanAxis {
        self.pan_axis.get()
    }

    pub fn set_pan_axis(&self, axis: PanAxis) {
        self.pan_axis.set(axis);
    }

    pub fn min_n_points(&self) -> u32 {
        self.min_n_points.get()
    }

    pub fn set_min_n_points(&self, min: u32) {
        let max = self.max_n_points.get();
        if min < 1 || (max != 0 && min > max) {
            log::warn!("invalid min_n_points {min} for max_n_points {max}");
            return;
        }
        self.min_n_points.set(min);
    }

    pub fn max_n_points(&self) -> u32 {
        self.max_n_points.get()
    }

    /// Zero allows an unlimited number of points.
    pub fn set_max_n_points(&self, max: u32) {
        if max != 0 && max < self.min_n_points.get() {
            log::warn!(
                "invalid max_n_points {max} for min_n_points {}",
                self.min_n_points.get()
            );
            return;
        }
        self.max_n_points.set(max);
    }

    /// The pan started; the point reports the position the pan began at.
    pub fn on_pan_begin(&self, callback: impl Fn(&PanGesture, Point) + 'static) {
        self.begin_callbacks.borrow_mut().push(Rc::new(callback));
    }

    /// A delta arrived while panning; reports the delta and the total panned
    /// distance.
    pub fn on_pan_update(&self, callback: impl Fn(&PanGesture, Vector2, f32) + 'static) {
        self.update_callbacks.borrow_mut().push(Rc::new(callback));
    }

    /// The pan ended; reports the terminal velocity in pixels per
    /// millisecond.
    pub fn on_pan_end(&self, callback: impl Fn(&PanGesture, Vector2) + 'static) {
        self.end_callbacks.borrow_mut().push(Rc::new(callback));
    }

    pub fn on_pan_cancel(&self, callback: impl Fn(&PanGesture) + 'static) {
        self.cancel_callbacks.borrow_mut().push(Rc::new(callback));
    }

    fn threshold_crossed(&self) -> bool {
        let threshold = self.begin_threshold.get();
        let total = self.total_delta.get();

        match self.pan_axis.get() {
            PanAxis::Both => total.length() >= threshold,
            PanAxis::X => total.x.abs() >= threshold,
            PanAxis::Y => total.y.abs() >= threshold,
        }
    }
}

impl Recognizer for PanGesture {
    fn points_began(&self, gesture: &Rc<Gesture>, points: &[GesturePoint]) {
        let total = gesture.n_points() as u32;
        if total < self.min_n_points.get() {
            return;
        }

        if gesture.state() == GestureState::Possible
            && self.max_n_points.get() != 0
            && total > self.max_n_points.get()
        {
            gesture.set_state(GestureState::Cancelled);
            return;
        }

        if self.history.borrow().is_empty() {
            self.history
                .borrow_mut()
                .push(Vector2::ZERO, points[0].event_time);
        }

        if gesture.state() == GestureState::Possible && self.begin_threshold.get() == 0.0 {
            gesture.set_state(GestureState::Recognizing);
        }

        // If we're already recognizing, set the state again to claim the new
        // point, too.
        if gesture.state() == GestureState::Recognizing {
            gesture.set_state(GestureState::Recognizing);
        }

        self.use_point.set(points[0].index);
        self.last_event_time.set(points[0].event_time);
    }

    fn points_moved(&self, gesture: &Rc<Gesture>, points: &[GesturePoint]) {
        if points[0].index != self.use_point.get() {
            return;
        }

        let delta = delta_from_points(points);
        self.history.borrow_mut().push(delta, points[0].event_time);
        self.last_event_time.set(points[0].event_time);

        self.total_delta.set(self.total_delta.get() + delta);
        let total_distance = self.total_delta.get().length();

        let total = gesture.n_points() as u32;
        if gesture.state() == GestureState::Possible
            && total >= self.min_n_points.get()
            && (self.max_n_points.get() == 0 || total <= self.max_n_points.get())
            && self.threshold_crossed()
        {
            gesture.set_state(GestureState::Recognizing);
        }

        if gesture.state() == GestureState::Recognizing {
            let callbacks: Vec<UpdateCallback> =
                self.update_callbacks.borrow().iter().map(Rc::clone).collect();
            for callback in callbacks {
                callback(self, delta, total_distance);
            }
        }
    }

    fn points_ended(&self, gesture: &Rc<Gesture>, points: &[GesturePoint]) {
        let all_points = gesture.points();
        let total = all_points.len() as u32;
        self.last_event_time.set(points[0].event_time);

        // Enough points survive; hand tracking to one of them and keep
        // going.
        if total - (points.len() as u32) >= self.min_n_points.get() {
            let survivor = if all_points[0].index != points[0].index {
                all_points[0].index
            } else {
                all_points[1].index
            };
            self.use_point.set(survivor);
            return;
        }

        if gesture.state() == GestureState::Recognizing {
            gesture.set_state(GestureState::Completed);
        } else {
            gesture.set_state(GestureState::Cancelled);
        }
    }

    fn points_cancelled(&self, gesture: &Rc<Gesture>, _points: &[GesturePoint]) {
        gesture.set_state(GestureState::Cancelled);
    }

    fn state_changed(&self, gesture: &Rc<Gesture>, old: GestureState, new: GestureState) {
        if old != GestureState::Recognizing && new == GestureState::Recognizing {
            let begin = gesture
                .points()
                .first()
                .map(|p| p.begin_coords)
                .unwrap_or(Point::ZERO);

            let callbacks: Vec<BeginCallback> =
                self.begin_callbacks.borrow().iter().map(Rc::clone).collect();
            for callback in callbacks {
                callback(self, begin);
            }
        }

        if old == GestureState::Recognizing && new == GestureState::Completed {
            let velocity = self.history.borrow().velocity(self.last_event_time.get());

            let callbacks: Vec<EndCallback> =
                self.end_callbacks.borrow().iter().map(Rc::clone).collect();
            for callback in callbacks {
                callback(self, velocity);
            }
        }

        if old == GestureState::Recognizing && new == GestureState::Cancelled {
            let callbacks: Vec<CancelCallback> =
                self.cancel_callbacks.borrow().iter().map(Rc::clone).collect();
            for callback in callbacks {
                callback(self);
            }
        }

        if matches!(new, GestureState::Completed | GestureState::Cancelled) {
            self.total_delta.set(Vector2::ZERO);
            self.history.borrow_mut().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_has_zero_velocity() {
        let history = DeltaHistory::new();
        assert_eq!(history.velocity(100), Vector2::ZERO);
    }

    #[test]
    fn single_entry_has_zero_velocity() {
        let mut history = DeltaHistory::new();
        history.push(Vector2::new(10.0, 0.0), 100);
        assert_eq!(history.velocity(100), Vector2::ZERO);
    }

    #[test]
    fn constant_motion_velocity() {
        let mut history = DeltaHistory::new();
        // 10 px every 10 ms, moving right: 1 px/ms.
        for i in 0..5 {
            history.push(Vector2::new(10.0, 0.0), i * 10);
        }

        let velocity = history.velocity(40);
        // The first entry contributes its delta but opens the window.
        assert!((velocity.x - 50.0 / 40.0).abs() < 1e-6);
        assert_eq!(velocity.y, 0.0);
    }

    #[test]
    fn entries_outside_window_are_ignored() {
        let mut history = DeltaHistory::new();
        history.push(Vector2::new(1000.0, 0.0), 0);
        history.push(Vector2::new(10.0, 0.0), 500);
        history.push(Vector2::new(10.0, 0.0), 510);

        let velocity = history.velocity(510);
        assert!((velocity.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn close_entries_are_coalesced() {
        let mut history = DeltaHistory::new();
        history.push(Vector2::new(10.0, 0.0), 100);
        history.push(Vector2::new(999.0, 0.0), 100);
        history.push(Vector2::new(10.0, 0.0), 110);

        let velocity = history.velocity(110);
        assert!((velocity.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn delta_from_points_sums_extremes() {
        let device = grasp_core::InputDevice::new(grasp_core::DeviceType::Pointer, "p");
        let make = |last: Point, moved: Point| {
            let event = grasp_core::Event::new(
                grasp_core::EventKind::Motion,
                std::rc::Rc::clone(&device),
                moved,
                0,
            );
            GesturePoint {
                index: 0,
                begin_coords: last,
                move_coords: moved,
                end_coords: Point::ZERO,
                latest_coords: moved,
                last_coords: last,
                event_time: 0,
                latest_event: event,
            }
        };

        let points = [
            make(Point::new(0.0, 0.0), Point::new(5.0, -2.0)),
            make(Point::new(0.0, 0.0), Point::new(-3.0, 4.0)),
        ];

        let delta = delta_from_points(&points);
        assert_eq!(delta, Vector2::new(2.0, 2.0));
    }
}
