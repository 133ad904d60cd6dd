use super::*;
use crate::device::DeviceType;
use crate::geometry::Point;

fn pointer_event(kind: EventKind, x: f32, y: f32) -> Event {
    let device = InputDevice::new(DeviceType::Pointer, "test-pointer");
    Event::new(kind, device, Point::new(x, y), 0)
}

fn press_on(gesture: &Rc<Gesture>) -> Rc<InputDevice> {
    let event = pointer_event(EventKind::ButtonPress, 15.0, 15.0);
    assert!(gesture.should_handle_sequence(&event));
    gesture.handle_event(&event);
    Rc::clone(&event.device)
}

fn release_on(gesture: &Rc<Gesture>, device: &Rc<InputDevice>) {
    let mut event = pointer_event(EventKind::ButtonRelease, 15.0, 15.0);
    event.device = Rc::clone(device);
    event.source_device = Rc::clone(device);
    gesture.handle_event(&event);
}

#[test]
fn starts_in_waiting() {
    let gesture = Gesture::new();
    assert_eq!(gesture.state(), GestureState::Waiting);
    assert_eq!(gesture.n_points(), 0);
}

#[test]
fn press_moves_to_possible_and_registers_point() {
    let gesture = Gesture::with_name("gesture");
    let device = press_on(&gesture);

    assert_eq!(gesture.state(), GestureState::Possible);
    assert_eq!(gesture.n_points(), 1);
    assert_eq!(gesture.points()[0].begin_coords, Point::new(15.0, 15.0));

    release_on(&gesture, &device);
    assert_eq!(gesture.state(), GestureState::Possible);
    assert_eq!(gesture.n_points(), 0);

    gesture.set_state(GestureState::Cancelled);
    assert_eq!(gesture.state(), GestureState::Waiting);
}

#[test]
fn cancelled_gesture_keeps_absorbing_until_release() {
    let gesture = Gesture::new();
    let device = press_on(&gesture);

    gesture.set_state(GestureState::Cancelled);
    assert_eq!(gesture.state(), GestureState::Cancelled);
    assert_eq!(gesture.n_points(), 0);

    // Still holding the point; motion is absorbed silently.
    let mut motion = pointer_event(EventKind::Motion, 20.0, 20.0);
    motion.device = Rc::clone(&device);
    motion.source_device = Rc::clone(&device);
    gesture.handle_event(&motion);
    assert_eq!(gesture.state(), GestureState::Cancelled);

    release_on(&gesture, &device);
    assert_eq!(gesture.state(), GestureState::Waiting);
}

#[test]
fn refused_sequences() {
    let gesture = Gesture::new();

    // Keyboards cannot start points.
    let keyboard = InputDevice::new(DeviceType::Keyboard, "kbd");
    let event = Event::new(EventKind::ButtonPress, keyboard, Point::ZERO, 0);
    assert!(!gesture.should_handle_sequence(&event));
    assert_eq!(gesture.state(), GestureState::Waiting);

    // A second source device is refused while points are held.
    press_on(&gesture);
    let other = InputDevice::new(DeviceType::Pointer, "other-pointer");
    let event = Event::new(EventKind::ButtonPress, other, Point::ZERO, 0)
        .with_sequence(TouchSequence(9));
    assert!(!gesture.should_handle_sequence(&event));
}

#[test]
fn synthetic_events_are_not_dispatched() {
    let gesture = Gesture::new();
    let device = press_on(&gesture);

    let mut motion = pointer_event(EventKind::Motion, 99.0, 99.0)
        .with_flags(EventFlags::SYNTHETIC);
    motion.device = Rc::clone(&device);
    motion.source_device = Rc::clone(&device);
    gesture.handle_event(&motion);

    assert_eq!(gesture.points()[0].latest_coords, Point::new(15.0, 15.0));
}

#[test]
fn invalid_transition_is_refused() {
    let gesture = Gesture::new();
    press_on(&gesture);
    assert_eq!(gesture.state(), GestureState::Possible);

    gesture.set_state(GestureState::Waiting);
    assert_eq!(gesture.state(), GestureState::Possible);
}

#[test]
fn cancel_request_is_always_silent() {
    let gesture = Gesture::new();
    gesture.set_state(GestureState::Cancelled);
    assert_eq!(gesture.state(), GestureState::Waiting);

    gesture.set_state(GestureState::Possible);
    gesture.set_state(GestureState::Cancelled);
    gesture.set_state(GestureState::Cancelled);
    assert_eq!(gesture.state(), GestureState::Waiting);
}

#[test]
fn completed_request_goes_through_recognizing() {
    let gesture = Gesture::new();
    let observed = Rc::new(std::cell::RefCell::new(Vec::new()));
    let log = Rc::clone(&observed);
    gesture.add_state_observer(move |_, _, new| log.borrow_mut().push(new));

    gesture.set_state(GestureState::Possible);
    gesture.set_state(GestureState::Completed);

    assert_eq!(
        *observed.borrow(),
        vec![
            GestureState::Possible,
            GestureState::Recognizing,
            GestureState::Completed,
            GestureState::Waiting
        ]
    );
}

#[test]
fn global_inhibit_move_to_possible() {
    let gesture_1 = Gesture::with_name("gesture-1");
    let gesture_2 = Gesture::with_name("gesture-2");

    gesture_1.set_state(GestureState::Possible);
    gesture_1.set_state(GestureState::Recognizing);
    assert_eq!(gesture_1.state(), GestureState::Recognizing);

    gesture_2.set_state(GestureState::Possible);
    assert_eq!(gesture_2.state(), GestureState::Waiting);

    gesture_1.set_state(GestureState::Completed);
    gesture_2.set_state(GestureState::Possible);
    assert_eq!(gesture_1.state(), GestureState::Waiting);
    assert_eq!(gesture_2.state(), GestureState::Possible);

    gesture_2.set_state(GestureState::Cancelled);
}

#[test]
fn global_cancel_on_recognize() {
    let gesture_1 = Gesture::with_name("gesture-1");
    let gesture_2 = Gesture::with_name("gesture-2");

    gesture_1.set_state(GestureState::Possible);
    gesture_2.set_state(GestureState::Possible);
    assert_eq!(gesture_1.state(), GestureState::Possible);
    assert_eq!(gesture_2.state(), GestureState::Possible);

    let first_change = Rc::new(std::cell::Cell::new(None));
    let captured = Rc::clone(&first_change);
    gesture_2.add_state_observer(move |_, _, new| {
        if captured.get().is_none() {
            captured.set(Some(new));
        }
    });

    gesture_1.set_state(GestureState::Recognizing);
    assert_eq!(gesture_1.state(), GestureState::Recognizing);
    assert_eq!(first_change.get(), Some(GestureState::Cancelled));
    assert_eq!(gesture_2.state(), GestureState::Waiting);

    gesture_1.set_state(GestureState::Completed);
}

#[test]
fn global_recognize_independently() {
    let gesture_1 = Gesture::with_name("gesture-1");
    let gesture_2 = Gesture::with_name("gesture-2");

    gesture_2.recognize_independently_from(&gesture_1);

    gesture_1.set_state(GestureState::Possible);
    gesture_2.set_state(GestureState::Possible);

    gesture_1.set_state(GestureState::Recognizing);
    assert_eq!(gesture_1.state(), GestureState::Recognizing);
    assert_eq!(gesture_2.state(), GestureState::Possible);

    gesture_2.set_state(GestureState::Recognizing);
    assert_eq!(gesture_1.state(), GestureState::Recognizing);
    assert_eq!(gesture_2.state(), GestureState::Recognizing);

    gesture_1.set_state(GestureState::Completed);
    gesture_2.set_state(GestureState::Completed);
}

#[test]
fn global_recognize_independently_is_directional() {
    let gesture_1 = Gesture::with_name("gesture-1");
    let gesture_2 = Gesture::with_name("gesture-2");

    // The wrong direction: gesture_1 may start while gesture_2 runs, which
    // does not help gesture_2.
    gesture_1.recognize_independently_from(&gesture_2);

    gesture_1.set_state(GestureState::Possible);
    gesture_2.set_state(GestureState::Possible);

    gesture_1.set_state(GestureState::Recognizing);
    assert_eq!(gesture_1.state(), GestureState::Recognizing);
    assert_eq!(gesture_2.state(), GestureState::Waiting);

    gesture_1.set_state(GestureState::Completed);
}

#[test]
fn may_recognize_predicate_blocks_possible_entry() {
    let gesture = Gesture::new();
    gesture.add_may_recognize_predicate(|_| false);

    gesture.set_state(GestureState::Possible);
    assert_eq!(gesture.state(), GestureState::Waiting);
}

#[test]
fn may_recognize_predicate_forces_cancel_on_recognize() {
    let gesture = Gesture::new();
    let armed = Rc::new(std::cell::Cell::new(false));
    let gate = Rc::clone(&armed);
    gesture.add_may_recognize_predicate(move |_| !gate.get());

    gesture.set_state(GestureState::Possible);
    assert_eq!(gesture.state(), GestureState::Possible);

    armed.set(true);
    gesture.set_state(GestureState::Recognizing);
    assert_eq!(gesture.state(), GestureState::Waiting);
}

#[test]
fn may_recognize_first_false_wins() {
    let gesture = Gesture::new();
    let second_ran = Rc::new(std::cell::Cell::new(false));
    let flag = Rc::clone(&second_ran);

    gesture.add_may_recognize_predicate(|_| false);
    gesture.add_may_recognize_predicate(move |_| {
        flag.set(true);
        true
    });

    gesture.set_state(GestureState::Possible);
    assert_eq!(gesture.state(), GestureState::Waiting);
    assert!(!second_ran.get());
}

#[test]
fn failure_requirement_resolves_by_cancellation() {
    let gesture_1 = Gesture::with_name("gesture-1");
    let gesture_2 = Gesture::with_name("gesture-2");

    gesture_1.require_failure_of(&gesture_2);

    gesture_1.set_state(GestureState::Possible);
    gesture_2.set_state(GestureState::Possible);

    gesture_1.set_state(GestureState::Recognizing);
    assert_eq!(gesture_1.state(), GestureState::RecognizePending);
    assert_eq!(gesture_2.state(), GestureState::Possible);

    gesture_2.set_state(GestureState::Cancelled);
    assert_eq!(gesture_1.state(), GestureState::Recognizing);
    assert_eq!(gesture_2.state(), GestureState::Waiting);

    gesture_1.set_state(GestureState::Completed);
}

#[test]
fn failure_requirement_resolves_by_recognition() {
    let gesture_1 = Gesture::with_name("gesture-1");
    let gesture_2 = Gesture::with_name("gesture-2");

    gesture_1.require_failure_of(&gesture_2);
    // Keep the pair from cancelling each other through global arbitration.
    gesture_1.recognize_independently_from(&gesture_2);
    gesture_2.recognize_independently_from(&gesture_1);

    gesture_1.set_state(GestureState::Possible);
    gesture_2.set_state(GestureState::Possible);

    gesture_1.set_state(GestureState::Recognizing);
    assert_eq!(gesture_1.state(), GestureState::RecognizePending);

    gesture_2.set_state(GestureState::Recognizing);
    assert_eq!(gesture_1.state(), GestureState::Waiting);
    assert_eq!(gesture_2.state(), GestureState::Recognizing);

    gesture_2.set_state(GestureState::Completed);
}

#[test]
fn weak_edges_do_not_keep_peers_alive() {
    let gesture_1 = Gesture::new();
    let gesture_2 = Gesture::new();

    gesture_1.can_not_cancel(&gesture_2);
    gesture_1.require_failure_of(&gesture_2);
    gesture_2.recognize_independently_from(&gesture_1);

    let weak_2 = Rc::downgrade(&gesture_2);
    drop(gesture_2);
    assert!(weak_2.upgrade().is_none());

    let weak_1 = Rc::downgrade(&gesture_1);
    drop(gesture_1);
    assert!(weak_1.upgrade().is_none());
}

#[test]
fn multiple_buttons_keep_single_point() {
    let gesture = Gesture::new();
    let device = press_on(&gesture);
    assert_eq!(gesture.n_points(), 1);

    // A second button on the same pointer does not create a point.
    let mut press = pointer_event(EventKind::ButtonPress, 5.0, 5.0);
    press.device = Rc::clone(&device);
    press.source_device = Rc::clone(&device);
    gesture.handle_event(&press);
    assert_eq!(gesture.n_points(), 1);

    // The first release keeps the point, the second removes it.
    release_on(&gesture, &device);
    assert_eq!(gesture.n_points(), 1);
    release_on(&gesture, &device);
    assert_eq!(gesture.n_points(), 0);

    gesture.set_state(GestureState::Cancelled);
    assert_eq!(gesture.state(), GestureState::Waiting);
}
