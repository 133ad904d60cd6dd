//! The concrete recognizers driven through the stage and the test clock.

use std::cell::Cell;
use std::rc::Rc;

use grasp_core::geometry::Vector2;
use grasp_core::gesture::GestureState;
use grasp_recognizers::{
    ClickConfig, ClickGesture, LongPressConfig, LongPressGesture, PanAxis, PanConfig, PanGesture,
};

use crate::stage::TestStage;

#[test]
fn single_click_completes_on_release() {
    let stage = TestStage::new();
    let click = ClickGesture::new();
    stage.add_gesture(stage.root(), click.gesture());

    let clicked = Rc::new(Cell::new(0u32));
    let count = Rc::clone(&clicked);
    click.on_clicked(move |_| count.set(count.get() + 1));

    stage.press(15.0, 15.0);
    assert!(click.pressed());
    assert_eq!(click.gesture().state(), GestureState::Possible);

    stage.release(15.0, 15.0);
    assert_eq!(clicked.get(), 1);
    assert!(!click.pressed());
    assert_eq!(click.gesture().state(), GestureState::Waiting);
}

#[test]
fn click_reports_press_details() {
    let stage = TestStage::new();
    let click = ClickGesture::new();
    stage.add_gesture(stage.root(), click.gesture());

    let seen_button = Rc::new(Cell::new(0u32));
    let button = Rc::clone(&seen_button);
    click.on_clicked(move |click| button.set(click.button()));

    stage.press_button(20.0, 30.0, 3, grasp_core::ModifierState::NONE);
    assert_eq!(click.coords(), grasp_core::Point::new(20.0, 30.0));

    stage.release_button(20.0, 30.0, 3, grasp_core::ModifierState::NONE);
    assert_eq!(seen_button.get(), 3);
}

#[test]
fn click_cancels_when_moving_past_threshold() {
    let stage = TestStage::new();
    let click = ClickGesture::new();
    stage.add_gesture(stage.root(), click.gesture());

    let clicked = Rc::new(Cell::new(false));
    let flag = Rc::clone(&clicked);
    click.on_clicked(move |_| flag.set(true));

    stage.press(15.0, 15.0);
    stage.motion(40.0, 15.0);
    assert_eq!(click.gesture().state(), GestureState::Cancelled);
    assert!(!click.pressed());

    stage.release(40.0, 15.0);
    assert!(!clicked.get());
    assert_eq!(click.gesture().state(), GestureState::Waiting);
}

#[test]
fn double_click_completes_within_timeout() {
    let stage = TestStage::new();
    let click = ClickGesture::with_config(ClickConfig::default().n_clicks_required(2));
    stage.add_gesture(stage.root(), click.gesture());

    let clicked = Rc::new(Cell::new(0u32));
    let count = Rc::clone(&clicked);
    click.on_clicked(move |_| count.set(count.get() + 1));

    stage.press(15.0, 15.0);
    stage.release(15.0, 15.0);
    assert_eq!(clicked.get(), 0);
    assert_eq!(click.gesture().state(), GestureState::Possible);

    stage.advance(100);
    stage.press(16.0, 15.0);
    stage.release(16.0, 15.0);
    assert_eq!(clicked.get(), 1);
    assert_eq!(click.gesture().state(), GestureState::Waiting);
}

#[test]
fn double_click_times_out_between_clicks() {
    let stage = TestStage::new();
    let click = ClickGesture::with_config(ClickConfig::default().n_clicks_required(2));
    stage.add_gesture(stage.root(), click.gesture());

    let clicked = Rc::new(Cell::new(false));
    let flag = Rc::clone(&clicked);
    click.on_clicked(move |_| flag.set(true));

    stage.press(15.0, 15.0);
    stage.release(15.0, 15.0);

    stage.advance(400);
    assert_eq!(click.gesture().state(), GestureState::Waiting);

    // The next press starts over as a first click.
    stage.press(15.0, 15.0);
    stage.release(15.0, 15.0);
    stage.advance(400);
    assert!(!clicked.get());
}

#[test]
fn double_click_cancels_when_second_press_strays() {
    let stage = TestStage::new();
    let click = ClickGesture::with_config(ClickConfig::default().n_clicks_required(2));
    stage.add_gesture(stage.root(), click.gesture());

    stage.press(15.0, 15.0);
    stage.release(15.0, 15.0);

    stage.advance(50);
    stage.press(80.0, 15.0);
    assert_eq!(click.gesture().state(), GestureState::Cancelled);
    stage.release(80.0, 15.0);
    assert_eq!(click.gesture().state(), GestureState::Waiting);
}

#[test]
fn click_pressed_follows_crossings() {
    let stage = TestStage::new();
    let click = ClickGesture::new();
    stage.add_gesture(stage.root(), click.gesture());

    let clicked = Rc::new(Cell::new(false));
    let flag = Rc::clone(&clicked);
    click.on_clicked(move |_| flag.set(true));

    stage.press(15.0, 15.0);
    assert!(click.pressed());

    stage.crossing(grasp_core::EventKind::Leave, stage.root(), None);
    assert!(!click.pressed());

    stage.crossing(grasp_core::EventKind::Enter, stage.root(), None);
    assert!(click.pressed());

    stage.release(15.0, 15.0);
    assert!(clicked.get());
}

#[test]
fn long_press_fires_after_duration() {
    let stage = TestStage::new();
    let long_press = LongPressGesture::new();
    stage.add_gesture(stage.root(), long_press.gesture());

    let began = Rc::new(Cell::new(false));
    let ended = Rc::new(Cell::new(false));
    let begin_flag = Rc::clone(&began);
    let end_flag = Rc::clone(&ended);
    long_press.on_long_press_begin(move |_| begin_flag.set(true));
    long_press.on_long_press_end(move |_| end_flag.set(true));

    stage.press(15.0, 15.0);
    assert_eq!(long_press.gesture().state(), GestureState::Possible);
    assert!(!began.get());

    stage.advance(500);
    assert!(began.get());
    assert_eq!(long_press.gesture().state(), GestureState::Recognizing);

    stage.release(15.0, 15.0);
    assert!(ended.get());
    assert_eq!(long_press.gesture().state(), GestureState::Waiting);
}

#[test]
fn long_press_cancelled_by_early_release() {
    let stage = TestStage::new();
    let long_press = LongPressGesture::new();
    stage.add_gesture(stage.root(), long_press.gesture());

    let began = Rc::new(Cell::new(false));
    let flag = Rc::clone(&began);
    long_press.on_long_press_begin(move |_| flag.set(true));

    stage.press(15.0, 15.0);
    stage.advance(100);
    stage.release(15.0, 15.0);

    assert!(!began.get());
    assert_eq!(long_press.gesture().state(), GestureState::Waiting);

    // The timer was dropped together with the gesture cycle.
    stage.advance(1000);
    assert!(!began.get());
}

#[test]
fn long_press_cancelled_by_movement() {
    let stage = TestStage::new();
    let long_press = LongPressGesture::new();
    stage.add_gesture(stage.root(), long_press.gesture());

    stage.press(15.0, 15.0);
    stage.motion(40.0, 15.0);
    assert_eq!(long_press.gesture().state(), GestureState::Cancelled);

    stage.release(40.0, 15.0);
    assert_eq!(long_press.gesture().state(), GestureState::Waiting);
}

#[test]
fn long_press_with_zero_duration_recognizes_immediately() {
    let stage = TestStage::new();
    let long_press =
        LongPressGesture::with_config(LongPressConfig::default().long_press_duration_ms(0));
    stage.add_gesture(stage.root(), long_press.gesture());

    stage.press(15.0, 15.0);
    assert_eq!(long_press.gesture().state(), GestureState::Recognizing);

    stage.release(15.0, 15.0);
    assert_eq!(long_press.gesture().state(), GestureState::Waiting);
}

#[test]
fn long_press_cancel_notification_after_begin() {
    let stage = TestStage::new();
    let long_press = LongPressGesture::new();
    stage.add_gesture(stage.root(), long_press.gesture());

    let cancelled = Rc::new(Cell::new(false));
    let flag = Rc::clone(&cancelled);
    long_press.on_long_press_cancel(move |_| flag.set(true));

    stage.press(15.0, 15.0);
    stage.advance(500);
    assert_eq!(long_press.gesture().state(), GestureState::Recognizing);

    long_press.gesture().set_state(GestureState::Cancelled);
    assert!(cancelled.get());
}

#[test]
fn pan_begins_after_threshold() {
    let stage = TestStage::new();
    let pan = PanGesture::new();
    stage.add_gesture(stage.root(), pan.gesture());

    let begin_at = Rc::new(Cell::new(None));
    let updates = Rc::new(Cell::new(0u32));
    let begin_slot = Rc::clone(&begin_at);
    let update_count = Rc::clone(&updates);
    pan.on_pan_begin(move |_, point| begin_slot.set(Some(point)));
    pan.on_pan_update(move |_, _, _| update_count.set(update_count.get() + 1));

    stage.press(10.0, 10.0);
    stage.advance(10);
    stage.motion(18.0, 10.0);
    assert_eq!(pan.gesture().state(), GestureState::Possible);
    assert_eq!(begin_at.get(), None);

    stage.advance(10);
    stage.motion(28.0, 10.0);
    assert_eq!(pan.gesture().state(), GestureState::Recognizing);
    assert_eq!(begin_at.get(), Some(grasp_core::Point::new(10.0, 10.0)));
    assert_eq!(updates.get(), 1);

    stage.advance(10);
    stage.motion(38.0, 10.0);
    assert_eq!(updates.get(), 2);

    stage.release(38.0, 10.0);
    assert_eq!(pan.gesture().state(), GestureState::Waiting);
}

#[test]
fn pan_reports_end_velocity() {
    let stage = TestStage::new();
    let pan = PanGesture::with_config(PanConfig::default().begin_threshold(0.0));
    stage.add_gesture(stage.root(), pan.gesture());

    let velocity = Rc::new(Cell::new(Vector2::ZERO));
    let slot = Rc::clone(&velocity);
    pan.on_pan_end(move |_, v| slot.set(v));

    stage.press(10.0, 10.0);
    for i in 1..=3u64 {
        stage.advance(10);
        stage.motion(10.0 + 10.0 * i as f32, 10.0);
    }
    stage.advance(10);
    stage.release(40.0, 10.0);

    // 30 px over the 30 ms from the history anchor to the last motion.
    let v = velocity.get();
    assert!((v.x - 1.0).abs() < 1e-3, "unexpected velocity {v:?}");
    assert_eq!(v.y, 0.0);
}

#[test]
fn pan_axis_constraint_filters_displacement() {
    let stage = TestStage::new();
    let pan = PanGesture::with_config(PanConfig::default().pan_axis(PanAxis::X));
    stage.add_gesture(stage.root(), pan.gesture());

    stage.press(10.0, 10.0);
    stage.advance(10);
    stage.motion(10.0, 60.0);
    assert_eq!(pan.gesture().state(), GestureState::Possible);

    stage.advance(10);
    stage.motion(40.0, 60.0);
    assert_eq!(pan.gesture().state(), GestureState::Recognizing);

    stage.release(40.0, 60.0);
}

#[test]
fn pan_cancel_notification() {
    let stage = TestStage::new();
    let pan = PanGesture::with_config(PanConfig::default().begin_threshold(0.0));
    stage.add_gesture(stage.root(), pan.gesture());

    let cancelled = Rc::new(Cell::new(false));
    let flag = Rc::clone(&cancelled);
    pan.on_pan_cancel(move |_| flag.set(true));

    stage.press(10.0, 10.0);
    assert_eq!(pan.gesture().state(), GestureState::Recognizing);

    pan.gesture().set_state(GestureState::Cancelled);
    assert!(cancelled.get());
}

#[test]
fn pan_lowering_threshold_reevaluates() {
    let stage = TestStage::new();
    let pan = PanGesture::with_config(PanConfig::default().begin_threshold(100.0));
    stage.add_gesture(stage.root(), pan.gesture());

    stage.press(10.0, 10.0);
    stage.advance(10);
    stage.motion(40.0, 10.0);
    assert_eq!(pan.gesture().state(), GestureState::Possible);

    pan.set_begin_threshold(20.0);
    assert_eq!(pan.gesture().state(), GestureState::Recognizing);

    stage.release(40.0, 10.0);
}

#[test]
fn pan_too_many_points_cancels() {
    let stage = TestStage::new();
    let pan = PanGesture::with_config(PanConfig::default().max_n_points(1));
    stage.add_gesture(stage.root(), pan.gesture());

    stage.touch_begin(0, 10.0, 10.0);
    assert_eq!(pan.gesture().state(), GestureState::Possible);

    stage.touch_begin(1, 20.0, 10.0);
    assert_eq!(pan.gesture().state(), GestureState::Cancelled);

    stage.touch_end(0, 10.0, 10.0);
    stage.touch_end(1, 20.0, 10.0);
    assert_eq!(pan.gesture().state(), GestureState::Waiting);
}
