//! Ambient one-shot timer facility.
//!
//! Recognizers schedule a timer with the host's event loop and return; the
//! timer firing is a fresh top-level call into the state machine. The driver
//! is installed per thread by the host (a real main loop in production, a
//! manually advanced loop in tests).

use std::cell::RefCell;
use std::rc::Rc;

/// Handle for a scheduled one-shot timer. `TimerId::INERT` is returned when
/// no driver is installed and is ignored by [`cancel_timer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

impl TimerId {
    pub const INERT: TimerId = TimerId(0);

    pub fn is_inert(self) -> bool {
        self == Self::INERT
    }
}

pub trait TimerDriver {
    /// Schedules a one-shot callback after `delay_ms`. Returned ids must be
    /// non-zero.
    fn schedule(&self, delay_ms: u64, callback: Box<dyn FnOnce()>) -> TimerId;

    fn cancel(&self, id: TimerId);
}

thread_local! {
    static TIMER_DRIVER: RefCell<Option<Rc<dyn TimerDriver>>> = RefCell::new(None);
}

pub fn install_timer_driver(driver: Rc<dyn TimerDriver>) {
    TIMER_DRIVER.with(|slot| *slot.borrow_mut() = Some(driver));
}

pub fn clear_timer_driver() {
    TIMER_DRIVER.with(|slot| *slot.borrow_mut() = None);
}

fn current_driver() -> Option<Rc<dyn TimerDriver>> {
    TIMER_DRIVER.with(|slot| slot.borrow().clone())
}

/// Schedules a one-shot timer with the installed driver.
///
/// Scheduling without an installed driver is a host contract violation: the
/// error is logged and an inert handle is returned, the callback never
/// fires.
pub fn schedule_timer(delay_ms: u64, callback: Box<dyn FnOnce()>) -> TimerId {
    match current_driver() {
        Some(driver) => driver.schedule(delay_ms, callback),
        None => {
            log::error!("schedule_timer called with no timer driver installed");
            TimerId::INERT
        }
    }
}

pub fn cancel_timer(id: TimerId) {
    if id.is_inert() {
        return;
    }

    if let Some(driver) = current_driver() {
        driver.cancel(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingDriver {
        scheduled: Cell<u64>,
        cancelled: Cell<u64>,
    }

    impl TimerDriver for CountingDriver {
        fn schedule(&self, _delay_ms: u64, _callback: Box<dyn FnOnce()>) -> TimerId {
            self.scheduled.set(self.scheduled.get() + 1);
            TimerId(self.scheduled.get())
        }

        fn cancel(&self, _id: TimerId) {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }

    #[test]
    fn no_driver_returns_inert_handle() {
        clear_timer_driver();
        let id = schedule_timer(10, Box::new(|| {}));
        assert!(id.is_inert());
        cancel_timer(id);
    }

    #[test]
    fn installed_driver_receives_calls() {
        let driver = Rc::new(CountingDriver {
            scheduled: Cell::new(0),
            cancelled: Cell::new(0),
        });
        install_timer_driver(driver.clone());

        let id = schedule_timer(10, Box::new(|| {}));
        assert_eq!(id, TimerId(1));
        cancel_timer(id);
        assert_eq!(driver.cancelled.get(), 1);

        clear_timer_driver();
    }
}
