//! Manually advanced main loop for tests.
//!
//! Owns the test clock and a list of pending one-shot timers. Advancing the
//! clock fires due timers in deadline order, each as a fresh top-level call,
//! which is exactly the suspension model recognizers are written against.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use grasp_core::main_loop::{self, TimerDriver, TimerId};

struct ScheduledTimer {
    id: TimerId,
    deadline: u64,
    callback: Box<dyn FnOnce()>,
}

pub struct TestMainLoop {
    now_ms: Cell<u64>,
    next_id: Cell<u64>,
    timers: RefCell<Vec<ScheduledTimer>>,
}

impl TestMainLoop {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            now_ms: Cell::new(0),
            next_id: Cell::new(1),
            timers: RefCell::new(Vec::new()),
        })
    }

    /// Installs this loop as the thread's ambient timer driver.
    pub fn install(self: &Rc<Self>) {
        let driver: Rc<dyn TimerDriver> = Rc::clone(self) as Rc<dyn TimerDriver>;
        main_loop::install_timer_driver(driver);
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Moves the clock forward, firing every timer that becomes due, in
    /// deadline order. Callbacks run with the clock set to their deadline
    /// and may schedule further timers, which fire in the same advance if
    /// they are due.
    pub fn advance(&self, delta_ms: u64) {
        let target = self.now_ms.get() + delta_ms;

        loop {
            let next = {
                let timers = self.timers.borrow();
                timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| t.deadline)
                    .map(|(i, _)| i)
            };

            let Some(index) = next else { break };

            let timer = self.timers.borrow_mut().remove(index);
            self.now_ms.set(timer.deadline.max(self.now_ms.get()));
            (timer.callback)();
        }

        self.now_ms.set(target);
    }
}

impl TimerDriver for TestMainLoop {
    fn schedule(&self, delay_ms: u64, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        self.timers.borrow_mut().push(ScheduledTimer {
            id,
            deadline: self.now_ms.get() + delay_ms,
            callback,
        });

        id
    }

    fn cancel(&self, id: TimerId) {
        self.timers.borrow_mut().retain(|t| t.id != id);
    }
}
