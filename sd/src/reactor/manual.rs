//! Hand-cranked reactor for deterministic unit tests

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use super::{Callback, Reactor};
use crate::error::{DelayError, DelayResult};

/// Queues callbacks until the test drains them with [`ManualLoop::run_pending`]
///
/// Timers are treated as zero-delay; ordering is queue order.
#[derive(Default)]
pub(crate) struct ManualLoop {
    queue: RefCell<VecDeque<Callback>>,
    running: Cell<bool>,
    stop_requested: Cell<bool>,
}

impl ManualLoop {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of queued callbacks
    pub(crate) fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run one queued callback; false if the queue was empty
    pub(crate) fn tick(&self) -> bool {
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Run callbacks until the queue is empty, returning how many ran
    pub(crate) fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.tick() {
            ran += 1;
        }
        ran
    }
}

impl Reactor for ManualLoop {
    fn schedule(&self, callback: Callback) {
        self.queue.borrow_mut().push_back(callback);
    }

    fn schedule_after(&self, _delay: Duration, callback: Callback) {
        self.schedule(callback);
    }

    /// Drains the queue until stopped or empty
    fn start(&self) -> DelayResult<()> {
        if self.running.replace(true) {
            return Err(DelayError::LoopRunning);
        }
        self.stop_requested.set(false);
        while !self.stop_requested.get() && self.tick() {}
        self.running.set(false);
        Ok(())
    }

    fn stop(&self) {
        self.stop_requested.set(true);
    }

    fn is_running(&self) -> bool {
        self.running.get()
    }

    fn has_pending_work(&self) -> bool {
        !self.queue.borrow().is_empty()
    }
}
