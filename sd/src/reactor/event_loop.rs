//! EventLoop - tokio current-thread runtime driving a LocalSet
//!
//! Callbacks are spawned as local tasks, so they may capture `Rc`/`RefCell`
//! state. The runtime is built on the first `start`, which keeps construction
//! infallible and lets callbacks be queued before the loop ever runs.

use std::cell::{Cell, OnceCell};
use std::mem::ManuallyDrop;
use std::rc::Rc;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Notify;
use tokio::task::LocalSet;
use tracing::{debug, info, trace};

use super::{Callback, Reactor};
use crate::delay::Delay;
use crate::error::{DelayError, DelayResult};

thread_local! {
    // Never dropped: tearing down a runtime during thread-local destruction panics.
    static DEFAULT_LOOP: ManuallyDrop<Rc<EventLoop>> = ManuallyDrop::new(Rc::new(EventLoop::new()));
}

/// The calling thread's shared loop, used by [`Delay::new`]
pub fn default_loop() -> Rc<EventLoop> {
    DEFAULT_LOOP.with(|l| Rc::clone(l))
}

/// Cooperative single-threaded event loop
pub struct EventLoop {
    runtime: OnceCell<Runtime>,
    tasks: LocalSet,
    running: Cell<bool>,
    stop_requested: Cell<bool>,
    stop_signal: Notify,
    scheduled: Cell<u64>,
    dispatched: Rc<Cell<u64>>,
}

impl EventLoop {
    /// Create a new, idle loop
    pub fn new() -> Self {
        debug!("EventLoop::new: creating event loop");
        Self {
            runtime: OnceCell::new(),
            tasks: LocalSet::new(),
            running: Cell::new(false),
            stop_requested: Cell::new(false),
            stop_signal: Notify::new(),
            scheduled: Cell::new(0),
            dispatched: Rc::new(Cell::new(0)),
        }
    }

    /// Create a delay driven by this loop
    pub fn delay(self: &Rc<Self>) -> Delay {
        Delay::with_loop(Rc::clone(self) as Rc<dyn Reactor>)
    }

    /// Total callbacks scheduled on this loop so far
    pub fn scheduled_count(&self) -> u64 {
        self.scheduled.get()
    }

    fn runtime(&self) -> DelayResult<&Runtime> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DelayError::Runtime(e.to_string()))?;
        debug!("EventLoop::runtime: built current-thread runtime");
        Ok(self.runtime.get_or_init(|| runtime))
    }

    fn spawn(&self, delay: Option<Duration>, callback: Callback) {
        self.scheduled.set(self.scheduled.get() + 1);
        let dispatched = Rc::clone(&self.dispatched);
        self.tasks.spawn_local(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            // Counted before the call so a panicking callback is not pending forever
            dispatched.set(dispatched.get() + 1);
            callback();
        });
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactor for EventLoop {
    fn schedule(&self, callback: Callback) {
        trace!("EventLoop::schedule");
        self.spawn(None, callback);
    }

    fn schedule_after(&self, delay: Duration, callback: Callback) {
        trace!(delay_ms = delay.as_millis() as u64, "EventLoop::schedule_after");
        self.spawn(Some(delay), callback);
    }

    fn start(&self) -> DelayResult<()> {
        if self.running.get() {
            return Err(DelayError::LoopRunning);
        }
        if Handle::try_current().is_ok() {
            return Err(DelayError::Runtime(
                "cannot start an event loop from inside a running runtime".to_string(),
            ));
        }
        let runtime = self.runtime()?;

        self.running.set(true);
        self.stop_requested.set(false);
        info!("EventLoop::start: running");

        self.tasks.block_on(runtime, async {
            loop {
                // Created before the flag check so a stop in between is not missed
                let stopped = self.stop_signal.notified();
                if self.stop_requested.get() {
                    break;
                }
                stopped.await;
            }
        });

        self.running.set(false);
        info!(scheduled = self.scheduled.get(), "EventLoop::start: stopped");
        Ok(())
    }

    fn stop(&self) {
        debug!(running = self.running.get(), "EventLoop::stop");
        self.stop_requested.set(true);
        self.stop_signal.notify_waiters();
    }

    fn is_running(&self) -> bool {
        self.running.get()
    }

    fn has_pending_work(&self) -> bool {
        self.scheduled.get() > self.dispatched.get()
    }
}
