//! Event loop capability
//!
//! A delay never blocks and never spawns threads: it only asks its loop to run a
//! callback "soon" (zero-delay) and, through `wait`, to run until stopped. Any
//! type implementing [`Reactor`] can drive a delay; [`EventLoop`] is the
//! tokio-backed implementation used by default.

mod event_loop;
#[cfg(test)]
pub(crate) mod manual;

pub use event_loop::{EventLoop, default_loop};

use std::time::Duration;

use crate::error::DelayResult;

/// A unit of work queued on a loop
pub type Callback = Box<dyn FnOnce()>;

/// Single-threaded cooperative loop
///
/// Callbacks run one at a time on the loop's thread, in scheduling order for
/// zero-delay callbacks. Nothing here is `Send`.
pub trait Reactor {
    /// Queue `callback` to run on a later loop tick, never inline
    fn schedule(&self, callback: Callback);

    /// Queue `callback` to run once `delay` has elapsed
    fn schedule_after(&self, delay: Duration, callback: Callback);

    /// Run the loop on the calling thread until [`Reactor::stop`] is called
    ///
    /// Returns [`DelayError::LoopRunning`](crate::DelayError::LoopRunning) if
    /// the loop is already running.
    fn start(&self) -> DelayResult<()>;

    /// Ask a running loop to return from `start` after the current callback
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// True while any scheduled callback, timers included, has yet to run
    fn has_pending_work(&self) -> bool;
}
