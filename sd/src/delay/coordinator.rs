//! Delay coordinator state machine

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::token::Token;
use crate::error::{DelayError, DelayResult};
use crate::events::{DelayEvent, EventHub, EventKind};
use crate::reactor::{Reactor, default_loop};

/// One link of a sequential chain
///
/// Receives the delay (to issue tokens for its own async work) and the
/// flattened results of the previous cycle.
pub type StepFn = Box<dyn FnOnce(&Delay, Vec<Value>) -> eyre::Result<()>>;

/// Box a closure as a [`StepFn`]
pub fn step<F>(f: F) -> StepFn
where
    F: FnOnce(&Delay, Vec<Value>) -> eyre::Result<()> + 'static,
{
    Box::new(f)
}

#[derive(Default)]
struct State {
    pending: usize,
    next_id: usize,
    results: BTreeMap<usize, Vec<Value>>,
    steps: VecDeque<StepFn>,
    /// Steps started so far; the running step's 1-based index
    step_index: usize,
    failed: bool,
    busy: bool,
    outcome: Option<DelayResult<Vec<Value>>>,
}

struct Inner {
    id: Uuid,
    reactor: Rc<dyn Reactor>,
    state: RefCell<State>,
    events: EventHub,
}

/// Barrier-and-sequencer over a shared event loop
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Delay {
    inner: Rc<Inner>,
}

/// Holds `busy` for the duration of a transition, released on every exit path
struct BusyGuard<'a> {
    state: &'a RefCell<State>,
}

impl<'a> BusyGuard<'a> {
    fn acquire(state: &'a RefCell<State>) -> Self {
        state.borrow_mut().busy = true;
        Self { state }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().busy = false;
    }
}

impl Delay {
    /// Create a delay on the calling thread's default loop
    pub fn new() -> Self {
        Self::with_loop(default_loop())
    }

    /// Create a delay driven by `reactor`
    pub fn with_loop(reactor: Rc<dyn Reactor>) -> Self {
        let id = Uuid::now_v7();
        debug!(delay_id = %id, "Delay::with_loop: created");
        Self {
            inner: Rc::new(Inner {
                id,
                reactor,
                state: RefCell::new(State::default()),
                events: EventHub::with_default_capacity(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The loop driving this delay, for scheduling timers from steps
    pub fn reactor(&self) -> Rc<dyn Reactor> {
        Rc::clone(&self.inner.reactor)
    }

    /// Tokens issued but not yet completed in the current cycle
    pub fn pending(&self) -> usize {
        self.inner.state.borrow().pending
    }

    pub fn is_failed(&self) -> bool {
        self.inner.state.borrow().failed
    }

    /// True once `finish` or `error` has been emitted
    pub fn is_settled(&self) -> bool {
        self.inner.state.borrow().outcome.is_some()
    }

    /// The terminal result, once `finish` or `error` has been emitted
    pub fn outcome(&self) -> Option<DelayResult<Vec<Value>>> {
        self.inner.state.borrow().outcome.clone()
    }

    /// Issue a token whose first delivered value is dropped as an error slot
    pub fn begin(&self) -> Token {
        self.begin_with(true)
    }

    /// Issue a token, choosing whether to drop the first delivered value
    pub fn begin_with(&self, discard_first: bool) -> Token {
        let id = {
            let mut state = self.inner.state.borrow_mut();
            state.pending += 1;
            let id = state.next_id;
            state.next_id += 1;
            trace!(delay_id = %self.inner.id, token_id = id, pending = state.pending, "Delay::begin");
            id
        };
        Token::new(id, discard_first, self.clone())
    }

    /// Replace the step chain and kick it off on the next loop tick
    ///
    /// No step runs before this returns, so listeners can still be attached.
    pub fn steps<I>(&self, steps: I) -> &Self
    where
        I: IntoIterator<Item = StepFn>,
    {
        let queued: VecDeque<StepFn> = steps.into_iter().collect();
        debug!(delay_id = %self.inner.id, steps = queued.len(), "Delay::steps");
        // Dropped outside the borrow: a discarded step may own a token
        let replaced = std::mem::replace(&mut self.inner.state.borrow_mut().steps, queued);
        drop(replaced);
        self.resume_later();
        self
    }

    /// Block on the loop until this delay finishes or fails
    ///
    /// Returns the `finish` arguments, or the error carried by `error`. Must not
    /// be called while the loop is already running (e.g. from inside a step).
    pub fn wait(&self) -> DelayResult<Vec<Value>> {
        if let Some(outcome) = self.outcome() {
            debug!(delay_id = %self.inner.id, "Delay::wait: already settled");
            return outcome;
        }
        if self.inner.reactor.is_running() {
            return Err(DelayError::LoopRunning);
        }
        // Queued callbacks may still issue tokens, so only a quiet loop is idle
        if self.pending() == 0 && !self.inner.reactor.has_pending_work() {
            return Err(DelayError::Idle);
        }

        let remembered: Rc<RefCell<Option<DelayResult<Vec<Value>>>>> = Rc::default();
        // Cleared on return: the once-listeners outlive an unsettled wait and
        // must not stop a loop someone else starts later
        let waiting = Rc::new(Cell::new(true));
        for kind in [EventKind::Finish, EventKind::Error] {
            let reactor = Rc::clone(&self.inner.reactor);
            let slot = Rc::clone(&remembered);
            let waiting = Rc::clone(&waiting);
            self.inner.events.once(kind, move |event| {
                if !waiting.get() {
                    return;
                }
                *slot.borrow_mut() = Some(match event {
                    DelayEvent::Finish(args) => Ok(args.clone()),
                    DelayEvent::Error(err) => Err(err.clone()),
                });
                reactor.stop();
            });
        }

        debug!(delay_id = %self.inner.id, pending = self.pending(), "Delay::wait: starting loop");
        let started = self.inner.reactor.start();
        waiting.set(false);
        started?;

        let outcome = remembered.borrow_mut().take();
        outcome.unwrap_or(Err(DelayError::Stalled))
    }

    /// Register a listener for every event of `kind`
    pub fn on<F>(&self, kind: EventKind, listener: F) -> &Self
    where
        F: Fn(&DelayEvent) + 'static,
    {
        self.inner.events.on(kind, listener);
        self
    }

    /// Register a listener for the next event of `kind`
    pub fn once<F>(&self, kind: EventKind, listener: F) -> &Self
    where
        F: FnOnce(&DelayEvent) + 'static,
    {
        self.inner.events.once(kind, listener);
        self
    }

    /// Listen for the finish arguments
    pub fn on_finish<F>(&self, listener: F) -> &Self
    where
        F: Fn(&[Value]) + 'static,
    {
        self.on(EventKind::Finish, move |event| {
            if let Some(args) = event.args() {
                listener(args);
            }
        })
    }

    /// Listen for step failures
    pub fn on_error<F>(&self, listener: F) -> &Self
    where
        F: Fn(&DelayError) + 'static,
    {
        self.on(EventKind::Error, move |event| {
            if let Some(err) = event.error() {
                listener(err);
            }
        })
    }

    /// Emit an event to this delay's listeners and subscribers
    pub fn emit(&self, event: DelayEvent) {
        self.inner.events.emit(event);
    }

    /// Passive receiver of every event this delay emits
    pub fn subscribe(&self) -> broadcast::Receiver<DelayEvent> {
        self.inner.events.subscribe()
    }

    /// Store a token's result; the last completion of a cycle runs the transition
    pub(crate) fn deliver(&self, id: usize, args: Vec<Value>) {
        let ready = {
            let mut state = self.inner.state.borrow_mut();
            state.results.insert(id, args);
            state.pending = state.pending.saturating_sub(1);
            trace!(
                delay_id = %self.inner.id,
                token_id = id,
                pending = state.pending,
                busy = state.busy,
                "Delay::deliver"
            );
            state.pending == 0 && !state.busy
        };
        if ready {
            self.transition();
        }
    }

    /// Issue a token and complete it on the next loop tick
    fn resume_later(&self) {
        let token = self.begin();
        self.inner
            .reactor
            .schedule(Box::new(move || token.complete(Vec::new())));
    }

    fn transition(&self) {
        let _busy = BusyGuard::acquire(&self.inner.state);

        let (args, next, index) = {
            let mut state = self.inner.state.borrow_mut();
            let args: Vec<Value> = std::mem::take(&mut state.results).into_values().flatten().collect();
            state.next_id = 0;
            if state.failed || state.outcome.is_some() {
                debug!(delay_id = %self.inner.id, failed = state.failed, "Delay::transition: settled, ignoring");
                return;
            }
            let next = state.steps.pop_front();
            if next.is_some() {
                state.step_index += 1;
            }
            (args, next, state.step_index)
        };

        if let Some(next) = next {
            debug!(delay_id = %self.inner.id, step = index, args = args.len(), "Delay::transition: running step");
            let failure = match panic::catch_unwind(AssertUnwindSafe(|| next(self, args.clone()))) {
                Ok(Ok(())) => None,
                Ok(Err(report)) => Some(format!("{report:#}")),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };
            if let Some(message) = failure {
                self.fail(DelayError::StepFailed { step: index, message });
                return;
            }
        }

        let (issued, pending) = {
            let state = self.inner.state.borrow();
            (state.next_id, state.pending)
        };
        if issued == 0 && pending == 0 {
            self.finish(args);
        } else if pending == 0 {
            // Everything the step issued already completed inline; continue on a
            // fresh tick rather than recursing
            trace!(delay_id = %self.inner.id, issued, "Delay::transition: resuming on next tick");
            self.resume_later();
        }
    }

    fn finish(&self, args: Vec<Value>) {
        info!(delay_id = %self.inner.id, args = args.len(), "Delay finished");
        self.inner.state.borrow_mut().outcome = Some(Ok(args.clone()));
        self.inner.events.emit(DelayEvent::Finish(args));
    }

    fn fail(&self, err: DelayError) {
        warn!(delay_id = %self.inner.id, error = %err, "Delay failed");
        {
            let mut state = self.inner.state.borrow_mut();
            state.failed = true;
            state.outcome = Some(Err(err.clone()));
        }
        self.inner.events.emit(DelayEvent::Error(err));
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Delay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Delay")
            .field("id", &self.inner.id)
            .field("pending", &state.pending)
            .field("next_id", &state.next_id)
            .field("steps", &state.steps.len())
            .field("failed", &state.failed)
            .field("busy", &state.busy)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "step panicked".to_string()
    }
}
