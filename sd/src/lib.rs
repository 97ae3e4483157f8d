//! stepdelay - barrier-and-sequencer for callback work on one event loop
//!
//! A [`Delay`] lets a caller either fan out independent callback operations and
//! be told once, with every result, when all of them completed; or run an
//! ordered chain of steps where each step receives everything the previous
//! step's operations produced.
//!
//! # Modules
//!
//! - [`delay`] - the `Delay` state machine and its completion tokens
//! - [`events`] - typed `finish`/`error` event hub
//! - [`reactor`] - event loop capability and the tokio-backed `EventLoop`
//! - [`demo`] - timer-backed scenarios used by the `sd` binary
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```ignore
//! use stepdelay::{Delay, step};
//!
//! let delay = Delay::new();
//! delay.steps([
//!     step(|d, _| {
//!         start_lookup("a", d.begin().into_callback());
//!         start_lookup("b", d.begin().into_callback());
//!         Ok(())
//!     }),
//!     step(|_, results| {
//!         println!("a then b: {:?}", results);
//!         Ok(())
//!     }),
//! ]);
//! let results = delay.wait()?;
//! ```

pub mod cli;
pub mod config;
pub mod delay;
pub mod demo;
pub mod error;
pub mod events;
pub mod reactor;

pub use delay::{Delay, StepFn, Token, step};
pub use error::{DelayError, DelayResult};
pub use events::{DelayEvent, EventHub, EventKind};
pub use reactor::{Callback, EventLoop, Reactor, default_loop};
