//! Delay - barrier-and-sequencer for callback work on one event loop
//!
//! A [`Delay`] hands out completion [`Token`]s. When every token issued in the
//! current cycle has completed, the delay flattens their results in the order
//! the tokens were issued and either feeds them to the next queued step or,
//! once the chain is exhausted, emits `finish`.
//!
//! # Parallel mode
//!
//! ```rust,ignore
//! let delay = Delay::new();
//! for url in urls {
//!     fetch(url, delay.begin().into_callback());
//! }
//! let bodies = delay.wait()?; // in issue order, not completion order
//! ```
//!
//! # Sequential mode
//!
//! ```rust,ignore
//! let delay = Delay::new();
//! delay.steps([
//!     step(|d, _| {
//!         read_config(d.begin().into_callback());
//!         Ok(())
//!     }),
//!     step(|d, args| {
//!         connect(&args[0], d.begin().into_callback());
//!         Ok(())
//!     }),
//! ]);
//! let connection = delay.wait()?;
//! ```
//!
//! A step that returns an error (or panics) latches the delay as failed: later
//! steps never run and `finish` is never emitted, even if outstanding tokens
//! complete afterwards.

mod coordinator;
mod token;

pub use coordinator::{Delay, StepFn, step};
pub use token::Token;
