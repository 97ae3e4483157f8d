//! Typed event hub for delay completion signals
//!
//! A delay reports its terminal state through exactly two channels:
//!
//! ```text
//!                    ┌──────────────┐
//!   transition ────▶ │   EventHub   │ ──▶ on/once listeners (synchronous)
//!                    │ finish/error │
//!                    └──────────────┘ ──▶ broadcast subscribers (passive)
//! ```
//!
//! Listeners run inline on the loop thread, in registration order. This is what
//! lets `wait` stop the loop from inside the `finish` listener. Broadcast
//! subscribers see the same events after the listeners have run, and are meant
//! for observers that poll (log tailers, tests).
//!
//! # Usage
//!
//! ```rust,ignore
//! use stepdelay::events::{DelayEvent, EventHub, EventKind};
//!
//! let hub = EventHub::with_default_capacity();
//! hub.once(EventKind::Finish, |event| println!("done: {:?}", event));
//! hub.emit(DelayEvent::Finish(vec![]));
//! ```

mod hub;
mod types;

pub use hub::{DEFAULT_CHANNEL_CAPACITY, EventHub};
pub use types::{DelayEvent, EventKind};
