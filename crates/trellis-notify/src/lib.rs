//! # Trellis Notify
//!
//! Delivers run/step status events to subscribers in an order that matches
//! a human-readable narrative of the run. The engine can emit bursts of
//! events back to back; the notifier paces them so observers see each step
//! land before the next one starts.

mod hub;

pub use hub::{NotifierHub, Subscription, DEFAULT_SETTLING_DELAY};
