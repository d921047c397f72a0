//! Wallet Synchronization Module
//!
//! - `events`: event types reported by the engine, the listener capability and the
//!   buffering aggregator the orchestrator polls.
//! - `orchestrator`: starts the engine, polls for the terminal event or a caller stop, and
//!   returns the drained event streams.

/// Event model, listener trait and aggregator
pub mod events;
/// Driver for a single sync run
pub mod orchestrator;

pub use events::*;
pub use orchestrator::*;
