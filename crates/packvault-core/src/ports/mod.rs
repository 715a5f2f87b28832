//! Port definitions for the transfer engine.
//!
//! Ports keep infrastructure out of the engine: executors perform the
//! actual byte movement, planners resolve item sets, emitters deliver
//! events. Infra types (cancellation tokens, HTTP clients, file handles)
//! never appear in port signatures.

mod cleanup_planner;
mod event_emitter;
mod executor;

pub use cleanup_planner::CleanupPlanner;
pub use event_emitter::{NoopTransferEmitter, TransferEventEmitterPort};
pub use executor::ItemExecutor;
