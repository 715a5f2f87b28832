//! Core domain types and port definitions for packvault.
//!
//! This crate contains pure data types and trait definitions for the blob
//! transfer engine. No I/O, networking, or runtime dependencies allowed.
//! Adapters (REST, Tauri, CLI) depend on this crate for the DTOs they
//! forward and the ports they implement.

#![deny(unused_crate_dependencies)]

pub mod ports;
pub mod transfer;

// Re-export commonly used types for convenience
pub use ports::{
    CleanupPlanner, ItemExecutor, NoopTransferEmitter, TransferEventEmitterPort,
};
pub use transfer::{
    BlobKey, OperationProgress, OperationStatus, TransferError, TransferEvent, TransferItem,
    TransferResult,
};
