//! Transfer domain types, events, and errors.
//!
//! This module contains pure data types for the transfer engine. No I/O,
//! networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `types` - Core identifiers and data structures (`BlobKey`, `TransferItem`)
//! - `progress` - Operation snapshots (`OperationProgress`, `OperationStatus`)
//! - `events` - Transfer events (`TransferEvent`)
//! - `errors` - Error types for transfer operations

pub mod errors;
pub mod events;
pub mod progress;
pub mod types;

// Re-export commonly used types
pub use errors::{TransferError, TransferResult};
pub use events::TransferEvent;
pub use progress::{OperationProgress, OperationStatus};
pub use types::{BlobKey, TransferItem};
