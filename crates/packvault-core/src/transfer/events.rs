//! Transfer events - discriminated union for all transfer state changes.
//!
//! One event is emitted per item boundary, plus one at the start and end of
//! each pass. `run_id` correlates every event belonging to one pass
//! (`start` and each retry mint a fresh id).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Single discriminated union for all transfer events.
///
/// The frontend handles this as a TypeScript discriminated union:
///
/// ```typescript
/// type TransferEvent =
///   | { type: "operation_started"; run_id: string; total_items: number; ... }
///   | { type: "item_started"; run_id: string; key: string; ... }
///   | { type: "item_completed"; run_id: string; key: string; size_bytes: number }
///   | { type: "item_failed"; run_id: string; key: string; error: string; ... }
///   | { type: "operation_completed"; run_id: string }
///   | { type: "operation_failed"; run_id: string; ... }
///   | { type: "operation_cancelled"; run_id: string };
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// A pass (initial run or retry) has started.
    OperationStarted {
        /// Identifier of this pass.
        run_id: Uuid,
        /// Number of items in the operation.
        total_items: u32,
        /// Sum of all item sizes.
        total_bytes: u64,
    },

    /// An item's executor call is about to go out.
    ItemStarted {
        /// Identifier of this pass.
        run_id: Uuid,
        /// Content-addressed key of the item.
        key: String,
        /// Human-readable label.
        display_name: String,
    },

    /// An item settled successfully.
    ItemCompleted {
        /// Identifier of this pass.
        run_id: Uuid,
        /// Content-addressed key of the item.
        key: String,
        /// Size credited to the aggregate on this settle.
        size_bytes: u64,
    },

    /// An item settled with a failure.
    ItemFailed {
        /// Identifier of this pass.
        run_id: Uuid,
        /// Content-addressed key of the item.
        key: String,
        /// Error message describing what went wrong.
        error: String,
        /// Whether the failure leaves the operation resumable.
        recoverable: bool,
    },

    /// Every item in the pass settled successfully.
    OperationCompleted {
        /// Identifier of this pass.
        run_id: Uuid,
    },

    /// The pass ended with failed or unprocessed items.
    OperationFailed {
        /// Identifier of this pass.
        run_id: Uuid,
        /// Number of items that settled with a failure.
        failed_items: u32,
        /// Whether a retry pass is possible.
        can_resume: bool,
    },

    /// The pass was cancelled before finishing.
    OperationCancelled {
        /// Identifier of this pass.
        run_id: Uuid,
    },
}

impl TransferEvent {
    /// Create an operation started event.
    #[must_use]
    pub const fn started(run_id: Uuid, total_items: u32, total_bytes: u64) -> Self {
        Self::OperationStarted {
            run_id,
            total_items,
            total_bytes,
        }
    }

    /// Create an item started event.
    pub fn item_started(run_id: Uuid, key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::ItemStarted {
            run_id,
            key: key.into(),
            display_name: display_name.into(),
        }
    }

    /// Create an item completed event.
    pub fn item_completed(run_id: Uuid, key: impl Into<String>, size_bytes: u64) -> Self {
        Self::ItemCompleted {
            run_id,
            key: key.into(),
            size_bytes,
        }
    }

    /// Create an item failed event.
    pub fn item_failed(
        run_id: Uuid,
        key: impl Into<String>,
        error: impl Into<String>,
        recoverable: bool,
    ) -> Self {
        Self::ItemFailed {
            run_id,
            key: key.into(),
            error: error.into(),
            recoverable,
        }
    }

    /// Create an operation completed event.
    #[must_use]
    pub const fn completed(run_id: Uuid) -> Self {
        Self::OperationCompleted { run_id }
    }

    /// Create an operation failed event.
    #[must_use]
    pub const fn failed(run_id: Uuid, failed_items: u32, can_resume: bool) -> Self {
        Self::OperationFailed {
            run_id,
            failed_items,
            can_resume,
        }
    }

    /// Create an operation cancelled event.
    #[must_use]
    pub const fn cancelled(run_id: Uuid) -> Self {
        Self::OperationCancelled { run_id }
    }

    /// Get the pass identifier from any event type.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        match self {
            Self::OperationStarted { run_id, .. }
            | Self::ItemStarted { run_id, .. }
            | Self::ItemCompleted { run_id, .. }
            | Self::ItemFailed { run_id, .. }
            | Self::OperationCompleted { run_id }
            | Self::OperationFailed { run_id, .. }
            | Self::OperationCancelled { run_id } => *run_id,
        }
    }

    /// Get the item key from per-item event types.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::ItemStarted { key, .. }
            | Self::ItemCompleted { key, .. }
            | Self::ItemFailed { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Get the event name for wire protocols.
    ///
    /// This provides consistent event naming for Tauri and SSE transports.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::OperationStarted { .. } => "transfer:started",
            Self::ItemStarted { .. } => "transfer:item_started",
            Self::ItemCompleted { .. } => "transfer:item_completed",
            Self::ItemFailed { .. } => "transfer:item_failed",
            Self::OperationCompleted { .. } => "transfer:completed",
            Self::OperationFailed { .. } => "transfer:failed",
            Self::OperationCancelled { .. } => "transfer:cancelled",
        }
    }
}
