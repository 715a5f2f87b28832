//! Operation progress snapshots.
//!
//! `OperationProgress` is a value snapshot rebuilt by the engine after every
//! item settle. Consumers never observe partially-updated state: byte and
//! count credit only appears once an item has fully settled, and
//! `current_item` always refers to an item whose executor call is (or is
//! about to be) outstanding, never one that already finished.

use serde::{Deserialize, Serialize};

use super::types::TransferItem;

/// Status of a transfer operation.
///
/// Derived from counts and terminal flags when a snapshot is built; the
/// engine keeps no stored status that could drift from the counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// No operation has run (or the runner was reset).
    Idle,
    /// Items are still being processed.
    Running,
    /// Every item settled successfully.
    Completed,
    /// The run ended with failed or unprocessed items.
    Failed,
    /// The run was cancelled before finishing.
    Cancelled,
}

impl OperationStatus {
    /// Convert to string representation for logs and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            // "idle" or unknown values default to Idle
            _ => Self::Idle,
        }
    }

    /// Whether the operation has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Aggregate snapshot of a transfer operation.
///
/// Invariants, holding at every emitted snapshot:
/// - `completed_items + failed_items <= total_items`
/// - `transferred_bytes <= total_bytes`, advancing only by whole settled items
/// - `errors.len() == failed_items as usize`
/// - once `can_resume` turns false it stays false for the rest of the run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationProgress {
    /// Number of items in the operation.
    pub total_items: u32,
    /// Items that settled successfully.
    pub completed_items: u32,
    /// Items that settled with a failure.
    pub failed_items: u32,
    /// Sum of all item sizes.
    pub total_bytes: u64,
    /// Bytes attributed to successfully settled items. Never includes
    /// partial credit for the item in flight.
    pub transferred_bytes: u64,
    /// Item presently executing; `None` when idle or finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item: Option<TransferItem>,
    /// Smoothed throughput; 0.0 until enough samples exist.
    pub bytes_per_second: f64,
    /// Estimated seconds remaining; `None` while the rate is unknown or
    /// zero, so "unknown" can never render as "0s remaining".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,
    /// Wall-clock seconds since the current pass started.
    pub elapsed_seconds: f64,
    /// One message per failed item, in failure order.
    pub errors: Vec<String>,
    /// True while every failure so far is recoverable.
    pub can_resume: bool,
    /// Status derived from the fields above at snapshot-build time.
    pub status: OperationStatus,
}

impl OperationProgress {
    /// Snapshot for a runner on which no operation has run.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            total_items: 0,
            completed_items: 0,
            failed_items: 0,
            total_bytes: 0,
            transferred_bytes: 0,
            current_item: None,
            bytes_per_second: 0.0,
            eta_seconds: None,
            elapsed_seconds: 0.0,
            errors: Vec::new(),
            can_resume: true,
            status: OperationStatus::Idle,
        }
    }

    /// Aggregate completion percentage by bytes (0.0 - 100.0).
    ///
    /// Falls back to item counts when the batch is all zero-byte items.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> f64 {
        if self.total_bytes > 0 {
            (self.transferred_bytes as f64 / self.total_bytes as f64) * 100.0
        } else if self.total_items > 0 {
            (f64::from(self.completed_items) / f64::from(self.total_items)) * 100.0
        } else {
            0.0
        }
    }

    /// Bytes not yet attributed to a settled item.
    #[must_use]
    pub const fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.transferred_bytes)
    }

    /// Number of items that never settled (unprocessed after a cancel or
    /// fatal short-circuit).
    #[must_use]
    pub const fn unprocessed_items(&self) -> u32 {
        self.total_items
            .saturating_sub(self.completed_items)
            .saturating_sub(self.failed_items)
    }

    /// Whether the operation has reached a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Default for OperationProgress {
    fn default() -> Self {
        Self::idle()
    }
}
