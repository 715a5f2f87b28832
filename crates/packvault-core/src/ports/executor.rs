//! Item executor port.
//!
//! The executor is the capability the host application supplies for each
//! operation: given one item, move its bytes (HTTP PUT to the vault, a
//! local download, a file deletion) and settle. The engine decides *when*
//! each item runs and how outcomes aggregate; the executor decides *what*
//! a transfer physically is.

use async_trait::async_trait;

use crate::transfer::{TransferItem, TransferResult};

/// Port for transferring a single item.
///
/// # Contract
///
/// - Must eventually settle; the engine awaits one call at a time and an
///   executor that never resolves wedges the whole operation.
/// - The failure value classifies the outcome: errors for which
///   [`TransferError::is_recoverable`](crate::transfer::TransferError::is_recoverable)
///   returns true let the queue continue; any other error stops the
///   remaining items.
/// - Repeating a call for the same item after a partial failure must be
///   safe (the vault's push/delete operations are idempotent).
#[async_trait]
pub trait ItemExecutor: Send + Sync {
    /// Transfer one item to (or from, or out of) the vault.
    async fn execute(&self, item: &TransferItem) -> TransferResult<()>;
}
