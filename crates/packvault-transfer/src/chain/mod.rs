//! Backup-then-cleanup orchestration.
//!
//! Pushing a pack and freeing the local copies afterwards are two runner
//! passes over *different* item sets: the backup pass covers what the vault
//! is missing, the cleanup pass covers what is locally present and
//! confirmed held by the vault. The cleanup set is resolved only after the
//! backup pass settles, against current membership, so a blob whose push
//! never landed can never be deleted.
//!
//! # Design
//!
//! - Two `TransferRunner`s; each phase's progress is its own snapshot
//!   stream, never merged
//! - The backup→cleanup transition is guarded by a one-shot latch, not by
//!   the assumption that the completion path runs once
//! - An empty cleanup plan short-circuits to `Completed` without a no-op
//!   pass

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use packvault_core::ports::{CleanupPlanner, ItemExecutor, TransferEventEmitterPort};
use packvault_core::transfer::{
    OperationProgress, OperationStatus, TransferError, TransferItem, TransferResult,
};

use crate::runner::TransferRunner;

/// Phase of a backup chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPhase {
    /// No chain run is active or finished.
    Idle,
    /// The backup pass is executing.
    BackupRunning,
    /// The backup pass ended cancelled, fatally, or with nothing pushed.
    BackupFailed,
    /// The cleanup pass is executing.
    CleanupRunning,
    /// The cleanup pass ended with failures, or its planning failed.
    CleanupFailed,
    /// The chain finished; everything requested was done.
    Completed,
}

impl ChainPhase {
    /// Convert to string representation for logs and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BackupRunning => "backup_running",
            Self::BackupFailed => "backup_failed",
            Self::CleanupRunning => "cleanup_running",
            Self::CleanupFailed => "cleanup_failed",
            Self::Completed => "completed",
        }
    }

    /// Whether the chain has reached a terminal phase.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::BackupFailed | Self::CleanupFailed | Self::Completed)
    }
}

/// Ports a chain run needs, bundled so call sites stay readable.
pub struct ChainDeps<B, C, P>
where
    B: ItemExecutor + 'static,
    C: ItemExecutor + 'static,
    P: CleanupPlanner + 'static,
{
    /// Executor pushing blobs to the vault.
    pub backup_executor: Arc<B>,
    /// Executor freeing local blob copies.
    pub cleanup_executor: Arc<C>,
    /// Resolves the cleanup item set after the backup pass.
    pub cleanup_planner: Arc<P>,
}

/// Result of a chain run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainOutcome {
    /// Terminal phase the chain reached.
    pub phase: ChainPhase,
    /// Terminal snapshot of the backup pass.
    pub backup: OperationProgress,
    /// Terminal snapshot of the cleanup pass, if one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<OperationProgress>,
}

/// Releases the single-run slot when a chain run ends.
struct ChainSlot<'a>(&'a AtomicBool);

impl Drop for ChainSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives the two-phase "push pack, then optionally free local copies"
/// flow as one caller-visible operation.
///
/// # Usage
///
/// ```ignore
/// let chain = BackupChain::new();
/// let outcome = chain.run(items, true, &deps).await?;
/// match outcome.phase {
///     ChainPhase::Completed => { /* done */ }
///     ChainPhase::BackupFailed if outcome.backup.can_resume => {
///         chain.retry_backup(true, &deps).await?;
///     }
///     _ => { /* surface the failure */ }
/// }
/// ```
pub struct BackupChain {
    backup: TransferRunner,
    cleanup: TransferRunner,
    cleanup_latch: AtomicBool,
    running: AtomicBool,
    phase_tx: watch::Sender<ChainPhase>,
}

impl BackupChain {
    /// Create a chain with no event emission.
    #[must_use]
    pub fn new() -> Self {
        Self::build(TransferRunner::new(), TransferRunner::new())
    }

    /// Create a chain whose runners forward events through `emitter`.
    #[must_use]
    pub fn with_emitter(emitter: Arc<dyn TransferEventEmitterPort>) -> Self {
        Self::build(
            TransferRunner::with_emitter(Arc::clone(&emitter)),
            TransferRunner::with_emitter(emitter),
        )
    }

    fn build(backup: TransferRunner, cleanup: TransferRunner) -> Self {
        let (phase_tx, _) = watch::channel(ChainPhase::Idle);
        Self {
            backup,
            cleanup,
            cleanup_latch: AtomicBool::new(false),
            running: AtomicBool::new(false),
            phase_tx,
        }
    }

    /// Subscribe to backup-pass progress snapshots.
    #[must_use]
    pub fn backup_progress(&self) -> watch::Receiver<OperationProgress> {
        self.backup.subscribe()
    }

    /// Subscribe to cleanup-pass progress snapshots.
    #[must_use]
    pub fn cleanup_progress(&self) -> watch::Receiver<OperationProgress> {
        self.cleanup.subscribe()
    }

    /// The current chain phase.
    #[must_use]
    pub fn phase(&self) -> ChainPhase {
        *self.phase_tx.borrow()
    }

    /// Subscribe to phase transitions.
    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<ChainPhase> {
        self.phase_tx.subscribe()
    }

    /// Request cancellation of whichever pass is active.
    pub async fn cancel(&self) {
        self.backup.cancel().await;
        self.cleanup.cancel().await;
    }

    /// Run the backup pass over `items`, then - if `cleanup_requested` and
    /// the backup protected what it was asked to - a cleanup pass over the
    /// set the planner resolves.
    ///
    /// Item failures surface in the returned snapshots; `Err` means a
    /// caller contract violation (a chain run is already active) or a
    /// planning failure.
    pub async fn run<B, C, P>(
        &self,
        items: Vec<TransferItem>,
        cleanup_requested: bool,
        deps: &ChainDeps<B, C, P>,
    ) -> TransferResult<ChainOutcome>
    where
        B: ItemExecutor + 'static,
        C: ItemExecutor + 'static,
        P: CleanupPlanner + 'static,
    {
        let _slot = self.acquire_slot()?;
        self.cleanup_latch.store(false, Ordering::SeqCst);
        self.set_phase(ChainPhase::BackupRunning);
        tracing::info!(
            items = items.len(),
            cleanup_requested,
            "Backup chain started"
        );

        let backup = match self.backup.start(items, &*deps.backup_executor).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.set_phase(ChainPhase::Idle);
                return Err(err);
            }
        };

        self.finish_backup(backup, cleanup_requested, deps).await
    }

    /// Re-run only the items that failed in the previous backup pass, then
    /// proceed through the same cleanup gate as [`run`](Self::run).
    pub async fn retry_backup<B, C, P>(
        &self,
        cleanup_requested: bool,
        deps: &ChainDeps<B, C, P>,
    ) -> TransferResult<ChainOutcome>
    where
        B: ItemExecutor + 'static,
        C: ItemExecutor + 'static,
        P: CleanupPlanner + 'static,
    {
        let _slot = self.acquire_slot()?;
        self.cleanup_latch.store(false, Ordering::SeqCst);
        let previous = self.phase();
        self.set_phase(ChainPhase::BackupRunning);
        tracing::info!(cleanup_requested, "Retrying failed backup transfers");

        let backup = match self.backup.retry_failed(&*deps.backup_executor).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.set_phase(previous);
                return Err(err);
            }
        };

        self.finish_backup(backup, cleanup_requested, deps).await
    }

    /// Completion path of the backup pass.
    ///
    /// The latch makes the backup→cleanup transition one-shot: however many
    /// times this path is entered for one chain run, the cleanup pass
    /// starts at most once.
    async fn finish_backup<B, C, P>(
        &self,
        backup: OperationProgress,
        cleanup_requested: bool,
        deps: &ChainDeps<B, C, P>,
    ) -> TransferResult<ChainOutcome>
    where
        B: ItemExecutor + 'static,
        C: ItemExecutor + 'static,
        P: CleanupPlanner + 'static,
    {
        if !Self::backup_protected(&backup) {
            self.set_phase(ChainPhase::BackupFailed);
            tracing::warn!(
                status = backup.status.as_str(),
                completed = backup.completed_items,
                "Backup pass did not protect the pack; cleanup skipped"
            );
            return Ok(ChainOutcome {
                phase: ChainPhase::BackupFailed,
                backup,
                cleanup: None,
            });
        }

        if !cleanup_requested {
            self.set_phase(ChainPhase::Completed);
            return Ok(ChainOutcome {
                phase: ChainPhase::Completed,
                backup,
                cleanup: None,
            });
        }

        if self
            .cleanup_latch
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Cleanup already triggered for this chain run; ignoring duplicate completion");
            return Ok(ChainOutcome {
                phase: self.phase(),
                backup,
                cleanup: None,
            });
        }

        let plan = match deps.cleanup_planner.plan().await {
            Ok(plan) => plan,
            Err(err) => {
                self.set_phase(ChainPhase::CleanupFailed);
                tracing::warn!(error = %err, "Cleanup planning failed");
                return Err(err);
            }
        };

        if plan.is_empty() {
            tracing::info!("Nothing to free locally; cleanup pass skipped");
            self.set_phase(ChainPhase::Completed);
            return Ok(ChainOutcome {
                phase: ChainPhase::Completed,
                backup,
                cleanup: None,
            });
        }

        self.set_phase(ChainPhase::CleanupRunning);
        let cleanup = match self.cleanup.start(plan, &*deps.cleanup_executor).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.set_phase(ChainPhase::CleanupFailed);
                return Err(err);
            }
        };

        let phase = if cleanup.status == OperationStatus::Completed {
            ChainPhase::Completed
        } else {
            ChainPhase::CleanupFailed
        };
        self.set_phase(phase);
        tracing::info!(phase = phase.as_str(), "Backup chain finished");

        Ok(ChainOutcome {
            phase,
            backup,
            cleanup: Some(cleanup),
        })
    }

    /// Whether the backup pass protected the pack well enough to free
    /// local copies.
    ///
    /// A partial pass still protects what it pushed, as long as nothing
    /// failed unrecoverably; the planner then only offers up blobs the
    /// vault actually holds. A cancelled or fatally-failed pass never
    /// advances.
    fn backup_protected(snapshot: &OperationProgress) -> bool {
        match snapshot.status {
            OperationStatus::Completed => true,
            OperationStatus::Failed => snapshot.can_resume && snapshot.completed_items > 0,
            OperationStatus::Idle | OperationStatus::Running | OperationStatus::Cancelled => false,
        }
    }

    fn acquire_slot(&self) -> TransferResult<ChainSlot<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TransferError::OperationInProgress);
        }
        Ok(ChainSlot(&self.running))
    }

    fn set_phase(&self, phase: ChainPhase) {
        self.phase_tx.send_replace(phase);
        tracing::debug!(phase = phase.as_str(), "Chain phase changed");
    }
}

impl Default for BackupChain {
    fn default() -> Self {
        Self::new()
    }
}
