//! Transfer execution state machine.
//!
//! This module drives one batch of items through a caller-supplied
//! executor, strictly in list order, one call in flight at a time.
//!
//! # Design
//!
//! - Progress is a `watch` channel of value snapshots; exactly one publish
//!   per item settle, carrying the settle result and the next current item
//!   together
//! - Cancellation is cooperative: observed before each item starts, never
//!   mid-item, so a destination blob is never left half-written
//! - An unrecoverable item failure stops the remaining queue immediately
//! - `retry_failed` re-runs only the failed subset; completed items are
//!   never re-executed
//! - Only one pass may be active per runner; concurrent `start` calls are
//!   rejected, not queued

// Item counts are always well under u32::MAX in practice
#![allow(clippy::cast_possible_truncation)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use packvault_core::ports::{ItemExecutor, NoopTransferEmitter, TransferEventEmitterPort};
use packvault_core::transfer::{
    OperationProgress, OperationStatus, TransferError, TransferEvent, TransferItem, TransferResult,
};

use crate::progress::RateEstimator;

/// Per-item outcome within the current operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ItemOutcome {
    /// Not attempted yet, or left unprocessed by a cancel/short-circuit.
    Pending,
    /// Settled successfully.
    Completed,
    /// Settled with a failure.
    Failed,
}

/// Mutable state for one operation, spanning the initial pass and retries.
///
/// Outcomes are tracked per index, not per key, so duplicate keys in one
/// batch stay independent.
struct RunState {
    items: Vec<TransferItem>,
    outcomes: Vec<ItemOutcome>,
    errors: Vec<String>,
    can_resume: bool,
    cancelled: bool,
    finished: bool,
    started: bool,
}

impl RunState {
    /// State for a runner on which no operation has run.
    fn idle() -> Self {
        Self {
            items: Vec::new(),
            outcomes: Vec::new(),
            errors: Vec::new(),
            can_resume: true,
            cancelled: false,
            finished: false,
            started: false,
        }
    }

    /// State for a new operation over `items`.
    fn fresh(items: Vec<TransferItem>) -> Self {
        let outcomes = vec![ItemOutcome::Pending; items.len()];
        Self {
            items,
            outcomes,
            errors: Vec::new(),
            can_resume: true,
            cancelled: false,
            finished: false,
            started: true,
        }
    }

    /// Flip failed items back to pending for a retry pass.
    ///
    /// Returns the indices to re-run, in list order. Errors are cleared
    /// wholesale: the whole failed set is being retried, and items that
    /// fail again repopulate the list.
    fn prepare_retry(&mut self) -> Vec<usize> {
        let queue: Vec<usize> = self
            .outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| **outcome == ItemOutcome::Failed)
            .map(|(idx, _)| idx)
            .collect();
        for &idx in &queue {
            self.outcomes[idx] = ItemOutcome::Pending;
        }
        self.errors.clear();
        self.cancelled = false;
        self.finished = false;
        queue
    }

    fn completed_count(&self) -> u32 {
        self.outcomes
            .iter()
            .filter(|o| **o == ItemOutcome::Completed)
            .count() as u32
    }

    fn failed_count(&self) -> u32 {
        self.outcomes
            .iter()
            .filter(|o| **o == ItemOutcome::Failed)
            .count() as u32
    }

    fn total_bytes(&self) -> u64 {
        self.items.iter().map(|i| i.size_bytes).sum()
    }

    /// Bytes attributed to settled-successful items only.
    fn transferred_bytes(&self) -> u64 {
        self.items
            .iter()
            .zip(&self.outcomes)
            .filter(|(_, outcome)| **outcome == ItemOutcome::Completed)
            .map(|(item, _)| item.size_bytes)
            .sum()
    }

    /// Build a value snapshot; status is derived here, never stored.
    fn snapshot(
        &self,
        current: Option<usize>,
        elapsed_seconds: f64,
        bytes_per_second: f64,
        eta_seconds: Option<f64>,
    ) -> OperationProgress {
        let total_items = self.items.len() as u32;
        let completed_items = self.completed_count();
        let failed_items = self.failed_count();

        let status = if !self.started {
            OperationStatus::Idle
        } else if self.cancelled {
            OperationStatus::Cancelled
        } else if !self.finished {
            OperationStatus::Running
        } else if failed_items > 0 || completed_items < total_items {
            OperationStatus::Failed
        } else {
            OperationStatus::Completed
        };

        OperationProgress {
            total_items,
            completed_items,
            failed_items,
            total_bytes: self.total_bytes(),
            transferred_bytes: self.transferred_bytes(),
            current_item: current.map(|idx| self.items[idx].clone()),
            bytes_per_second,
            eta_seconds,
            elapsed_seconds,
            errors: self.errors.clone(),
            can_resume: self.can_resume,
            status,
        }
    }
}

/// Releases the single-run slot on every exit path of a pass.
struct SlotGuard<'a>(&'a AtomicBool);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Executes an ordered batch of transfer items with progress tracking,
/// cooperative cancellation, and retry-failed-only.
///
/// The runner offers no internal concurrency: items run strictly
/// sequentially, which keeps byte accounting exact and satisfies
/// destination-side ordering without a dependency graph. Callers wanting
/// parallelism run several runners over disjoint item sets.
///
/// # Usage
///
/// ```ignore
/// let runner = TransferRunner::new();
/// let mut progress = runner.subscribe();
///
/// let snapshot = runner.start(items, &executor).await?;
/// if snapshot.failed_items > 0 && snapshot.can_resume {
///     runner.retry_failed(&executor).await?;
/// }
/// ```
pub struct TransferRunner {
    state: Mutex<RunState>,
    progress_tx: watch::Sender<OperationProgress>,
    cancel: Mutex<CancellationToken>,
    running: AtomicBool,
    emitter: Arc<dyn TransferEventEmitterPort>,
}

impl TransferRunner {
    /// Create a runner that keeps events to itself (watch snapshots only).
    #[must_use]
    pub fn new() -> Self {
        Self::with_emitter(Arc::new(NoopTransferEmitter::new()))
    }

    /// Create a runner that forwards events through the given emitter.
    #[must_use]
    pub fn with_emitter(emitter: Arc<dyn TransferEventEmitterPort>) -> Self {
        let (progress_tx, _) = watch::channel(OperationProgress::idle());
        Self {
            state: Mutex::new(RunState::idle()),
            progress_tx,
            cancel: Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
            emitter,
        }
    }

    /// Subscribe to progress snapshots.
    ///
    /// The receiver always holds the latest snapshot; intermediate values
    /// may be coalesced for slow readers, but every held value satisfies
    /// the snapshot invariants.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OperationProgress> {
        self.progress_tx.subscribe()
    }

    /// The latest progress snapshot.
    #[must_use]
    pub fn progress(&self) -> OperationProgress {
        self.progress_tx.borrow().clone()
    }

    /// Execute a batch of items through `executor`, in list order.
    ///
    /// Resolves with the terminal snapshot once every item settled, the
    /// queue was short-circuited by an unrecoverable failure, or the run
    /// was cancelled. Item failures are captured in the snapshot, never
    /// returned as `Err`; an `Err` here means a caller contract violation
    /// (another pass is already active on this runner).
    ///
    /// An empty batch is a no-op success.
    pub async fn start(
        &self,
        items: Vec<TransferItem>,
        executor: &dyn ItemExecutor,
    ) -> TransferResult<OperationProgress> {
        let slot = self.acquire_slot()?;

        let run_id = Uuid::new_v4();
        let queue: Vec<usize> = (0..items.len()).collect();
        let total_items = items.len() as u32;
        let total_bytes: u64 = items.iter().map(|i| i.size_bytes).sum();
        {
            let mut state = self.state.lock().await;
            *state = RunState::fresh(items);
        }
        let cancel = self.fresh_cancel_token().await;

        self.emitter
            .emit(TransferEvent::started(run_id, total_items, total_bytes));
        tracing::info!(
            run_id = %run_id,
            items = total_items,
            bytes = total_bytes,
            "Transfer operation started"
        );

        Ok(self.drive(executor, queue, cancel, run_id, slot).await)
    }

    /// Re-run only the items that failed in the previous pass.
    ///
    /// Completed items are never re-executed; their counts and byte credit
    /// carry over. Elapsed time and the rate estimate start fresh, and the
    /// error list is rebuilt from items that fail again.
    ///
    /// Rejected when no operation has run, nothing failed, or the previous
    /// pass ended unrecoverably.
    pub async fn retry_failed(
        &self,
        executor: &dyn ItemExecutor,
    ) -> TransferResult<OperationProgress> {
        let slot = self.acquire_slot()?;

        let run_id = Uuid::new_v4();
        let (queue, total_items, total_bytes) = {
            let mut state = self.state.lock().await;
            if !state.started || state.failed_count() == 0 {
                return Err(TransferError::NothingToRetry);
            }
            if !state.can_resume {
                return Err(TransferError::NotResumable);
            }
            let queue = state.prepare_retry();
            (queue, state.items.len() as u32, state.total_bytes())
        };
        let cancel = self.fresh_cancel_token().await;

        self.emitter
            .emit(TransferEvent::started(run_id, total_items, total_bytes));
        tracing::info!(
            run_id = %run_id,
            retrying = queue.len(),
            "Retrying failed transfers"
        );

        Ok(self.drive(executor, queue, cancel, run_id, slot).await)
    }

    /// Request cancellation of the active pass.
    ///
    /// Cooperative: the item in flight settles naturally and its outcome is
    /// recorded; no further items start. Idempotent, and a no-op once the
    /// pass has finished.
    pub async fn cancel(&self) {
        self.cancel.lock().await.cancel();
        tracing::debug!("Transfer cancellation requested");
    }

    /// Clear all progress state back to "no operation has run".
    ///
    /// Rejected while a pass is active.
    pub async fn reset(&self) -> TransferResult<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(TransferError::OperationInProgress);
        }
        *self.state.lock().await = RunState::idle();
        self.progress_tx.send_replace(OperationProgress::idle());
        Ok(())
    }

    fn acquire_slot(&self) -> TransferResult<SlotGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TransferError::OperationInProgress);
        }
        Ok(SlotGuard(&self.running))
    }

    async fn fresh_cancel_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().await = token.clone();
        token
    }

    /// Run the pending queue to a terminal snapshot.
    ///
    /// `queue` holds the indices to process, in list order. The slot guard
    /// is held for the whole pass and released on return.
    async fn drive(
        &self,
        executor: &dyn ItemExecutor,
        queue: Vec<usize>,
        cancel: CancellationToken,
        run_id: Uuid,
        _slot: SlotGuard<'_>,
    ) -> OperationProgress {
        let started_at = Instant::now();
        let mut rate = RateEstimator::new();

        {
            let mut state = self.state.lock().await;
            // Baseline sample so the first settle has a delta to measure against
            rate.record(Duration::ZERO, state.transferred_bytes());

            if queue.is_empty() {
                state.finished = true;
                self.publish_locked(&state, None, started_at, &rate);
            } else {
                self.publish_locked(&state, Some(queue[0]), started_at, &rate);
            }
        }

        for (pos, &idx) in queue.iter().enumerate() {
            if cancel.is_cancelled() {
                let mut state = self.state.lock().await;
                state.cancelled = true;
                state.finished = true;
                self.publish_locked(&state, None, started_at, &rate);
                break;
            }

            let item = {
                let state = self.state.lock().await;
                state.items[idx].clone()
            };

            self.emitter.emit(TransferEvent::item_started(
                run_id,
                item.key.as_str(),
                &item.display_name,
            ));
            tracing::debug!(key = %item.key, "Transferring item");

            let result = executor.execute(&item).await;

            let mut state = self.state.lock().await;
            let mut fatal = false;
            match result {
                Ok(()) => {
                    state.outcomes[idx] = ItemOutcome::Completed;
                    self.emitter.emit(TransferEvent::item_completed(
                        run_id,
                        item.key.as_str(),
                        item.size_bytes,
                    ));
                    tracing::debug!(key = %item.key, "Item transfer completed");
                }
                Err(err) => {
                    let recoverable = err.is_recoverable();
                    state.outcomes[idx] = ItemOutcome::Failed;
                    state.errors.push(err.to_string());
                    if !recoverable {
                        state.can_resume = false;
                        fatal = true;
                    }
                    self.emitter.emit(TransferEvent::item_failed(
                        run_id,
                        item.key.as_str(),
                        err.to_string(),
                        recoverable,
                    ));
                    tracing::warn!(key = %item.key, error = %err, "Item transfer failed");
                }
            }

            rate.record(started_at.elapsed(), state.transferred_bytes());

            let cancelled_now = cancel.is_cancelled();
            let last = pos + 1 == queue.len();
            let done = last || fatal || cancelled_now;
            if done {
                state.finished = true;
                if cancelled_now && !last {
                    // Items remain unstarted; they settle as neither
                    // completed nor failed
                    state.cancelled = true;
                }
            }
            let next = if done { None } else { Some(queue[pos + 1]) };
            self.publish_locked(&state, next, started_at, &rate);
            drop(state);

            if done {
                break;
            }
        }

        // The slot stays held until the terminal snapshot is taken, so a
        // concurrent start cannot replace it first
        let snapshot = self.progress();
        self.emit_terminal(&snapshot, run_id);
        snapshot
    }

    /// Publish a snapshot built from the locked state.
    ///
    /// The settle result and the next current item land in one publish, so
    /// observers never see a current item that has already finished.
    fn publish_locked(
        &self,
        state: &RunState,
        current: Option<usize>,
        started_at: Instant,
        rate: &RateEstimator,
    ) {
        let transferred = state.transferred_bytes();
        let remaining = state.total_bytes().saturating_sub(transferred);
        let snapshot = state.snapshot(
            current,
            started_at.elapsed().as_secs_f64(),
            rate.bytes_per_second(),
            rate.eta_seconds(remaining),
        );
        self.progress_tx.send_replace(snapshot);
    }

    fn emit_terminal(&self, snapshot: &OperationProgress, run_id: Uuid) {
        match snapshot.status {
            OperationStatus::Completed => {
                self.emitter.emit(TransferEvent::completed(run_id));
                tracing::info!(
                    run_id = %run_id,
                    items = snapshot.completed_items,
                    "Transfer operation completed"
                );
            }
            OperationStatus::Cancelled => {
                self.emitter.emit(TransferEvent::cancelled(run_id));
                tracing::info!(run_id = %run_id, "Transfer operation cancelled");
            }
            OperationStatus::Failed => {
                self.emitter.emit(TransferEvent::failed(
                    run_id,
                    snapshot.failed_items,
                    snapshot.can_resume,
                ));
                tracing::warn!(
                    run_id = %run_id,
                    failed = snapshot.failed_items,
                    can_resume = snapshot.can_resume,
                    "Transfer operation failed"
                );
            }
            OperationStatus::Idle | OperationStatus::Running => {}
        }
    }
}

impl Default for TransferRunner {
    fn default() -> Self {
        Self::new()
    }
}
