//! End-to-end flows for the transfer engine: a pack push with a transient
//! failure, the retry pass, the chained cleanup, and the snapshot
//! invariants an observer can rely on mid-flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use packvault_transfer::{
    BackupChain, ChainDeps, ChainPhase, CleanupPlanner, ItemExecutor, OperationProgress,
    OperationStatus, TransferError, TransferEvent, TransferEventEmitterPort, TransferItem,
    TransferResult, TransferRunner,
};

fn item(key: &str, size: u64) -> TransferItem {
    TransferItem::new(key, format!("{key}.safetensors"), size)
}

/// In-memory stand-in for local storage plus the remote vault.
#[derive(Default)]
struct FakeVault {
    local: Mutex<HashMap<String, u64>>,
    remote: Mutex<HashMap<String, u64>>,
    push_failures: Mutex<Vec<(String, TransferError)>>,
}

impl FakeVault {
    fn seeded(blobs: &[(&str, u64)]) -> Arc<Self> {
        let vault = Self::default();
        {
            let mut local = vault.local.lock().unwrap();
            for (key, size) in blobs {
                local.insert((*key).to_string(), *size);
            }
        }
        Arc::new(vault)
    }

    fn fail_push_once(&self, key: &str, err: TransferError) {
        self.push_failures
            .lock()
            .unwrap()
            .push((key.to_string(), err));
    }

    fn local_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.local.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn remote_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.remote.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Pushes a local blob to the vault, honoring scripted one-shot failures.
struct PushExecutor {
    vault: Arc<FakeVault>,
}

#[async_trait]
impl ItemExecutor for PushExecutor {
    async fn execute(&self, item: &TransferItem) -> TransferResult<()> {
        {
            let mut failures = self.vault.push_failures.lock().unwrap();
            if let Some(pos) = failures.iter().position(|(k, _)| k == item.key.as_str()) {
                let (_, err) = failures.remove(pos);
                return Err(err);
            }
        }
        self.vault
            .remote
            .lock()
            .unwrap()
            .insert(item.key.to_string(), item.size_bytes);
        Ok(())
    }
}

/// Frees the local copy of a blob.
struct DeleteExecutor {
    vault: Arc<FakeVault>,
}

#[async_trait]
impl ItemExecutor for DeleteExecutor {
    async fn execute(&self, item: &TransferItem) -> TransferResult<()> {
        self.vault.local.lock().unwrap().remove(item.key.as_str());
        Ok(())
    }
}

/// Offers up blobs that are locally present and confirmed held by the
/// vault at planning time.
struct VaultPlanner {
    vault: Arc<FakeVault>,
}

#[async_trait]
impl CleanupPlanner for VaultPlanner {
    async fn plan(&self) -> TransferResult<Vec<TransferItem>> {
        let local = self.vault.local.lock().unwrap();
        let remote = self.vault.remote.lock().unwrap();
        let mut plan: Vec<TransferItem> = local
            .iter()
            .filter(|(key, _)| remote.contains_key(*key))
            .map(|(key, size)| item(key, *size))
            .collect();
        plan.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        Ok(plan)
    }
}

fn vault_deps(vault: &Arc<FakeVault>) -> ChainDeps<PushExecutor, DeleteExecutor, VaultPlanner> {
    ChainDeps {
        backup_executor: Arc::new(PushExecutor {
            vault: Arc::clone(vault),
        }),
        cleanup_executor: Arc::new(DeleteExecutor {
            vault: Arc::clone(vault),
        }),
        cleanup_planner: Arc::new(VaultPlanner {
            vault: Arc::clone(vault),
        }),
    }
}

/// Emitter that captures every event in order.
#[derive(Clone, Default)]
struct CapturingEmitter {
    events: Arc<Mutex<Vec<TransferEvent>>>,
}

impl CapturingEmitter {
    fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TransferEventEmitterPort for CapturingEmitter {
    fn emit(&self, event: TransferEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn clone_box(&self) -> Box<dyn TransferEventEmitterPort> {
        Box::new(self.clone())
    }
}

#[tokio::test]
async fn push_with_transient_failure_then_retry_frees_everything() {
    let vault = FakeVault::seeded(&[("a", 100), ("b", 50), ("c", 25)]);
    vault.fail_push_once("b", TransferError::network("timeout"));
    let deps = vault_deps(&vault);
    let chain = BackupChain::new();

    let items = vec![item("a", 100), item("b", 50), item("c", 25)];
    let first = chain.run(items, true, &deps).await.unwrap();

    // "b" failed transiently; "a" and "c" were pushed and are now safe to
    // free, while "b" must survive locally
    assert_eq!(first.backup.completed_items, 2);
    assert_eq!(first.backup.failed_items, 1);
    assert_eq!(first.backup.errors, vec!["Network error: timeout"]);
    assert!(first.backup.can_resume);
    assert_eq!(first.phase, ChainPhase::Completed);
    assert_eq!(vault.remote_keys(), vec!["a", "c"]);
    assert_eq!(vault.local_keys(), vec!["b"]);

    let second = chain.retry_backup(true, &deps).await.unwrap();

    assert_eq!(second.backup.completed_items, 3);
    assert_eq!(second.backup.failed_items, 0);
    assert!(second.backup.errors.is_empty());
    assert_eq!(second.phase, ChainPhase::Completed);
    assert_eq!(vault.remote_keys(), vec!["a", "b", "c"]);
    assert!(vault.local_keys().is_empty());
}

#[tokio::test]
async fn fatal_push_keeps_local_copies_untouched() {
    let vault = FakeVault::seeded(&[("a", 100), ("b", 4096)]);
    vault.fail_push_once("b", TransferError::insufficient_space(4096, 100));
    let deps = vault_deps(&vault);
    let chain = BackupChain::new();

    let outcome = chain
        .run(vec![item("a", 100), item("b", 4096)], true, &deps)
        .await
        .unwrap();

    assert_eq!(outcome.phase, ChainPhase::BackupFailed);
    assert!(!outcome.backup.can_resume);
    assert!(outcome.cleanup.is_none());
    // Even the successfully pushed blob stays local: cleanup never ran
    assert_eq!(vault.local_keys(), vec!["a", "b"]);
}

#[tokio::test]
async fn event_stream_is_consistent_with_the_terminal_snapshot() {
    let vault = FakeVault::seeded(&[("a", 10), ("b", 20), ("c", 30)]);
    vault.fail_push_once("c", TransferError::network("connection reset"));
    let emitter = CapturingEmitter::default();
    let runner = TransferRunner::with_emitter(Arc::new(emitter.clone()));
    let executor = PushExecutor {
        vault: Arc::clone(&vault),
    };

    let snapshot = runner
        .start(vec![item("a", 10), item("b", 20), item("c", 30)], &executor)
        .await
        .unwrap();

    let events = emitter.events();
    let completed = events
        .iter()
        .filter(|e| matches!(e, TransferEvent::ItemCompleted { .. }))
        .count();
    let failed = events
        .iter()
        .filter(|e| matches!(e, TransferEvent::ItemFailed { .. }))
        .count();

    assert_eq!(completed as u32, snapshot.completed_items);
    assert_eq!(failed as u32, snapshot.failed_items);
    assert_eq!(snapshot.status, OperationStatus::Failed);
    assert_eq!(
        events.last().map(TransferEvent::event_name),
        Some("transfer:failed")
    );
}

/// Executor that records the runner's published snapshot at every call,
/// from the observer's side of the watch channel.
struct ProbingExecutor {
    runner: Mutex<Option<Arc<TransferRunner>>>,
    observed: Mutex<Vec<OperationProgress>>,
    vault: Arc<FakeVault>,
}

#[async_trait]
impl ItemExecutor for ProbingExecutor {
    async fn execute(&self, item: &TransferItem) -> TransferResult<()> {
        if let Some(runner) = self.runner.lock().unwrap().as_ref() {
            self.observed.lock().unwrap().push(runner.progress());
        }
        self.vault
            .remote
            .lock()
            .unwrap()
            .insert(item.key.to_string(), item.size_bytes);
        Ok(())
    }
}

#[tokio::test]
async fn snapshots_observed_mid_flight_satisfy_the_invariants() {
    let vault = FakeVault::seeded(&[("a", 10), ("b", 0), ("c", 30), ("d", 40)]);
    let runner = Arc::new(TransferRunner::new());
    let executor = ProbingExecutor {
        runner: Mutex::new(Some(Arc::clone(&runner))),
        observed: Mutex::new(Vec::new()),
        vault,
    };

    let items = vec![item("a", 10), item("b", 0), item("c", 30), item("d", 40)];
    let terminal = runner.start(items.clone(), &executor).await.unwrap();

    let observed = executor.observed.lock().unwrap().clone();
    assert_eq!(observed.len(), items.len());

    let mut last_settled = 0;
    for (idx, snapshot) in observed.iter().enumerate() {
        // Counts never run ahead of settles and never go backward
        let settled = snapshot.completed_items + snapshot.failed_items;
        assert!(settled <= snapshot.total_items);
        assert!(settled >= last_settled);
        last_settled = settled;

        assert_eq!(snapshot.errors.len() as u32, snapshot.failed_items);
        assert!(snapshot.transferred_bytes <= snapshot.total_bytes);
        assert_eq!(snapshot.status, OperationStatus::Running);

        // The published current item is exactly the one whose executor
        // call is outstanding
        assert_eq!(
            snapshot.current_item.as_ref().map(|i| i.key.as_str()),
            Some(items[idx].key.as_str())
        );

        // Byte credit is whole-item only: the in-flight item contributes
        // nothing yet
        let credited: u64 = items[..idx].iter().map(|i| i.size_bytes).sum();
        assert_eq!(snapshot.transferred_bytes, credited);
    }

    assert_eq!(terminal.status, OperationStatus::Completed);
    assert_eq!(terminal.transferred_bytes, 80);
    assert!(terminal.current_item.is_none());
}
