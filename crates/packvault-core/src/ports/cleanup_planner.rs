//! Cleanup planner port.
//!
//! After a backup pass, the chain asks the planner which blobs are safe to
//! free locally. Resolving this *after* the backup - against current local
//! and vault membership - is what prevents deleting a blob whose push never
//! actually landed.

use async_trait::async_trait;

use crate::transfer::{TransferItem, TransferResult};

/// Port for resolving the cleanup item set.
#[async_trait]
pub trait CleanupPlanner: Send + Sync {
    /// Resolve the blobs that are locally present and confirmed held by the
    /// vault right now. An empty plan means nothing needs freeing.
    async fn plan(&self) -> TransferResult<Vec<TransferItem>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyPlanner;

    #[async_trait]
    impl CleanupPlanner for EmptyPlanner {
        async fn plan(&self) -> TransferResult<Vec<TransferItem>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_planner_is_object_safe() {
        let planner: &dyn CleanupPlanner = &EmptyPlanner;
        assert!(planner.plan().await.unwrap().is_empty());
    }
}
