//! In-process per-group reader/writer locks.
//!
//! Ordinary writes share a group's lock so they run concurrently and rely on
//! the ledger row version for serialization. Recalculation takes the lock
//! exclusively so no write can interleave with the delete-and-replay.

use std::sync::Arc;

use dashmap::DashMap;
use splitledger_shared::types::GroupId;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Lock table keyed by group.
#[derive(Debug, Clone, Default)]
pub struct GroupLocks {
    inner: Arc<DashMap<GroupId, Arc<RwLock<()>>>>,
}

impl GroupLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, group_id: GroupId) -> Arc<RwLock<()>> {
        Arc::clone(self.inner.entry(group_id).or_default().value())
    }

    /// Shared access for an ordinary write.
    pub async fn write_access(&self, group_id: GroupId) -> OwnedRwLockReadGuard<()> {
        self.lock_for(group_id).read_owned().await
    }

    /// Exclusive access for a recalculation.
    pub async fn exclusive(&self, group_id: GroupId) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(group_id).write_owned().await
    }
}
