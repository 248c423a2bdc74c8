//! Progress persistence: versioned user snapshots with compare-and-swap writes.
//!
//! The orchestrator reads a snapshot with its version, computes the next
//! snapshot purely, and writes it back only if nobody else wrote in between.
//! Stores never merge; they either commit or report a conflict.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::{UserId, UserProgress};
use crate::error::StoreError;

/// A snapshot together with the version it was read at.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed { version: u64 },
    /// The stored version moved on since the read.
    Conflict { current: u64 },
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Load a user's snapshot, `None` when unknown.
    async fn load(&self, user_id: &str) -> Result<Option<Versioned<UserProgress>>, StoreError>;

    /// Create a new snapshot at version 1. Returns `false` if the id exists.
    async fn insert(&self, progress: UserProgress) -> Result<bool, StoreError>;

    /// Replace the snapshot only if it is still at `expected_version`.
    async fn compare_and_swap(
        &self,
        expected_version: u64,
        next: UserProgress,
    ) -> Result<WriteOutcome, StoreError>;
}

/// In-process store; the default backend for the host and for tests.
#[derive(Clone, Default)]
pub struct InMemoryProgressStore {
    users: Arc<RwLock<HashMap<UserId, Versioned<UserProgress>>>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    #[instrument(level = "debug", skip(self))]
    async fn load(&self, user_id: &str) -> Result<Option<Versioned<UserProgress>>, StoreError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    #[instrument(level = "debug", skip(self, progress), fields(user_id = %progress.user_id))]
    async fn insert(&self, progress: UserProgress) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&progress.user_id) {
            return Ok(false);
        }
        users.insert(progress.user_id.clone(), Versioned { version: 1, value: progress });
        Ok(true)
    }

    #[instrument(level = "debug", skip(self, next), fields(user_id = %next.user_id))]
    async fn compare_and_swap(
        &self,
        expected_version: u64,
        next: UserProgress,
    ) -> Result<WriteOutcome, StoreError> {
        let mut users = self.users.write().await;
        let Some(slot) = users.get_mut(&next.user_id) else {
            return Err(StoreError::Corrupt(format!(
                "compare_and_swap on missing user {}",
                next.user_id
            )));
        };
        if slot.version != expected_version {
            debug!(target: "store", user_id = %next.user_id, expected_version, current = slot.version, "Version conflict");
            return Ok(WriteOutcome::Conflict { current: slot.version });
        }
        slot.version += 1;
        slot.value = next;
        Ok(WriteOutcome::Committed { version: slot.version })
    }
}
