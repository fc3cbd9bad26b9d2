//! Best-effort blob removal used by the entity handlers.
//!
//! A cleanup never changes the outcome of the request that scheduled it: it is
//! retried according to [`CleanupPolicy`] and then abandoned with a log line.
//! Rollback and replacement cleanups run on a background task through
//! [`spawn_discard`]; detaching before a row delete is awaited inline.
//! An abandoned cleanup leaves an orphaned file behind, never a dangling
//! reference, because every caller only discards blobs that no row points at
//! (or is about to stop pointing at).

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::storage::{BlobStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(200),
        }
    }
}

/// Why a blob is being discarded; only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// The row write that would have referenced the blob failed.
    Rollback,
    /// The row now references a newer blob.
    Replaced,
    /// The owning row is about to be deleted.
    Detach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    Abandoned { attempts: u32 },
}

pub struct BlobCleanup<'a> {
    store: &'a dyn BlobStore,
    policy: CleanupPolicy,
}

impl<'a> BlobCleanup<'a> {
    pub fn new(store: &'a dyn BlobStore, policy: CleanupPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn discard(&self, reference: &str, reason: CleanupReason) -> CleanupOutcome {
        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            match self.store.delete(reference).await {
                Ok(()) => {
                    debug!(%reference, ?reason, attempt, "blob cleanup done");
                    return CleanupOutcome::Removed;
                }
                Err(e @ StorageError::PathTraversal(_)) => {
                    error!(%reference, ?reason, error = %e, "blob cleanup abandoned: unsafe reference");
                    return CleanupOutcome::Abandoned { attempts: attempt };
                }
                Err(e) => {
                    warn!(%reference, ?reason, attempt, error = %e, "blob cleanup failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }
        error!(%reference, ?reason, attempts, "blob cleanup abandoned; file left orphaned");
        CleanupOutcome::Abandoned { attempts }
    }
}

/// Runs [`BlobCleanup::discard`] on its own task so the response does not wait
/// for retries.
pub fn spawn_discard(
    store: Arc<dyn BlobStore>,
    policy: CleanupPolicy,
    reference: String,
    reason: CleanupReason,
) -> JoinHandle<CleanupOutcome> {
    tokio::spawn(async move {
        BlobCleanup::new(store.as_ref(), policy)
            .discard(&reference, reason)
            .await
    })
}
