//! Concurrency-bounded dispatch of reconciliation work.
//!
//! Every unit of work runs in its own tokio task. Before running, a task
//! takes a permit from a global semaphore, which bounds how many units run
//! at once, and then the lock for its cluster identity, so two units for the
//! same cluster never overlap. Units for different clusters run in parallel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use tokio::sync::{OwnedMutexGuard, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::controller::handler::{Reconciler, SweepCounts};
use crate::crd::RedisFailover;

/// Table of per-identity locks.
///
/// Entries exist only while some task holds or waits for them.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    entries: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    /// Wait for exclusive access to `key`.
    pub async fn lock(self: &Arc<Self>, key: &str) -> KeyGuard {
        let mutex = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(key.to_string()).or_default())
        };
        let guard = mutex.lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            table: Arc::clone(self),
            guard: Some(guard),
        }
    }

    /// Number of identities currently locked or waited on.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            entries.remove(key);
        }
    }
}

/// Exclusive access to one identity; releases and evicts on drop.
pub struct KeyGuard {
    key: String,
    table: Arc<KeyedLocks>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.table.release(&self.key);
    }
}

/// Runs reconciler calls under the admission bound and per-identity locks.
pub struct Dispatcher<R> {
    reconciler: Arc<R>,
    admission: Arc<Semaphore>,
    locks: Arc<KeyedLocks>,
}

impl<R> Clone for Dispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            reconciler: Arc::clone(&self.reconciler),
            admission: Arc::clone(&self.admission),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<R: Reconciler> Dispatcher<R> {
    /// `max_concurrency` must be at least 1.
    pub fn new(reconciler: Arc<R>, max_concurrency: usize) -> Self {
        Self {
            reconciler,
            admission: Arc::new(Semaphore::new(max_concurrency.max(1))),
            locks: Arc::new(KeyedLocks::default()),
        }
    }

    /// The per-identity lock table.
    pub fn locks(&self) -> &Arc<KeyedLocks> {
        &self.locks
    }

    pub fn on_add(&self, rf: RedisFailover) -> JoinHandle<()> {
        let reconciler = Arc::clone(&self.reconciler);
        self.spawn_unit(rf.identity(), async move { reconciler.on_add(rf).await })
    }

    pub fn on_update(&self, old: RedisFailover, new: RedisFailover) -> JoinHandle<()> {
        let reconciler = Arc::clone(&self.reconciler);
        self.spawn_unit(new.identity(), async move {
            reconciler.on_update(old, new).await
        })
    }

    pub fn on_delete(&self, rf: RedisFailover) -> JoinHandle<()> {
        let reconciler = Arc::clone(&self.reconciler);
        self.spawn_unit(rf.identity(), async move { reconciler.on_delete(rf).await })
    }

    /// Sweep all clusters: one keyed unit per cluster, then report the totals.
    pub fn on_status(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let listed = {
                let Ok(_permit) = Arc::clone(&this.admission).acquire_owned().await else {
                    warn!("Admission closed, skipping sweep");
                    return;
                };
                this.reconciler.list_clusters().await
            };
            let clusters = match listed {
                Ok(clusters) => clusters,
                Err(e) => {
                    error!(error = %e, "Failed to list RedisFailovers");
                    return;
                }
            };

            let units: Vec<_> = clusters
                .into_iter()
                .map(|rf| {
                    let reconciler = Arc::clone(&this.reconciler);
                    this.spawn_keyed(rf.identity(), async move {
                        reconciler.check_cluster(rf).await
                    })
                })
                .collect();

            let mut counts = SweepCounts::default();
            for result in join_all(units).await {
                match result {
                    Ok(Some(health)) => counts.record(health),
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "Cluster check task failed"),
                }
            }
            debug!(?counts, "Sweep finished");
            this.reconciler.report_cluster_counts(counts);
        })
    }

    fn spawn_unit<F>(&self, key: String, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let admission = Arc::clone(&self.admission);
        let locks = Arc::clone(&self.locks);
        tokio::spawn(async move {
            run_keyed(admission, locks, key, work).await;
        })
    }

    fn spawn_keyed<F, T>(&self, key: String, work: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let admission = Arc::clone(&self.admission);
        let locks = Arc::clone(&self.locks);
        tokio::spawn(run_keyed(admission, locks, key, work))
    }
}

/// Run `work` once an admission permit and the lock for `key` are held.
///
/// Resolves to `None` if the admission semaphore was closed.
async fn run_keyed<F, T>(
    admission: Arc<Semaphore>,
    locks: Arc<KeyedLocks>,
    key: String,
    work: F,
) -> Option<T>
where
    F: Future<Output = T>,
{
    let Ok(_permit) = admission.acquire_owned().await else {
        warn!(key = %key, "Admission closed, dropping work");
        return None;
    };
    let _guard = locks.lock(&key).await;
    Some(work.await)
}
