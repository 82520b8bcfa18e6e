//! Event and sweep driver.
//!
//! Turns the RedisFailover watch stream into dispatcher calls and fires the
//! periodic health sweep. The driver keeps the last seen version of every
//! cluster so updates can be handed over together with their predecessor.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use futures::{Stream, StreamExt};
use kube::runtime::watcher;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::controller::dispatcher::Dispatcher;
use crate::controller::handler::Reconciler;
use crate::crd::RedisFailover;

/// Default interval between health sweeps
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(180);

/// Feeds watch events and sweep ticks into a [`Dispatcher`].
pub struct EventDriver<R> {
    dispatcher: Dispatcher<R>,
    resync_interval: Duration,
    seen: HashMap<String, RedisFailover>,
    relisted: Option<HashSet<String>>,
}

impl<R: Reconciler> EventDriver<R> {
    pub fn new(dispatcher: Dispatcher<R>, resync_interval: Duration) -> Self {
        Self {
            dispatcher,
            resync_interval,
            seen: HashMap::new(),
            relisted: None,
        }
    }

    /// Consume `events` until the stream ends or `shutdown` resolves.
    ///
    /// Dispatched work is not awaited; tasks still running at shutdown are
    /// left alone.
    pub async fn run<S, F>(mut self, events: S, shutdown: F)
    where
        S: Stream<Item = Result<watcher::Event<RedisFailover>, watcher::Error>>,
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.resync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first sweep waits a full interval.
        ticker.tick().await;

        tokio::pin!(events);
        tokio::pin!(shutdown);

        info!(
            resync_secs = self.resync_interval.as_secs(),
            "Starting RedisFailover event driver"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping event driver");
                    break;
                }
                _ = ticker.tick() => {
                    debug!("Starting health sweep");
                    drop(self.dispatcher.on_status());
                }
                event = events.next() => match event {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => warn!(error = %e, "RedisFailover watch error"),
                    None => {
                        error!("RedisFailover watch stream ended unexpectedly");
                        break;
                    }
                },
            }
        }
    }

    /// Route one watch event to the dispatcher.
    pub fn handle_event(&mut self, event: watcher::Event<RedisFailover>) {
        match event {
            watcher::Event::Apply(rf) => self.apply(rf),
            watcher::Event::Delete(rf) => {
                self.seen.remove(&rf.identity());
                drop(self.dispatcher.on_delete(rf));
            }
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
            }
            watcher::Event::InitApply(rf) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(rf.identity());
                }
                self.apply(rf);
            }
            watcher::Event::InitDone => self.finish_relist(),
        }
    }

    fn apply(&mut self, rf: RedisFailover) {
        match self.seen.insert(rf.identity(), rf.clone()) {
            None => drop(self.dispatcher.on_add(rf)),
            Some(previous) => drop(self.dispatcher.on_update(previous, rf)),
        }
    }

    /// Clusters missing from a completed re-list were deleted while unobserved.
    fn finish_relist(&mut self) {
        let Some(relisted) = self.relisted.take() else {
            return;
        };
        let stale: Vec<String> = self
            .seen
            .keys()
            .filter(|identity| !relisted.contains(*identity))
            .cloned()
            .collect();
        for identity in stale {
            if let Some(rf) = self.seen.remove(&identity) {
                info!(identity = %identity, "RedisFailover disappeared during re-list");
                drop(self.dispatcher.on_delete(rf));
            }
        }
    }

    /// Number of clusters in the last-seen cache.
    pub fn known_clusters(&self) -> usize {
        self.seen.len()
    }
}
