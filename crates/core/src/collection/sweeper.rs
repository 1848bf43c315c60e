//! Recurring background sweep for a collection
//!
//! The sweep loop holds only a weak reference to the store and stops when the
//! owning collection is dropped (its [`Sweeper`] cancels the token) or when
//! the store is gone. A task-mode loop also ends when its runtime shuts
//! down; that exit is logged at `warn` because the collection keeps serving
//! without periodic sweeps from then on.

use std::sync::Weak;
use std::thread;
use std::time::Duration;

use smartcache_common::time::Clock;
use tokio::runtime::{Builder, Handle};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::Store;
use crate::error::{CacheError, CacheResult};
use crate::value::CacheValue;

/// Where the sweep loop is running
enum Worker {
    /// Spawned onto the tokio runtime that was current at construction
    Task(JoinHandle<()>),
    /// Dedicated thread driving its own current-thread runtime
    Thread(thread::JoinHandle<()>),
}

/// Handle to a running sweep loop; dropping it stops the loop
pub(crate) struct Sweeper {
    cancel: CancellationToken,
    worker: Worker,
}

impl Sweeper {
    /// Start sweeping `store` every `interval`.
    ///
    /// Runs on the current tokio runtime when there is one, otherwise on a
    /// dedicated thread.
    pub(crate) fn spawn<V, C>(
        collection: &str,
        store: Weak<Store<V, C>>,
        interval: Duration,
    ) -> CacheResult<Self>
    where
        V: CacheValue,
        C: Clock,
    {
        let cancel = CancellationToken::new();
        let sweep = sweep_loop(collection.to_owned(), store, interval, cancel.clone());

        let worker = if let Ok(handle) = Handle::try_current() {
            Worker::Task(handle.spawn(sweep))
        } else {
            let runtime = Builder::new_current_thread().enable_time().build().map_err(|e| {
                CacheError::configuration(format!(
                    "failed to build sweep runtime for '{collection}': {e}"
                ))
            })?;
            let thread = thread::Builder::new()
                .name(format!("smartcache-gc-{collection}"))
                .spawn(move || runtime.block_on(sweep))
                .map_err(|e| {
                    CacheError::configuration(format!(
                        "failed to spawn sweep thread for '{collection}': {e}"
                    ))
                })?;
            Worker::Thread(thread)
        };

        info!(
            collection,
            interval_ms = interval.as_millis() as u64,
            "started background sweep"
        );
        Ok(Self { cancel, worker })
    }

    pub(crate) fn is_running(&self) -> bool {
        match &self.worker {
            Worker::Task(handle) => !handle.is_finished(),
            Worker::Thread(handle) => !handle.is_finished(),
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Dropped with the sweep future; warns unless the loop was told to stop
struct LoopExit {
    collection: String,
    cancel: CancellationToken,
    finished: bool,
}

impl Drop for LoopExit {
    fn drop(&mut self) {
        if !self.finished && !self.cancel.is_cancelled() {
            warn!(
                collection = %self.collection,
                "background sweep stopped by runtime shutdown; expired entries are removed on access only"
            );
        }
    }
}

async fn sweep_loop<V, C>(
    collection: String,
    store: Weak<Store<V, C>>,
    interval: Duration,
    cancel: CancellationToken,
) where
    V: CacheValue,
    C: Clock,
{
    let mut exit = LoopExit { collection, cancel, finished: false };
    let collection = exit.collection.clone();
    let cancel = exit.cancel.clone();

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; sweeping starts one period in.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(collection = %collection, "background sweep cancelled");
                break;
            }
            _ = ticker.tick() => {
                let Some(store) = store.upgrade() else {
                    debug!(collection = %collection, "collection dropped, stopping sweep");
                    break;
                };
                let removed = store.sweep();
                if removed > 0 {
                    debug!(collection = %collection, removed, "swept expired entries");
                }
            }
        }
    }
    exit.finished = true;
}
