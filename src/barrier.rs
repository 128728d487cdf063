// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Waiting for every preparation task of a run to finish.
//!
//! The watcher runs as its own tokio task and reports a single boolean on a oneshot channel:
//! `true` once every task in the aggregate has succeeded, `false` if a status lookup fails, the
//! deadline passes, or the wait is cancelled. Nothing else is ever sent, and the channel is never
//! left without a value unless the watcher itself panics.

use std::{sync::Arc, time::Duration};

use futures::future;
use log::{debug, info, warn};
use tokio::{sync::oneshot, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::store::TaskStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarrierConfig {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        BarrierConfig {
            interval: Duration::from_secs(20),
            deadline: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// The set of tasks the barrier waits on. Fixed when the watcher starts.
#[derive(Debug, Clone)]
struct Aggregate {
    namespace: String,
    names: Vec<String>,
}

impl Aggregate {
    /// Fetch the status of every task concurrently and count those that have succeeded.
    async fn complete_count(&self, store: &dyn TaskStore) -> Result<usize, String> {
        let lookups = self
            .names
            .iter()
            .map(|name| store.get_task(&self.namespace, name));

        let mut complete = 0;
        for (name, result) in self.names.iter().zip(future::join_all(lookups).await) {
            match result {
                Ok(task) if task.status.is_complete() => complete += 1,
                Ok(task) => debug!("task {name} not complete yet: {:?}", task.status),
                Err(e) => return Err(format!("failed to get status of task {name}: {e}")),
            }
        }
        Ok(complete)
    }
}

/// Start watching `task_names` in `namespace`. The returned receiver yields exactly one value.
pub fn spawn_watcher(
    store: Arc<dyn TaskStore>,
    namespace: &str,
    task_names: Vec<String>,
    config: BarrierConfig,
    cancel: CancellationToken,
) -> oneshot::Receiver<bool> {
    let (tx, rx) = oneshot::channel();
    let aggregate = Aggregate {
        namespace: namespace.to_string(),
        names: task_names,
    };

    tokio::spawn(async move {
        let released = watch(store.as_ref(), &aggregate, config, &cancel).await;
        if tx.send(released).is_err() {
            debug!("barrier result dropped, nobody is waiting");
        }
    });

    rx
}

async fn watch(
    store: &dyn TaskStore,
    aggregate: &Aggregate,
    config: BarrierConfig,
    cancel: &CancellationToken,
) -> bool {
    let total = aggregate.names.len();

    // Status lookups run inside this future; a hung lookup must still lose to the deadline and
    // to cancellation.
    let poll = async {
        // The first tick fires immediately.
        let mut ticker = tokio::time::interval(config.interval.max(Duration::from_millis(1)));
        loop {
            ticker.tick().await;
            match aggregate.complete_count(store).await {
                Ok(complete) if complete == total => {
                    info!("all {total} format tasks complete");
                    return true;
                }
                Ok(complete) => {
                    info!("format tasks still running ({complete}/{total} complete)");
                }
                Err(e) => {
                    warn!("{e}");
                    return false;
                }
            }
        }
    };

    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            info!("wait for format tasks cancelled");
            false
        }
        _ = tokio::time::sleep_until(Instant::now() + config.deadline) => {
            warn!(
                "format tasks did not complete within {}s",
                config.deadline.as_secs()
            );
            false
        }
        verdict = poll => verdict,
    }
}

/// Wait for the watcher's verdict. A watcher that went away without answering counts as a
/// failure.
pub async fn released(rx: oneshot::Receiver<bool>) -> bool {
    rx.await.unwrap_or(false)
}
