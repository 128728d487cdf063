// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Running tasks that can be replaced by a later call with the same name.

use std::time::Duration;

use log::{info, warn};

use crate::{
    error::{ProvisionError, Result},
    store::{DeleteOptions, TaskStore},
    task::{TaskDefinition, TaskHandle},
};

/// How long `delete_task()` waits for a deleted task to disappear.
///
/// A pod can easily take 60s to time out before deletion, so the default budget of 30 polls every
/// 3s leaves some buffer on top of that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeletionPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for DeletionPolicy {
    fn default() -> Self {
        DeletionPolicy {
            interval: Duration::from_secs(3),
            attempts: 30,
        }
    }
}

/// Make sure exactly one task named `definition.name` exists in the store.
///
/// If a task by that name is still running and `force_replace` is not set, it is left alone and
/// its handle returned, so that an operator restart does not interrupt work already under way.
/// Otherwise a previous task is deleted (waiting for it to go away) and a new one is created from
/// `definition`.
pub async fn ensure_task(
    store: &dyn TaskStore,
    definition: &TaskDefinition,
    force_replace: bool,
    deletion: &DeletionPolicy,
) -> Result<TaskHandle> {
    let namespace = &definition.namespace;
    let name = &definition.name;

    match store.get_task(namespace, name).await {
        Ok(existing) => {
            if existing.status.is_active() && !force_replace {
                info!("Found previous task {name}. Status={:?}", existing.status);
                return Ok(existing.handle);
            }

            info!("Removing previous task {name} to start a new one");
            delete_task(store, namespace, name, true, deletion)
                .await
                .map_err(|source| match source {
                    ProvisionError::Store(source) => ProvisionError::Deletion {
                        name: name.clone(),
                        source,
                    },
                    other => other,
                })?;
        }
        Err(e) if e.is_not_found() => {}
        // The lookup failing doesn't mean the task can't be created, so carry on and let the
        // create call report any real problem.
        Err(e) => warn!("failed to detect task {name}: {e}"),
    }

    store
        .create_task(definition)
        .await
        .map_err(|source| ProvisionError::Submission {
            name: name.clone(),
            source,
        })
}

/// Delete a task with foreground propagation and no grace period.
///
/// A task that is already gone counts as deleted. With `wait` set, poll until the task object
/// disappears. Running out of attempts is only logged: a stuck teardown must not block the
/// caller, and a following create will report a conflict if the task really is still there.
pub async fn delete_task(
    store: &dyn TaskStore,
    namespace: &str,
    name: &str,
    wait: bool,
    policy: &DeletionPolicy,
) -> Result<()> {
    match store
        .delete_task(namespace, name, DeleteOptions::immediate_foreground())
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    if !wait {
        return Ok(());
    }

    for _ in 0..policy.attempts {
        match store.get_task(namespace, name).await {
            Err(e) if e.is_not_found() => {
                info!("task {name} deleted");
                return Ok(());
            }
            _ => info!("task {name} still exists"),
        }

        tokio::time::sleep(policy.interval).await;
    }

    warn!("gave up waiting for task {name} to be deleted");
    Ok(())
}
