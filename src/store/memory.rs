// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! An in-memory task store and node directory.
//!
//! This backs the `plan` and `simulate` commands, and is the store used throughout the test-suite.
//! Faults (failing creates, failing or hanging lookups, deletions that never finish) can be
//! injected per task name, and every call is recorded so that tests can assert on the exact
//! sequence of operations.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Mutex,
};

use {async_trait::async_trait, log::debug};

use super::*;
use crate::{
    error::ObjectKind,
    planner::{ETCD_ADDR_KEY, ETCD_OVERRIDE_OBJECT, MDS_ADDR_KEY, MDS_OVERRIDE_OBJECT},
    spec::ClusterSpec,
    task::TaskStatus,
};

/// A single call made against a `MemoryStore`.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    GetTask(String),
    CreateTask(String),
    DeleteTask(String, DeleteOptions),
    CreateConfigObject(String),
    GetConfigObject(String),
}

/// How long a deleted task lingers before it disappears from `get_task()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeletionLag {
    /// The task is still visible to this many lookups after the delete call.
    Polls(u32),
    /// Teardown is stuck; the task never disappears.
    Never,
}

#[derive(Debug)]
struct StoredTask {
    task: Task,
    /// Set once the task has been deleted but is still being torn down.
    removal: Option<DeletionLag>,
}

#[derive(Debug, Default)]
struct Faults {
    create: HashSet<String>,
    get: HashSet<String>,
    stalled_get: HashSet<String>,
    delete: HashSet<String>,
    deletion_lag: HashMap<String, DeletionLag>,
}

#[derive(Debug)]
struct MemoryNode {
    info: NodeInfo,
    address: String,
}

#[derive(Debug, Default)]
struct Inner {
    tasks: HashMap<(String, String), StoredTask>,
    config_objects: HashMap<(String, String), ConfigObject>,
    nodes: Vec<MemoryNode>,
    faults: Faults,
    calls: Vec<StoreCall>,
    next_generation: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// When set, newly created tasks report a successful completion straight away.
    complete_on_create: bool,
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

fn not_found(kind: ObjectKind, namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose tasks succeed as soon as they are created.
    pub fn completing() -> Self {
        MemoryStore {
            complete_on_create: true,
            ..Default::default()
        }
    }

    pub fn add_node(
        &self,
        name: &str,
        hostname: &str,
        address: &str,
        ready: bool,
        schedulable: bool,
    ) {
        self.inner.lock().unwrap().nodes.push(MemoryNode {
            info: NodeInfo {
                name: name.to_string(),
                hostname: hostname.to_string(),
                ready,
                schedulable,
            },
            address: address.to_string(),
        });
    }

    /// Populate the store with what a running cluster would already have before chunkservers are
    /// provisioned: one ready node per address (named after its hostname), and the endpoint config
    /// objects of the metadata service and etcd, assumed to run on every node.
    pub fn seed_cluster(&self, spec: &ClusterSpec, node_addresses: &BTreeMap<String, String>) {
        for (name, address) in node_addresses {
            self.add_node(name, name, address, true, true);
        }

        let endpoints = |port: u16| -> String {
            node_addresses
                .values()
                .map(|ip| format!("{ip}:{port}"))
                .collect::<Vec<_>>()
                .join(",")
        };
        self.put_config_object(
            spec.namespace(),
            MDS_OVERRIDE_OBJECT,
            BTreeMap::from([(MDS_ADDR_KEY.to_string(), endpoints(spec.mds.port))]),
        );
        self.put_config_object(
            spec.namespace(),
            ETCD_OVERRIDE_OBJECT,
            BTreeMap::from([(ETCD_ADDR_KEY.to_string(), endpoints(spec.etcd.port))]),
        );
    }

    /// Insert a config object directly, bypassing the call log.
    pub fn put_config_object(&self, namespace: &str, name: &str, data: BTreeMap<String, String>) {
        self.inner.lock().unwrap().config_objects.insert(
            key(namespace, name),
            ConfigObject {
                namespace: namespace.to_string(),
                name: name.to_string(),
                data,
                owner: None,
            },
        );
    }

    pub fn config_object(&self, namespace: &str, name: &str) -> Option<ConfigObject> {
        self.inner
            .lock()
            .unwrap()
            .config_objects
            .get(&key(namespace, name))
            .cloned()
    }

    /// Insert a task directly with the given status, as if left over from a previous run.
    pub fn put_task(&self, definition: &TaskDefinition, status: TaskStatus) -> TaskHandle {
        let mut inner = self.inner.lock().unwrap();
        inner.next_generation += 1;
        let handle = TaskHandle {
            namespace: definition.namespace.clone(),
            name: definition.name.clone(),
            generation: inner.next_generation,
        };
        inner.tasks.insert(
            key(&definition.namespace, &definition.name),
            StoredTask {
                task: Task {
                    handle: handle.clone(),
                    definition: definition.clone(),
                    status,
                },
                removal: None,
            },
        );
        handle
    }

    pub fn set_task_status(&self, namespace: &str, name: &str, status: TaskStatus) {
        if let Some(stored) = self.inner.lock().unwrap().tasks.get_mut(&key(namespace, name)) {
            stored.task.status = status;
        }
    }

    /// Mark every live task as having completed successfully.
    pub fn complete_all(&self) {
        for stored in self.inner.lock().unwrap().tasks.values_mut() {
            if stored.removal.is_none() {
                stored.task.status = TaskStatus {
                    active: 0,
                    succeeded: 1,
                    failed: stored.task.status.failed,
                };
            }
        }
    }

    /// Names of the tasks currently visible in the store, sorted.
    pub fn task_names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut names: Vec<String> = inner.tasks.keys().map(|(_, name)| name.clone()).collect();
        names.sort();
        names
    }

    pub fn task(&self, namespace: &str, name: &str) -> Option<Task> {
        self.inner
            .lock()
            .unwrap()
            .tasks
            .get(&key(namespace, name))
            .map(|stored| stored.task.clone())
    }

    pub fn fail_create(&self, name: &str) {
        self.inner.lock().unwrap().faults.create.insert(name.to_string());
    }

    pub fn fail_get(&self, name: &str) {
        self.inner.lock().unwrap().faults.get.insert(name.to_string());
    }

    /// Lookups of `name` never return, like a request to an API server that hangs.
    pub fn stall_get(&self, name: &str) {
        self.inner.lock().unwrap().faults.stalled_get.insert(name.to_string());
    }

    pub fn fail_delete(&self, name: &str) {
        self.inner.lock().unwrap().faults.delete.insert(name.to_string());
    }

    pub fn set_deletion_lag(&self, name: &str, lag: DeletionLag) {
        self.inner
            .lock()
            .unwrap()
            .faults
            .deletion_lag
            .insert(name.to_string(), lag);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn count_calls(&self, matches: impl Fn(&StoreCall) -> bool) -> usize {
        self.inner.lock().unwrap().calls.iter().filter(|c| matches(c)).count()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_task(&self, namespace: &str, name: &str) -> StoreResult<Task> {
        let stalled = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(StoreCall::GetTask(name.to_string()));
            inner.faults.stalled_get.contains(name)
        };
        if stalled {
            debug!("lookup of task {namespace}/{name} stalled");
            std::future::pending::<()>().await;
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.faults.get.contains(name) {
            return Err(StoreError::Backend(format!("lookup of task {name} timed out")));
        }

        let k = key(namespace, name);
        let Some(removal) = inner.tasks.get(&k).map(|stored| stored.removal) else {
            return Err(not_found(ObjectKind::Task, namespace, name));
        };

        if removal == Some(DeletionLag::Polls(0)) {
            inner.tasks.remove(&k);
            debug!("task {namespace}/{name} finished tearing down");
            return Err(not_found(ObjectKind::Task, namespace, name));
        }

        let Some(stored) = inner.tasks.get_mut(&k) else {
            return Err(not_found(ObjectKind::Task, namespace, name));
        };
        if let Some(DeletionLag::Polls(n)) = removal {
            stored.removal = Some(DeletionLag::Polls(n - 1));
        }
        Ok(stored.task.clone())
    }

    async fn create_task(&self, definition: &TaskDefinition) -> StoreResult<TaskHandle> {
        let mut inner = self.inner.lock().unwrap();
        let name = &definition.name;
        inner.calls.push(StoreCall::CreateTask(name.clone()));
        if inner.faults.create.contains(name) {
            return Err(StoreError::Backend(format!(
                "admission rejected task {name}"
            )));
        }

        let k = key(&definition.namespace, name);
        if inner.tasks.contains_key(&k) {
            return Err(StoreError::AlreadyExists {
                kind: ObjectKind::Task,
                namespace: definition.namespace.clone(),
                name: name.clone(),
            });
        }

        inner.next_generation += 1;
        let handle = TaskHandle {
            namespace: definition.namespace.clone(),
            name: name.clone(),
            generation: inner.next_generation,
        };
        let status = if self.complete_on_create {
            TaskStatus {
                active: 0,
                succeeded: 1,
                failed: 0,
            }
        } else {
            TaskStatus {
                active: 1,
                succeeded: 0,
                failed: 0,
            }
        };
        inner.tasks.insert(
            k,
            StoredTask {
                task: Task {
                    handle: handle.clone(),
                    definition: definition.clone(),
                    status,
                },
                removal: None,
            },
        );
        Ok(handle)
    }

    async fn delete_task(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StoreCall::DeleteTask(name.to_string(), options));
        if inner.faults.delete.contains(name) {
            return Err(StoreError::Backend(format!(
                "delete of task {name} was refused"
            )));
        }

        let lag = inner
            .faults
            .deletion_lag
            .get(name)
            .copied()
            .unwrap_or(DeletionLag::Polls(0));
        let k = key(namespace, name);
        let Some(removal) = inner.tasks.get(&k).map(|stored| stored.removal) else {
            return Err(not_found(ObjectKind::Task, namespace, name));
        };

        // A second delete while the first is still in progress changes nothing.
        if removal.is_some() {
            return Ok(());
        }

        if lag == DeletionLag::Polls(0) {
            inner.tasks.remove(&k);
        } else if let Some(stored) = inner.tasks.get_mut(&k) {
            stored.task.status.active = 0;
            stored.removal = Some(lag);
        }
        Ok(())
    }

    async fn create_config_object(&self, object: &ConfigObject) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push(StoreCall::CreateConfigObject(object.name.clone()));
        let k = key(&object.namespace, &object.name);
        if inner.config_objects.contains_key(&k) {
            return Err(StoreError::AlreadyExists {
                kind: ObjectKind::ConfigObject,
                namespace: object.namespace.clone(),
                name: object.name.clone(),
            });
        }
        inner.config_objects.insert(k, object.clone());
        Ok(())
    }

    async fn get_config_object(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<BTreeMap<String, String>> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StoreCall::GetConfigObject(name.to_string()));
        inner
            .config_objects
            .get(&key(namespace, name))
            .map(|object| object.data.clone())
            .ok_or_else(|| not_found(ObjectKind::ConfigObject, namespace, name))
    }
}

#[async_trait]
impl NodeDirectory for MemoryStore {
    async fn node_hostnames(&self) -> StoreResult<HashMap<String, String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .nodes
            .iter()
            .map(|n| (n.info.name.clone(), n.info.hostname.clone()))
            .collect())
    }

    async fn list_valid_nodes(&self, hostnames: &[String]) -> StoreResult<Vec<NodeInfo>> {
        let inner = self.inner.lock().unwrap();
        Ok(hostnames
            .iter()
            .filter_map(|hostname| inner.nodes.iter().find(|n| &n.info.hostname == hostname))
            .filter(|n| n.info.is_valid())
            .map(|n| n.info.clone())
            .collect())
    }

    async fn resolve_node_address(&self, node_name: &str) -> StoreResult<String> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .iter()
            .find(|n| n.info.name == node_name)
            .map(|n| n.address.clone())
            .ok_or_else(|| not_found(ObjectKind::Node, "", node_name))
    }
}
