// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The interface to the substrate that runs tasks and stores configuration objects.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::{
    error::StoreError,
    task::{OwnerReference, Task, TaskDefinition, TaskHandle},
};

pub mod memory;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Propagation {
    /// Dependents are removed before the object itself.
    Foreground,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeleteOptions {
    pub propagation: Propagation,
    pub grace_period_secs: i64,
}

impl DeleteOptions {
    /// Tear down the object and its dependents immediately.
    pub fn immediate_foreground() -> Self {
        DeleteOptions {
            propagation: Propagation::Foreground,
            grace_period_secs: 0,
        }
    }
}

/// A named key/value object, e.g. the script every preparation task mounts.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigObject {
    pub namespace: String,
    pub name: String,
    pub data: BTreeMap<String, String>,
    pub owner: Option<OwnerReference>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, namespace: &str, name: &str) -> StoreResult<Task>;

    async fn create_task(&self, definition: &TaskDefinition) -> StoreResult<TaskHandle>;

    /// Delete a task. Returns `StoreError::NotFound` if there was nothing to delete.
    async fn delete_task(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> StoreResult<()>;

    /// Create a config object. Returns `StoreError::AlreadyExists` if one exists under that name.
    async fn create_config_object(&self, object: &ConfigObject) -> StoreResult<()>;

    async fn get_config_object(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<BTreeMap<String, String>>;
}

/// A cluster node as seen by the node directory.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub name: String,
    pub hostname: String,
    pub ready: bool,
    pub schedulable: bool,
}

impl NodeInfo {
    pub fn is_valid(&self) -> bool {
        self.ready && self.schedulable
    }
}

/// Knows which nodes exist, which are usable, and how to reach them.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// Map from node name to the node's hostname.
    async fn node_hostnames(&self) -> StoreResult<HashMap<String, String>>;

    /// The subset of the given hostnames whose nodes are ready and schedulable, in the order the
    /// hostnames were given.
    async fn list_valid_nodes(&self, hostnames: &[String]) -> StoreResult<Vec<NodeInfo>>;

    async fn resolve_node_address(&self, node_name: &str) -> StoreResult<String>;
}

/// Build the node name to IP address map for the given nodes.
pub async fn resolve_node_addresses(
    directory: &dyn NodeDirectory,
    node_names: &[&str],
) -> StoreResult<BTreeMap<String, String>> {
    let mut addresses = BTreeMap::new();
    for name in node_names {
        let ip = directory.resolve_node_address(name).await?;
        addresses.insert(name.to_string(), ip);
    }
    Ok(addresses)
}
