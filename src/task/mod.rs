// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The model of a background task as submitted to a `TaskStore`.
//!
//! A task is a one-shot unit of work (e.g. formatting a device) that runs a single pod to
//! completion. The model only carries what the provisioning core sets; a store implementation is
//! free to translate it into whatever its substrate understands.

use std::{collections::BTreeMap, fmt};

use crate::spec::ClusterRef;

pub mod executor;
pub mod prepare;

/// Build the deterministic name of an object created for one (node, device) pair.
pub fn resource_name(prefix: &str, node_name: &str, short_device_name: &str) -> String {
    format!("{prefix}-{node_name}-{short_device_name}")
}

/// A garbage-collection link tying an object's lifecycle to its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    pub controller: bool,
    pub block_owner_deletion: bool,
}

impl OwnerReference {
    /// A controller reference to the given cluster resource.
    pub fn controller_of(cluster: &ClusterRef) -> Self {
        OwnerReference {
            api_version: cluster.api_version.clone(),
            kind: cluster.kind.clone(),
            name: cluster.name.clone(),
            uid: cluster.uid.clone(),
            controller: true,
            block_owner_deletion: true,
        }
    }
}

/// The desired state of a task: what to run, where, and how it is identified.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub owner: Option<OwnerReference>,
    pub template: PodTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestartPolicy {
    Never,
    OnFailure,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DnsPolicy {
    ClusterFirst,
    ClusterFirstWithHostNet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PodTemplate {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// Pins the pod to a single node, bypassing the scheduler.
    pub node_name: Option<String>,
    pub host_network: bool,
    pub dns_policy: DnsPolicy,
    pub restart_policy: RestartPolicy,
    pub run_as_user: i64,
    pub run_as_non_root: bool,
    pub containers: Vec<Container>,
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub name: String,
    pub image: String,
    pub image_pull_policy: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub volume_mounts: Vec<VolumeMount>,
    pub security: SecurityContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityContext {
    pub privileged: bool,
    pub run_as_user: i64,
    pub run_as_non_root: bool,
    pub read_only_root_filesystem: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VolumeSource {
    HostPath { path: String },
    /// Projects the keys of a config object as files.
    ConfigObject {
        name: String,
        items: Vec<(String, String)>,
        default_mode: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub name: String,
    pub source: VolumeSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    pub sub_path: Option<String>,
    pub read_only: bool,
}

/// Identifies one concrete incarnation of a named task. Recreating a task under the same name
/// yields a handle with a different generation.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHandle {
    pub namespace: String,
    pub name: String,
    pub generation: u64,
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.namespace, self.name, self.generation)
    }
}

/// Instance counts reported by the store for a task.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TaskStatus {
    pub active: u32,
    pub succeeded: u32,
    pub failed: u32,
}

impl TaskStatus {
    pub fn is_active(&self) -> bool {
        self.active > 0
    }

    /// Whether the task has reached its required number of successful completions.
    pub fn is_complete(&self) -> bool {
        self.succeeded > 0
    }
}

/// A task as stored: its definition plus the store's view of its progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub handle: TaskHandle,
    pub definition: TaskDefinition,
    pub status: TaskStatus,
}
