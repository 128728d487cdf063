// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The in-memory model of one provisioning run's target state.

use std::{collections::HashSet, time::Duration};

use crate::{
    config::{self, Config},
    error::{ProvisionError, Result},
    task::executor::DeletionPolicy,
};

/// Reference to the cluster resource being provisioned. Every object created during provisioning
/// carries a controller owner reference back to this resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub uid: String,
}

impl ClusterRef {
    pub fn new(name: &str, namespace: &str, uid: &str) -> Self {
        ClusterRef {
            api_version: "operator.curve.io/v1".to_string(),
            kind: "CurveCluster".to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: uid.to_string(),
        }
    }
}

/// A device on a storage node, and how much of its capacity should be turned into chunk files.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSpec {
    pub name: String,
    pub percentage: u32,
}

impl DeviceSpec {
    pub fn new(name: &str, percentage: u32) -> Self {
        DeviceSpec {
            name: name.to_string(),
            percentage,
        }
    }

    /// The last path segment of the device path, e.g. "sdb" for "/dev/sdb/". Used in the names of
    /// every object created for this device.
    pub fn short_name(&self) -> &str {
        let name = self.name.trim().trim_end_matches('/');
        name.rsplit('/').next().unwrap_or(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedNode {
    pub node: String,
    pub devices: Vec<DeviceSpec>,
}

/// How storage nodes are chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSelection {
    /// Every listed node gets every listed device.
    Explicit {
        nodes: Vec<String>,
        devices: Vec<DeviceSpec>,
    },
    /// Each selected node carries its own device list.
    PreSelected(Vec<SelectedNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdsSpec {
    pub port: u16,
    pub dummy_port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EtcdSpec {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotCloneSpec {
    pub enable: bool,
    pub port: u16,
    pub dummy_port: u16,
}

/// Declarative target state for one provisioning run. Immutable once the run has started.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSpec {
    pub cluster: ClusterRef,
    pub selection: NodeSelection,
    pub storage_port: u16,
    pub mds: MdsSpec,
    pub etcd: EtcdSpec,
    pub snapshot_clone: SnapshotCloneSpec,
    pub image: String,
    pub image_pull_policy: String,
    pub data_dir_host_path: String,
    pub log_dir_host_path: String,
    pub conf_dir_host_path: String,
    pub chunk_file_size: u64,
}

impl ClusterSpec {
    pub fn from_config(conf: &Config) -> Self {
        let devices = |devices: &[config::Device]| -> Vec<DeviceSpec> {
            devices
                .iter()
                .map(|d| DeviceSpec::new(&d.name, d.percentage))
                .collect()
        };

        let selection = if conf.storage.use_selected_nodes {
            NodeSelection::PreSelected(
                conf.storage
                    .selected_nodes
                    .iter()
                    .map(|n| SelectedNode {
                        node: n.node.clone(),
                        devices: devices(&n.devices),
                    })
                    .collect(),
            )
        } else {
            NodeSelection::Explicit {
                nodes: conf.storage.nodes.clone(),
                devices: devices(&conf.storage.devices),
            }
        };

        let c = &conf.cluster;
        ClusterSpec {
            cluster: ClusterRef::new(&c.name, &c.namespace, &c.uid),
            selection,
            storage_port: conf.storage.port,
            mds: MdsSpec {
                port: conf.mds.port,
                dummy_port: conf.mds.dummy_port,
            },
            etcd: EtcdSpec {
                port: conf.etcd.port,
            },
            snapshot_clone: SnapshotCloneSpec {
                enable: conf.snapshot_clone.enable,
                port: conf.snapshot_clone.port,
                dummy_port: conf.snapshot_clone.dummy_port,
            },
            image: c.image.clone(),
            image_pull_policy: c.image_pull_policy.clone(),
            data_dir_host_path: c.data_dir_host_path.clone(),
            log_dir_host_path: c.log_dir_host_path.clone(),
            conf_dir_host_path: c.conf_dir_host_path.clone(),
            chunk_file_size: conf.provision.chunk_file_size,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.cluster.namespace
    }

    /// Check that the node and device configuration is consistent. Nothing else in a run may
    /// happen before this passes.
    pub fn validate(&self) -> Result<()> {
        match &self.selection {
            NodeSelection::Explicit { nodes, devices } => {
                if nodes.is_empty() || devices.is_empty() {
                    return Err(ProvisionError::Configuration(
                        "use_selected_nodes is false but no nodes or no devices are specified"
                            .to_string(),
                    ));
                }
            }
            NodeSelection::PreSelected(selected) => {
                if selected.is_empty() {
                    return Err(ProvisionError::Configuration(
                        "use_selected_nodes is true but selected_nodes is empty".to_string(),
                    ));
                }
            }
        }

        for node in self.node_names() {
            self.validate_devices(node, self.devices_for(node))?;
        }
        Ok(())
    }

    /// Each device of a node gets its own port counting up from `storage_port`, and a distinct
    /// non-empty short name, which is part of every object created for the device.
    fn validate_devices(&self, node: &str, devices: &[DeviceSpec]) -> Result<()> {
        let last_port = u32::from(self.storage_port) + devices.len().saturating_sub(1) as u32;
        if devices.len() > usize::from(u16::MAX) || last_port > u32::from(u16::MAX) {
            return Err(ProvisionError::Configuration(format!(
                "storage port {} leaves no room for the {} devices of node {node}",
                self.storage_port,
                devices.len()
            )));
        }

        let mut short_names = HashSet::new();
        for device in devices {
            let short_name = device.short_name();
            if short_name.is_empty() {
                return Err(ProvisionError::Configuration(format!(
                    "device {:?} of node {node} has no name",
                    device.name
                )));
            }
            if !short_names.insert(short_name) {
                return Err(ProvisionError::Configuration(format!(
                    "device {} of node {node} has the same name {short_name} as another device",
                    device.name
                )));
            }
        }
        Ok(())
    }

    /// The declared node identifiers, in declaration order.
    pub fn node_names(&self) -> Vec<&str> {
        match &self.selection {
            NodeSelection::Explicit { nodes, .. } => nodes.iter().map(String::as_str).collect(),
            NodeSelection::PreSelected(selected) => {
                selected.iter().map(|n| n.node.as_str()).collect()
            }
        }
    }

    /// The devices to prepare on the node declared as `node`.
    pub fn devices_for(&self, node: &str) -> &[DeviceSpec] {
        match &self.selection {
            NodeSelection::Explicit { devices, .. } => devices,
            NodeSelection::PreSelected(selected) => selected
                .iter()
                .find(|n| n.node == node)
                .map(|n| n.devices.as_slice())
                .unwrap_or(&[]),
        }
    }

    pub fn print_summary(&self) {
        println!(
            "cluster {}/{} (image {})",
            self.cluster.namespace, self.cluster.name, self.image
        );
        for node in self.node_names() {
            let devices: Vec<String> = self
                .devices_for(node)
                .iter()
                .map(|d| format!("{} ({}%)", d.name, d.percentage))
                .collect();
            println!("  {node}: {}", devices.join(", "));
        }
        println!(
            "mds port {} (dummy {}), chunkserver base port {}",
            self.mds.port, self.mds.dummy_port, self.storage_port
        );
        if self.snapshot_clone.enable {
            println!(
                "snapshot/clone port {} (dummy {})",
                self.snapshot_clone.port, self.snapshot_clone.dummy_port
            );
        }
    }
}

/// Timing settings for a provisioning run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub format_poll_interval: Duration,
    pub format_deadline: Duration,
    pub deletion: DeletionPolicy,
}

impl Settings {
    pub fn from_config(conf: &config::Provision) -> Self {
        Settings {
            format_poll_interval: Duration::from_secs(conf.format_poll_interval_secs),
            format_deadline: Duration::from_secs(conf.format_deadline_secs),
            deletion: DeletionPolicy {
                interval: Duration::from_secs(conf.delete_poll_interval_secs),
                attempts: conf.delete_poll_attempts,
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&config::Provision::default())
    }
}
