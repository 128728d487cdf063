// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Fan-out of one preparation task per (node, device) pair.

use std::collections::{BTreeMap, HashMap};

use log::{debug, error, info, warn};

use crate::{
    chunkserver::*,
    error::{ProvisionError, Result},
    spec::{ClusterSpec, DeviceSpec},
    store::{NodeDirectory, NodeInfo, TaskStore},
    task::{
        executor::{ensure_task, DeletionPolicy},
        prepare::{self, CONTAINER_DATA_DIR, CONTAINER_LOG_DIR, CONTAINER_PREFIX},
        resource_name, TaskHandle,
    },
};

pub const ETCD_OVERRIDE_OBJECT: &str = "etcd-endpoints-override";
pub const ETCD_ADDR_KEY: &str = "clusterEtcdAddr";
pub const MDS_OVERRIDE_OBJECT: &str = "mds-endpoints-override";
pub const MDS_ADDR_KEY: &str = "mdsEndpoints";

/// A preparation task that was successfully submitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub name: String,
    pub node_name: String,
    pub device: DeviceSpec,
    pub handle: TaskHandle,
}

/// Everything one planner run submitted. `tasks[i]` and `configs[i]` always describe the same
/// (node, device) pair.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProvisionPlan {
    pub tasks: Vec<TaskRecord>,
    pub configs: Vec<DeviceConfigRecord>,
}

impl ProvisionPlan {
    fn push(&mut self, task: TaskRecord, config: DeviceConfigRecord) {
        self.tasks.push(task);
        self.configs.push(config);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name.clone()).collect()
    }
}

/// Addresses of the services every chunkserver talks to. Resolved once per run.
#[derive(Debug, Clone, Default)]
struct Upstreams {
    mds_addr: String,
    mds_dummy_port: String,
    etcd_addr: String,
    snapshotclone_addr: String,
    snapshotclone_dummy_port: String,
}

/// A node that passed the readiness filter, together with the identifier it was declared under.
struct ValidNode<'s> {
    declared: &'s str,
    info: NodeInfo,
}

pub struct Planner<'a> {
    store: &'a dyn TaskStore,
    nodes: &'a dyn NodeDirectory,
    deletion: DeletionPolicy,
}

impl<'a> Planner<'a> {
    pub fn new(
        store: &'a dyn TaskStore,
        nodes: &'a dyn NodeDirectory,
        deletion: DeletionPolicy,
    ) -> Self {
        Planner {
            store,
            nodes,
            deletion,
        }
    }

    /// Submit a preparation task for every device on every valid node, and build the matching
    /// chunkserver configuration records.
    ///
    /// A device whose task cannot be submitted is logged and left out of the plan entirely; it
    /// does not stop the other devices from being provisioned. Finding no valid nodes at all is
    /// not an error either: the returned plan is simply empty.
    pub async fn plan(
        &self,
        spec: &ClusterSpec,
        node_addresses: &BTreeMap<String, String>,
    ) -> Result<ProvisionPlan> {
        spec.validate()?;

        let mut plan = ProvisionPlan::default();

        let valid_nodes = self.valid_nodes(spec).await?;
        if valid_nodes.is_empty() {
            warn!(
                "no valid nodes available to run chunkservers on in namespace {:?}",
                spec.namespace()
            );
            return Ok(plan);
        }
        info!(
            "{} of the {} storage nodes are valid",
            valid_nodes.len(),
            spec.node_names().len()
        );

        self.create_format_config_object(spec).await?;

        let upstreams = self.resolve_upstreams(spec, node_addresses).await?;

        for (host_sequence, node) in valid_nodes.iter().enumerate() {
            let node_name = &node.info.name;
            let node_ip = node_addresses.get(node_name).cloned().unwrap_or_else(|| {
                warn!("no address known for node {node_name}");
                String::new()
            });
            let devices = spec.devices_for(node.declared);
            // Counts the devices submitted on this host so far.
            let mut replicas_sequence: u32 = 0;

            for device in devices {
                let Some(port) = u16::try_from(replicas_sequence)
                    .ok()
                    .and_then(|n| spec.storage_port.checked_add(n))
                else {
                    error!(
                        "no port left above {} for device {} on {node_name}",
                        spec.storage_port, device.name
                    );
                    break;
                };

                info!("creating task for device {} on {node_name}", device.name);

                let definition = prepare::prepare_task(spec, node_name, device);
                let handle =
                    match ensure_task(self.store, &definition, false, &self.deletion).await {
                        Ok(handle) => handle,
                        Err(e) => {
                            error!(
                                "failed to create task for device {} on {node_name}: {e}",
                                device.name
                            );
                            continue;
                        }
                    };

                let short_name = device.short_name();
                let config = DeviceConfigRecord {
                    prefix: CONTAINER_PREFIX.to_string(),
                    port,
                    cluster_mds_addr: upstreams.mds_addr.clone(),
                    cluster_mds_dummy_port: upstreams.mds_dummy_port.clone(),
                    cluster_etcd_addr: upstreams.etcd_addr.clone(),
                    cluster_snapshotclone_addr: upstreams.snapshotclone_addr.clone(),
                    cluster_snapshotclone_dummy_port: upstreams.snapshotclone_dummy_port.clone(),
                    resource_name: resource_name(CHUNKSERVER_PREFIX, node_name, short_name),
                    current_config_object_name: resource_name(
                        CHUNKSERVER_CONFIG_PREFIX,
                        node_name,
                        short_name,
                    ),
                    data_path_map: DataPathMap {
                        host_device: device.name.clone(),
                        host_log_dir: prepare::host_log_dir(spec, node_name, device),
                        container_data_dir: CONTAINER_DATA_DIR.to_string(),
                        container_log_dir: CONTAINER_LOG_DIR.to_string(),
                    },
                    node_name: node_name.clone(),
                    node_ip: node_ip.clone(),
                    device_name: device.name.clone(),
                    host_sequence: host_sequence as u32,
                    replicas_sequence,
                    replicas: devices.len() as u32,
                };

                plan.push(
                    TaskRecord {
                        name: definition.name,
                        node_name: node_name.clone(),
                        device: device.clone(),
                        handle,
                    },
                    config,
                );
                replicas_sequence += 1;
            }
        }

        Ok(plan)
    }

    /// Resolve the declared node identifiers to hostnames, and keep those whose nodes are ready
    /// and schedulable. Order follows the declaration order.
    async fn valid_nodes<'s>(&self, spec: &'s ClusterSpec) -> Result<Vec<ValidNode<'s>>> {
        let hostname_map = self.nodes.node_hostnames().await?;

        let mut declared_by_hostname: HashMap<String, &'s str> = HashMap::new();
        let mut storage_hostnames = Vec::new();
        for declared in spec.node_names() {
            let Some(hostname) = hostname_map.get(declared) else {
                warn!("storage node {declared} is not known to the cluster");
                continue;
            };
            if let Some(first) = declared_by_hostname.get(hostname.as_str()) {
                warn!(
                    "storage node {declared} has the same hostname {hostname} as {first}, \
                     skipping it"
                );
                continue;
            }
            declared_by_hostname.insert(hostname.clone(), declared);
            storage_hostnames.push(hostname.clone());
        }

        let valid = match self.nodes.list_valid_nodes(&storage_hostnames).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!("failed to list valid storage nodes: {e}");
                Vec::new()
            }
        };

        Ok(valid
            .into_iter()
            .filter_map(|info| {
                let declared = declared_by_hostname.get(&info.hostname).copied()?;
                Some(ValidNode { declared, info })
            })
            .collect())
    }

    /// Create the config object holding the format script. It may already exist from a previous
    /// run, which is fine.
    async fn create_format_config_object(&self, spec: &ClusterSpec) -> Result<()> {
        let object = prepare::format_config_object(spec);
        match self.store.create_config_object(&object).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_already_exists() => {
                debug!("format config object {} already exists", object.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_endpoint(
        &self,
        spec: &ClusterSpec,
        service: &'static str,
        object: &str,
        key: &str,
    ) -> Result<String> {
        let data = self
            .store
            .get_config_object(spec.namespace(), object)
            .await
            .map_err(|source| ProvisionError::UpstreamAddress {
                service,
                object: object.to_string(),
                source,
            })?;

        Ok(data.get(key).cloned().unwrap_or_else(|| {
            warn!("config object {object} has no {key} entry");
            String::new()
        }))
    }

    async fn resolve_upstreams(
        &self,
        spec: &ClusterSpec,
        node_addresses: &BTreeMap<String, String>,
    ) -> Result<Upstreams> {
        let mut upstreams = Upstreams {
            etcd_addr: self
                .read_endpoint(spec, "etcd", ETCD_OVERRIDE_OBJECT, ETCD_ADDR_KEY)
                .await?,
            mds_addr: self
                .read_endpoint(spec, "mds", MDS_OVERRIDE_OBJECT, MDS_ADDR_KEY)
                .await?,
            mds_dummy_port: dummy_port_triplet(spec.mds.dummy_port),
            ..Default::default()
        };

        if spec.snapshot_clone.enable {
            upstreams.snapshotclone_addr = node_addresses
                .values()
                .map(|ip| format!("{ip}:{}", spec.snapshot_clone.port))
                .collect::<Vec<_>>()
                .join(",");
            upstreams.snapshotclone_dummy_port =
                dummy_port_triplet(spec.snapshot_clone.dummy_port);
        }

        Ok(upstreams)
    }
}
