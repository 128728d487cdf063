// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Helpers shared by the integration tests: cluster specs, a pre-seeded store, and collaborators
//! that record what the pipeline asked of them.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    chunkserver::DeviceConfigRecord,
    error::CollaboratorError,
    orchestrator::*,
    spec::*,
    store::memory::MemoryStore,
    task::{executor::DeletionPolicy, prepare::DEFAULT_CHUNK_FILE_SIZE},
};

pub const TEST_NAMESPACE: &str = "curvebs";

/// A spec where every node in `nodes` gets every device in `devices` at 80%.
pub fn explicit_spec(nodes: &[&str], devices: &[&str]) -> ClusterSpec {
    ClusterSpec {
        cluster: ClusterRef::new(
            "my-cluster",
            TEST_NAMESPACE,
            "9c6f1f2e-0a55-4a8e-b9b1-5b3e0c1d2a40",
        ),
        selection: NodeSelection::Explicit {
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            devices: devices.iter().map(|d| DeviceSpec::new(d, 80)).collect(),
        },
        storage_port: 8200,
        mds: MdsSpec {
            port: 6700,
            dummy_port: 7700,
        },
        etcd: EtcdSpec { port: 23790 },
        snapshot_clone: SnapshotCloneSpec {
            enable: true,
            port: 5555,
            dummy_port: 8081,
        },
        image: "opencurvedocker/curvebs:v1.2".to_string(),
        image_pull_policy: "IfNotPresent".to_string(),
        data_dir_host_path: "/curvebs/data".to_string(),
        log_dir_host_path: "/curvebs/log".to_string(),
        conf_dir_host_path: "/curvebs/conf".to_string(),
        chunk_file_size: DEFAULT_CHUNK_FILE_SIZE,
    }
}

/// Two nodes with two devices each.
pub fn two_node_spec() -> ClusterSpec {
    explicit_spec(&["node1", "node2"], &["/dev/sdb", "/dev/sdc"])
}

/// Addresses 10.0.0.1, 10.0.0.2, ... for the given nodes.
pub fn node_addresses(nodes: &[&str]) -> BTreeMap<String, String> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.to_string(), format!("10.0.0.{}", i + 1)))
        .collect()
}

/// A store holding ready nodes for every node of `spec` and the upstream endpoint objects.
pub fn seeded_store(spec: &ClusterSpec, completing: bool) -> Arc<MemoryStore> {
    let store = if completing {
        MemoryStore::completing()
    } else {
        MemoryStore::new()
    };
    store.seed_cluster(spec, &node_addresses(&spec.node_names()));
    Arc::new(store)
}

/// Settings that let a whole pipeline run finish in well under a second of wall time.
pub fn fast_settings() -> Settings {
    Settings {
        format_poll_interval: Duration::from_millis(10),
        format_deadline: Duration::from_secs(5),
        deletion: DeletionPolicy {
            interval: Duration::from_millis(1),
            attempts: 30,
        },
    }
}

/// Something the pipeline asked a collaborator to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CreatePool(PoolKind),
    StartServices(Vec<DeviceConfigRecord>),
    Condition(ConditionType, String),
}

/// Implements every collaborator trait, logging each call into one shared, ordered event list.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    fail_pool: Mutex<Option<PoolKind>>,
    fail_launch: Mutex<bool>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Just the reasons of the conditions reported so far.
    pub fn condition_reasons(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Condition(_, reason) => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn fail_pool(&self, kind: PoolKind) {
        *self.fail_pool.lock().unwrap() = Some(kind);
    }

    pub fn fail_launch(&self) {
        *self.fail_launch.lock().unwrap() = true;
    }

    /// A provisioner wired to `store` for tasks and nodes, and to this recorder for everything
    /// else.
    pub fn provisioner(
        self: &Arc<Self>,
        store: Arc<MemoryStore>,
        settings: Settings,
    ) -> Provisioner {
        Provisioner::new(
            store.clone(),
            store,
            self.clone(),
            self.clone(),
            self.clone(),
            settings,
        )
    }
}

#[async_trait]
impl PoolCreator for Recorder {
    async fn create_pool(
        &self,
        kind: PoolKind,
        _node_addresses: &BTreeMap<String, String>,
    ) -> Result<PoolId, CollaboratorError> {
        self.events.lock().unwrap().push(Event::CreatePool(kind));
        if *self.fail_pool.lock().unwrap() == Some(kind) {
            return Err(format!("{kind} pool topology rejected by mds").into());
        }
        Ok(PoolId(format!("{kind}-pool-1")))
    }
}

#[async_trait]
impl ServiceLauncher for Recorder {
    async fn start_services(
        &self,
        configs: &[DeviceConfigRecord],
    ) -> Result<(), CollaboratorError> {
        self.events
            .lock()
            .unwrap()
            .push(Event::StartServices(configs.to_vec()));
        if *self.fail_launch.lock().unwrap() {
            return Err("chunkserver on node1 never became ready".into());
        }
        Ok(())
    }
}

#[async_trait]
impl ConditionSink for Recorder {
    async fn update_condition(&self, _cluster: &ClusterRef, condition: Condition) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Condition(condition.condition_type, condition.reason));
    }
}
