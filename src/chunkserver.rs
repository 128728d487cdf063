// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde::{Deserialize, Serialize};

pub const CHUNKSERVER_PREFIX: &str = "curve-chunkserver";
pub const CHUNKSERVER_CONFIG_PREFIX: &str = "curve-chunkserver-conf";

/// Where a chunkserver's data and logs live, on the host and inside its container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DataPathMap {
    pub host_device: String,
    pub host_log_dir: String,
    pub container_data_dir: String,
    pub container_log_dir: String,
}

/// The runtime configuration of the chunkserver that will serve one prepared device.
///
/// One record is produced per successfully submitted preparation task; the service launcher
/// consumes them in order, and the pool layout depends on the host and replica sequence numbers
/// staying stable across runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceConfigRecord {
    pub prefix: String,
    pub port: u16,
    pub cluster_mds_addr: String,
    pub cluster_mds_dummy_port: String,
    pub cluster_etcd_addr: String,
    pub cluster_snapshotclone_addr: String,
    pub cluster_snapshotclone_dummy_port: String,

    pub resource_name: String,
    pub current_config_object_name: String,
    pub data_path_map: DataPathMap,

    pub node_name: String,
    pub node_ip: String,
    pub device_name: String,
    pub host_sequence: u32,
    pub replicas_sequence: u32,
    pub replicas: u32,
}

/// The same port, three times, comma-joined. This is the form the chunkserver config expects for
/// the dummy (metrics) ports of its upstream services.
pub fn dummy_port_triplet(port: u16) -> String {
    let port = port.to_string();
    [port.as_str(); 3].join(",")
}
