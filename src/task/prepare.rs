// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The task that formats a raw device and fills it with preallocated chunk files.

use std::collections::BTreeMap;

use crate::{
    spec::{ClusterSpec, DeviceSpec},
    store::ConfigObject,
    task::*,
};

pub const PREPARE_TASK_PREFIX: &str = "prepare-chunkfile";
pub const DEFAULT_CHUNK_FILE_SIZE: u64 = 16 * 1024 * 1024;

pub const FORMAT_CONFIG_OBJECT_NAME: &str = "format-chunkfile-conf";
pub const FORMAT_SCRIPT_KEY: &str = "format.sh";
pub const FORMAT_SCRIPT_MOUNT_PATH: &str = "/curvebs/tools/sbin/format.sh";

pub const CONTAINER_PREFIX: &str = "/curvebs/chunkserver";
pub const CONTAINER_DATA_DIR: &str = "/curvebs/chunkserver/data";
pub const CONTAINER_LOG_DIR: &str = "/curvebs/chunkserver/logs";
pub const CONTAINER_CONF_DIR: &str = "/curvebs/chunkserver/conf";

/// Formats the device, mounts it on the data directory and preallocates the chunk file pool.
///
/// Arguments: device, data dir, percentage, chunk file size, pool dir, pool meta path.
pub const FORMAT_SCRIPT: &str = r#"#!/bin/bash
set -e

device=$1
data_dir=$2
percent=$3
file_size=$4
pool_dir=$5
pool_meta=$6

mkdir -p "$data_dir"
if mountpoint -q "$data_dir"; then
    umount "$data_dir"
fi

mkfs.ext4 -F "$device"
mount "$device" "$data_dir"

/curvebs/tools/sbin/curve_format \
    -allocatePercent="$percent" \
    -fileSize="$file_size" \
    -filePoolDir="$pool_dir" \
    -filePoolMetaPath="$pool_meta" \
    -fileSystemPath="$pool_dir"
"#;

/// The config object holding the format script, shared by every preparation task.
pub fn format_config_object(spec: &ClusterSpec) -> ConfigObject {
    ConfigObject {
        namespace: spec.namespace().to_string(),
        name: FORMAT_CONFIG_OBJECT_NAME.to_string(),
        data: BTreeMap::from([(FORMAT_SCRIPT_KEY.to_string(), FORMAT_SCRIPT.to_string())]),
        owner: Some(OwnerReference::controller_of(&spec.cluster)),
    }
}

pub fn prepare_task_name(node_name: &str, device: &DeviceSpec) -> String {
    resource_name(PREPARE_TASK_PREFIX, node_name, device.short_name())
}

/// Labels used to find the preparation task for a device.
pub fn prepare_task_labels(
    spec: &ClusterSpec,
    node_name: &str,
    device: &DeviceSpec,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), PREPARE_TASK_PREFIX.to_string()),
        ("node".to_string(), node_name.to_string()),
        ("device".to_string(), device.short_name().to_string()),
        ("curve_cluster".to_string(), spec.namespace().to_string()),
    ])
}

/// Directory on the host that holds the logs of the chunkserver for this device.
pub fn host_log_dir(spec: &ClusterSpec, node_name: &str, device: &DeviceSpec) -> String {
    format!(
        "{}/chunkserver-{}-{}",
        spec.log_dir_host_path,
        node_name,
        device.short_name()
    )
}

fn host_data_dir(spec: &ClusterSpec, node_name: &str, device: &DeviceSpec) -> String {
    format!(
        "{}/chunkserver-{}-{}",
        spec.data_dir_host_path,
        node_name,
        device.short_name()
    )
}

fn host_path(name: &str, path: String) -> Volume {
    Volume {
        name: name.to_string(),
        source: VolumeSource::HostPath { path },
    }
}

fn mount(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        sub_path: None,
        read_only: false,
    }
}

fn format_volumes(
    spec: &ClusterSpec,
    node_name: &str,
    device: &DeviceSpec,
) -> (Vec<Volume>, Vec<VolumeMount>) {
    let volumes = vec![
        Volume {
            name: "format-script".to_string(),
            source: VolumeSource::ConfigObject {
                name: FORMAT_CONFIG_OBJECT_NAME.to_string(),
                items: vec![(FORMAT_SCRIPT_KEY.to_string(), FORMAT_SCRIPT_KEY.to_string())],
                default_mode: 0o644,
            },
        },
        host_path("device", device.name.trim().to_string()),
        host_path("data", host_data_dir(spec, node_name, device)),
        host_path("log", host_log_dir(spec, node_name, device)),
        host_path("conf", spec.conf_dir_host_path.clone()),
    ];

    let mounts = vec![
        VolumeMount {
            sub_path: Some(FORMAT_SCRIPT_KEY.to_string()),
            read_only: true,
            ..mount("format-script", FORMAT_SCRIPT_MOUNT_PATH)
        },
        mount("device", device.name.trim()),
        mount("data", CONTAINER_DATA_DIR),
        mount("log", CONTAINER_LOG_DIR),
        mount("conf", CONTAINER_CONF_DIR),
    ];

    (volumes, mounts)
}

fn format_container(
    spec: &ClusterSpec,
    device: &DeviceSpec,
    mounts: Vec<VolumeMount>,
) -> Container {
    Container {
        name: "format".to_string(),
        image: spec.image.clone(),
        image_pull_policy: spec.image_pull_policy.clone(),
        command: vec!["/bin/bash".to_string(), FORMAT_SCRIPT_MOUNT_PATH.to_string()],
        args: vec![
            device.name.clone(),
            CONTAINER_DATA_DIR.to_string(),
            device.percentage.to_string(),
            spec.chunk_file_size.to_string(),
            format!("{CONTAINER_DATA_DIR}/chunkfilepool"),
            format!("{CONTAINER_DATA_DIR}/chunkfilepool.meta"),
        ],
        volume_mounts: mounts,
        security: SecurityContext {
            privileged: true,
            run_as_user: 0,
            run_as_non_root: false,
            read_only_root_filesystem: false,
        },
    }
}

/// Build the task that prepares `device` on `node_name`.
pub fn prepare_task(spec: &ClusterSpec, node_name: &str, device: &DeviceSpec) -> TaskDefinition {
    let (volumes, mounts) = format_volumes(spec, node_name, device);
    let labels = prepare_task_labels(spec, node_name, device);

    TaskDefinition {
        namespace: spec.namespace().to_string(),
        name: prepare_task_name(node_name, device),
        labels: labels.clone(),
        owner: Some(OwnerReference::controller_of(&spec.cluster)),
        template: PodTemplate {
            name: format!("{PREPARE_TASK_PREFIX}-{node_name}"),
            labels,
            node_name: Some(node_name.to_string()),
            host_network: true,
            dns_policy: DnsPolicy::ClusterFirstWithHostNet,
            restart_policy: RestartPolicy::OnFailure,
            run_as_user: 0,
            run_as_non_root: false,
            containers: vec![format_container(spec, device, mounts)],
            volumes,
        },
    }
}
