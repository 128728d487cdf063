// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{collections::BTreeMap, error::Error};

use serde::{Deserialize, Serialize};

/// Config, along with its children, is the model for a chunkserver cluster used in the
/// configuration file. The config file is deserialized into a Config object.
///
/// The model used in the config file is intentionally different from the model used during a
/// provisioning run (see `spec::ClusterSpec`). Since they are decoupled, the runtime model can be
/// changed without needing to change the configuration file format.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub cluster: ClusterSection,
    pub storage: Storage,
    pub mds: Mds,
    #[serde(default)]
    pub etcd: Etcd,
    #[serde(default)]
    pub snapshot_clone: SnapshotClone,
    #[serde(default)]
    pub provision: Provision,
    /// Node addresses, only used by the in-memory backend of the `plan` and `simulate` commands.
    pub inventory: Option<Inventory>,
}

impl Config {
    /// Read the config file at `path`, or at the default location when no path is given.
    pub fn from_path(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let path = match path {
            Some(path) => path,
            None => &crate::default_config_path(),
        };
        let contents = std::fs::read_to_string(path).inspect_err(|e| {
            eprintln!("Could not open config file \"{path}\": {e}");
        })?;
        Ok(Self::from_toml(&contents)?)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Identity of the cluster resource that owns every object created during provisioning.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClusterSection {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub image: String,
    #[serde(default = "default_pull_policy")]
    pub image_pull_policy: String,
    pub data_dir_host_path: String,
    pub log_dir_host_path: String,
    pub conf_dir_host_path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Storage {
    #[serde(default)]
    pub use_selected_nodes: bool,
    #[serde(default)]
    pub nodes: Vec<String>,
    /// The first chunkserver port on every host; each further device gets the next port.
    pub port: u16,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub selected_nodes: Vec<SelectedNode>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Device {
    pub name: String,
    pub percentage: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SelectedNode {
    pub node: String,
    pub devices: Vec<Device>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Mds {
    pub port: u16,
    pub dummy_port: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Etcd {
    pub port: u16,
}

impl Default for Etcd {
    fn default() -> Self {
        Etcd { port: 23790 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SnapshotClone {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub dummy_port: u16,
}

/// Timing knobs for a provisioning run. The defaults are the values the operator has always used;
/// they only need overriding in test or lab environments.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Provision {
    pub chunk_file_size: u64,
    pub format_poll_interval_secs: u64,
    pub format_deadline_secs: u64,
    pub delete_poll_interval_secs: u64,
    pub delete_poll_attempts: u32,
}

impl Default for Provision {
    fn default() -> Self {
        Provision {
            chunk_file_size: crate::task::prepare::DEFAULT_CHUNK_FILE_SIZE,
            format_poll_interval_secs: 20,
            format_deadline_secs: 24 * 60 * 60,
            delete_poll_interval_secs: 3,
            delete_poll_attempts: 30,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Inventory {
    /// Node name to IP address.
    pub node_addresses: BTreeMap<String, String>,
}

fn default_pull_policy() -> String {
    "IfNotPresent".to_string()
}
