// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chunkprov_lib::{
        config::Config, error::ProvisionError, spec::*, task::prepare::DEFAULT_CHUNK_FILE_SIZE,
    };

    fn test_path(path: &str) -> String {
        std::env::var("CARGO_MANIFEST_DIR").unwrap() + "/tests/" + path
    }

    const SELECTED: &str = r#"
[cluster]
name = "c"
namespace = "ns"
uid = "u"
image = "img"
image_pull_policy = "Always"
data_dir_host_path = "/d"
log_dir_host_path = "/l"
conf_dir_host_path = "/c"

[storage]
use_selected_nodes = true
port = 9000

[[storage.selected_nodes]]
node = "a"
devices = [{ name = "/dev/vdb", percentage = 50 }]

[[storage.selected_nodes]]
node = "b"
devices = [
    { name = "/dev/vdb", percentage = 50 },
    { name = "/dev/vdc/", percentage = 70 },
]

[mds]
port = 6700
dummy_port = 7700
"#;

    #[test]
    fn load_sample_config() {
        let config = Config::from_path(Some(test_path("cluster.toml").as_str())).unwrap();
        let spec = ClusterSpec::from_config(&config);

        assert_eq!(spec.namespace(), "curvebs");
        assert_eq!(spec.cluster.kind, "CurveCluster");
        assert_eq!(spec.image_pull_policy, "IfNotPresent");
        assert_eq!(spec.node_names(), vec!["node1", "node2", "node3"]);
        assert_eq!(
            spec.devices_for("node3"),
            &[DeviceSpec::new("/dev/sdb", 80), DeviceSpec::new("/dev/sdc", 80)]
        );
        assert_eq!(spec.etcd.port, 23790);
        assert_eq!(spec.chunk_file_size, DEFAULT_CHUNK_FILE_SIZE);
        assert!(spec.snapshot_clone.enable);
        assert!(spec.validate().is_ok());

        let addresses = config.inventory.unwrap().node_addresses;
        assert_eq!(addresses["node2"], "192.168.0.12");
    }

    #[test]
    fn provision_settings_override_defaults() {
        let config = Config::from_path(Some(test_path("cluster.toml").as_str())).unwrap();
        let settings = Settings::from_config(&config.provision);

        assert_eq!(settings.format_poll_interval, Duration::from_secs(5));
        assert_eq!(settings.format_deadline, Duration::from_secs(24 * 60 * 60));
        assert_eq!(settings.deletion.interval, Duration::from_secs(3));
        assert_eq!(settings.deletion.attempts, 10);
    }

    #[test]
    fn missing_config_file() {
        assert!(Config::from_path(Some(test_path("does-not-exist.toml").as_str())).is_err());
    }

    #[test]
    fn selected_nodes() {
        let config = Config::from_toml(SELECTED).unwrap();
        let spec = ClusterSpec::from_config(&config);

        assert!(matches!(spec.selection, NodeSelection::PreSelected(_)));
        assert_eq!(spec.node_names(), vec!["a", "b"]);
        assert_eq!(spec.devices_for("a").len(), 1);
        assert_eq!(spec.devices_for("b")[1].short_name(), "vdc");
        assert!(spec.devices_for("nope").is_empty());
        assert!(!spec.snapshot_clone.enable);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn empty_selection_is_rejected() {
        let config = Config::from_toml(SELECTED).unwrap();
        let mut spec = ClusterSpec::from_config(&config);
        spec.selection = NodeSelection::PreSelected(Vec::new());
        assert!(matches!(
            spec.validate(),
            Err(ProvisionError::Configuration(_))
        ));

        spec.selection = NodeSelection::Explicit {
            nodes: vec!["a".to_string()],
            devices: Vec::new(),
        };
        assert!(matches!(
            spec.validate(),
            Err(ProvisionError::Configuration(_))
        ));

        spec.selection = NodeSelection::Explicit {
            nodes: Vec::new(),
            devices: vec![DeviceSpec::new("/dev/sdb", 80)],
        };
        assert!(matches!(
            spec.validate(),
            Err(ProvisionError::Configuration(_))
        ));
    }

    #[test]
    fn device_short_names() {
        assert_eq!(DeviceSpec::new("/dev/sdb", 80).short_name(), "sdb");
        assert_eq!(DeviceSpec::new(" /dev/nvme0n1/ ", 80).short_name(), "nvme0n1");
        assert_eq!(DeviceSpec::new("sdd", 80).short_name(), "sdd");
    }

    #[test]
    fn devices_need_distinct_names() {
        let config = Config::from_toml(SELECTED).unwrap();
        let mut spec = ClusterSpec::from_config(&config);

        for devices in [
            vec!["/"],
            vec![""],
            vec!["/dev/sdb", "/dev/disk/sdb"],
            vec!["/dev/sdb", "/dev/sdb/"],
        ] {
            spec.selection = NodeSelection::Explicit {
                nodes: vec!["a".to_string()],
                devices: devices.iter().map(|d| DeviceSpec::new(d, 80)).collect(),
            };
            assert!(
                matches!(spec.validate(), Err(ProvisionError::Configuration(_))),
                "{devices:?} should be rejected"
            );
        }

        // The same device name on different nodes is fine.
        spec.selection = NodeSelection::PreSelected(vec![
            SelectedNode {
                node: "a".to_string(),
                devices: vec![DeviceSpec::new("/dev/vdb", 50)],
            },
            SelectedNode {
                node: "b".to_string(),
                devices: vec![DeviceSpec::new("/dev/vdb", 50)],
            },
        ]);
        assert!(spec.validate().is_ok());

        spec.selection = NodeSelection::PreSelected(vec![SelectedNode {
            node: "b".to_string(),
            devices: vec![
                DeviceSpec::new("/dev/vdb", 50),
                DeviceSpec::new("/dev/mapper/vdb", 50),
            ],
        }]);
        assert!(matches!(
            spec.validate(),
            Err(ProvisionError::Configuration(_))
        ));
    }

    #[test]
    fn storage_port_must_leave_room_for_every_device() {
        let config = Config::from_toml(SELECTED).unwrap();
        let mut spec = ClusterSpec::from_config(&config);

        // Node "b" has two devices.
        spec.storage_port = u16::MAX;
        assert!(matches!(
            spec.validate(),
            Err(ProvisionError::Configuration(_))
        ));

        spec.storage_port = u16::MAX - 1;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn missing_storage_section_is_a_parse_error() {
        let contents = SELECTED.replace("[storage]", "[storage_typo]");
        assert!(Config::from_toml(&contents).is_err());
    }
}
