// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use tokio::runtime::Runtime;

    use chunkprov_lib::{
        error::ProvisionError,
        planner::*,
        spec::*,
        store::{memory::*, resolve_node_addresses},
        task::{executor::DeletionPolicy, prepare::FORMAT_CONFIG_OBJECT_NAME},
        test_env::*,
    };

    fn run_plan(spec: &ClusterSpec, store: &MemoryStore) -> Result<ProvisionPlan, ProvisionError> {
        let addresses = node_addresses(&spec.node_names());
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            Planner::new(store, store, DeletionPolicy::default())
                .plan(spec, &addresses)
                .await
        })
    }

    #[test]
    fn two_nodes_two_devices() {
        let spec = two_node_spec();
        let store = seeded_store(&spec, false);

        let plan = run_plan(&spec, &store).unwrap();

        assert_eq!(plan.tasks.len(), 4);
        assert_eq!(plan.configs.len(), 4);
        assert_eq!(
            plan.task_names(),
            vec![
                "prepare-chunkfile-node1-sdb",
                "prepare-chunkfile-node1-sdc",
                "prepare-chunkfile-node2-sdb",
                "prepare-chunkfile-node2-sdc",
            ]
        );

        let host_sequences: Vec<u32> = plan.configs.iter().map(|c| c.host_sequence).collect();
        let replica_sequences: Vec<u32> =
            plan.configs.iter().map(|c| c.replicas_sequence).collect();
        let ports: Vec<u16> = plan.configs.iter().map(|c| c.port).collect();
        assert_eq!(host_sequences, vec![0, 0, 1, 1]);
        assert_eq!(replica_sequences, vec![0, 1, 0, 1]);
        assert_eq!(ports, vec![8200, 8201, 8200, 8201]);

        for (task, config) in plan.tasks.iter().zip(&plan.configs) {
            assert_eq!(task.node_name, config.node_name);
            assert_eq!(task.device.name, config.device_name);
            assert_eq!(config.replicas, 2);
        }

        assert_eq!(store.task_names().len(), 4);
    }

    #[test]
    fn config_records_carry_upstream_addresses() {
        let spec = two_node_spec();
        let store = seeded_store(&spec, false);

        let plan = run_plan(&spec, &store).unwrap();
        let config = &plan.configs[2];

        assert_eq!(config.prefix, "/curvebs/chunkserver");
        assert_eq!(config.cluster_mds_addr, "10.0.0.1:6700,10.0.0.2:6700");
        assert_eq!(config.cluster_mds_dummy_port, "7700,7700,7700");
        assert_eq!(config.cluster_etcd_addr, "10.0.0.1:23790,10.0.0.2:23790");
        assert_eq!(config.cluster_snapshotclone_addr, "10.0.0.1:5555,10.0.0.2:5555");
        assert_eq!(config.cluster_snapshotclone_dummy_port, "8081,8081,8081");
        assert_eq!(config.resource_name, "curve-chunkserver-node2-sdb");
        assert_eq!(
            config.current_config_object_name,
            "curve-chunkserver-conf-node2-sdb"
        );
        assert_eq!(config.node_ip, "10.0.0.2");
        assert_eq!(config.data_path_map.host_device, "/dev/sdb");
        assert_eq!(
            config.data_path_map.host_log_dir,
            "/curvebs/log/chunkserver-node2-sdb"
        );
        assert_eq!(config.data_path_map.container_data_dir, "/curvebs/chunkserver/data");
        assert_eq!(config.data_path_map.container_log_dir, "/curvebs/chunkserver/logs");
    }

    #[test]
    fn snapshot_clone_disabled_leaves_address_empty() {
        let mut spec = two_node_spec();
        spec.snapshot_clone.enable = false;
        let store = seeded_store(&spec, false);

        let plan = run_plan(&spec, &store).unwrap();

        assert!(plan
            .configs
            .iter()
            .all(|c| c.cluster_snapshotclone_addr.is_empty()
                && c.cluster_snapshotclone_dummy_port.is_empty()));
    }

    #[test]
    fn failed_submission_is_skipped() {
        let spec = two_node_spec();
        let store = seeded_store(&spec, false);
        store.fail_create("prepare-chunkfile-node2-sdc");

        let plan = run_plan(&spec, &store).unwrap();

        assert_eq!(plan.len(), 3);
        assert!(!plan
            .task_names()
            .contains(&"prepare-chunkfile-node2-sdc".to_string()));
        let last = &plan.configs[2];
        assert_eq!(last.node_name, "node2");
        assert_eq!(last.device_name, "/dev/sdb");
        assert_eq!(last.host_sequence, 1);
        assert_eq!(last.replicas_sequence, 0);
    }

    #[test]
    fn ports_only_advance_on_success() {
        let spec = two_node_spec();
        let store = seeded_store(&spec, false);
        store.fail_create("prepare-chunkfile-node1-sdb");

        let plan = run_plan(&spec, &store).unwrap();

        let first = &plan.configs[0];
        assert_eq!(first.device_name, "/dev/sdc");
        assert_eq!(first.port, 8200);
        assert_eq!(first.replicas_sequence, 0);
        assert_eq!(first.host_sequence, 0);
        // The replica count is the number of configured devices, not the number prepared.
        assert_eq!(first.replicas, 2);
    }

    #[test]
    fn no_valid_nodes_is_an_empty_plan() {
        let spec = two_node_spec();
        let store = MemoryStore::new();
        store.add_node("node1", "node1", "10.0.0.1", false, true);
        store.add_node("node2", "node2", "10.0.0.2", true, false);

        let plan = run_plan(&spec, &store).unwrap();

        assert!(plan.is_empty());
        assert!(plan.configs.is_empty());
        assert_eq!(
            store.count_calls(|c| matches!(
                c,
                StoreCall::CreateTask(_) | StoreCall::CreateConfigObject(_)
            )),
            0
        );
    }

    #[test]
    fn unknown_nodes_are_skipped() {
        let spec = explicit_spec(&["node1", "node9"], &["/dev/sdb"]);
        let store = MemoryStore::new();
        store.seed_cluster(&spec, &node_addresses(&["node1"]));

        let plan = run_plan(&spec, &store).unwrap();

        assert_eq!(plan.task_names(), vec!["prepare-chunkfile-node1-sdb"]);
    }

    #[test]
    fn invalid_spec_touches_nothing() {
        let spec = explicit_spec(&["node1"], &[]);
        let store = seeded_store(&two_node_spec(), false);

        let err = run_plan(&spec, &store).unwrap_err();

        assert!(matches!(err, ProvisionError::Configuration(_)));
        assert!(store.calls().is_empty());
    }

    #[test]
    fn missing_upstream_endpoints_are_fatal() {
        let spec = two_node_spec();
        let store = MemoryStore::new();
        store.add_node("node1", "node1", "10.0.0.1", true, true);
        store.add_node("node2", "node2", "10.0.0.2", true, true);

        let err = run_plan(&spec, &store).unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::UpstreamAddress { service: "etcd", .. }
        ));
        assert_eq!(
            store.count_calls(|c| matches!(c, StoreCall::CreateTask(_))),
            0
        );
    }

    #[test]
    fn format_script_object_is_created_once() {
        let spec = two_node_spec();
        let store = seeded_store(&spec, false);

        let first = run_plan(&spec, &store).unwrap();
        let second = run_plan(&spec, &store).unwrap();

        let object = store
            .config_object(TEST_NAMESPACE, FORMAT_CONFIG_OBJECT_NAME)
            .unwrap();
        assert!(object.data.contains_key("format.sh"));
        assert_eq!(
            store.count_calls(|c| matches!(c, StoreCall::CreateConfigObject(_))),
            2
        );

        // The tasks from the first run are still active, so the second run reuses them.
        let handles = |plan: &ProvisionPlan| -> Vec<_> {
            plan.tasks.iter().map(|t| t.handle.clone()).collect()
        };
        assert_eq!(handles(&first), handles(&second));
        assert_eq!(first.configs, second.configs);
        assert_eq!(
            store.count_calls(|c| matches!(c, StoreCall::DeleteTask(..))),
            0
        );
    }

    #[test]
    fn pre_selected_nodes_use_their_own_devices() {
        let mut spec = two_node_spec();
        spec.selection = NodeSelection::PreSelected(vec![
            SelectedNode {
                node: "node1".to_string(),
                devices: vec![DeviceSpec::new("/dev/sdb", 90)],
            },
            SelectedNode {
                node: "node2".to_string(),
                devices: vec![
                    DeviceSpec::new("/dev/sdb", 90),
                    DeviceSpec::new("/dev/sdc", 90),
                    DeviceSpec::new("/dev/nvme0n1", 50),
                ],
            },
        ]);
        let store = seeded_store(&spec, false);

        let plan = run_plan(&spec, &store).unwrap();

        assert_eq!(plan.len(), 4);
        let replicas: Vec<u32> = plan.configs.iter().map(|c| c.replicas).collect();
        assert_eq!(replicas, vec![1, 3, 3, 3]);
        assert_eq!(plan.configs[3].resource_name, "curve-chunkserver-node2-nvme0n1");
        assert_eq!(plan.configs[3].port, 8202);
    }

    #[test]
    fn last_port_can_be_allocated() {
        let mut spec = explicit_spec(&["node1"], &["/dev/sdb"]);
        spec.storage_port = u16::MAX;
        let store = seeded_store(&spec, false);

        let plan = run_plan(&spec, &store).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.configs[0].port, u16::MAX);
    }

    #[test]
    fn port_range_past_the_last_port_is_rejected() {
        let mut spec = explicit_spec(&["node1"], &["/dev/sdb", "/dev/sdc"]);
        spec.storage_port = u16::MAX;
        let store = seeded_store(&spec, false);
        store.clear_calls();

        let err = run_plan(&spec, &store).unwrap_err();

        assert!(matches!(err, ProvisionError::Configuration(_)));
        assert!(store.calls().is_empty());

        spec.storage_port = u16::MAX - 1;
        let plan = run_plan(&spec, &store).unwrap();
        let ports: Vec<u16> = plan.configs.iter().map(|c| c.port).collect();
        assert_eq!(ports, vec![u16::MAX - 1, u16::MAX]);
    }

    #[test]
    fn nodes_sharing_a_hostname_are_planned_once() {
        let mut spec = two_node_spec();
        spec.selection = NodeSelection::PreSelected(vec![
            SelectedNode {
                node: "node1".to_string(),
                devices: vec![DeviceSpec::new("/dev/sdb", 90)],
            },
            SelectedNode {
                node: "node1-alias".to_string(),
                devices: vec![
                    DeviceSpec::new("/dev/sdc", 90),
                    DeviceSpec::new("/dev/sdd", 90),
                ],
            },
        ]);
        let store = MemoryStore::new();
        store.seed_cluster(&spec, &node_addresses(&["node1"]));
        store.add_node("node1-alias", "node1", "10.0.0.9", true, true);

        let plan = run_plan(&spec, &store).unwrap();

        assert_eq!(plan.task_names(), vec!["prepare-chunkfile-node1-sdb"]);
        assert_eq!(plan.configs[0].replicas, 1);
        assert_eq!(store.task_names(), vec!["prepare-chunkfile-node1-sdb"]);
    }

    #[test]
    fn node_addresses_come_from_the_directory() {
        let spec = two_node_spec();
        let store = seeded_store(&spec, false);

        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let addresses = resolve_node_addresses(&*store, &spec.node_names())
                .await
                .unwrap();
            assert_eq!(addresses, node_addresses(&spec.node_names()));

            let err = resolve_node_addresses(&*store, &["node7"])
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        });
    }
}
