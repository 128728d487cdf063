// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{collections::BTreeMap, sync::Arc};

use {async_trait::async_trait, log::info, tokio_util::sync::CancellationToken};

use crate::{
    chunkserver::DeviceConfigRecord,
    commands::{Handle, HandledResult, Loaded},
    error::CollaboratorError,
    orchestrator::*,
    spec::ClusterRef,
    store::memory::MemoryStore,
};

/// Stands in for the pool, launch and condition collaborators by logging what it is asked to do.
struct DryRun;

#[async_trait]
impl PoolCreator for DryRun {
    async fn create_pool(
        &self,
        kind: PoolKind,
        node_addresses: &BTreeMap<String, String>,
    ) -> Result<PoolId, CollaboratorError> {
        info!("would create {kind} pool over {} nodes", node_addresses.len());
        Ok(PoolId(format!("{kind}-pool")))
    }
}

#[async_trait]
impl ServiceLauncher for DryRun {
    async fn start_services(
        &self,
        configs: &[DeviceConfigRecord],
    ) -> Result<(), CollaboratorError> {
        for config in configs {
            info!(
                "would start {} on {}:{}",
                config.resource_name, config.node_ip, config.port
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ConditionSink for DryRun {
    async fn update_condition(&self, cluster: &ClusterRef, condition: Condition) {
        info!(
            "{}/{}: {:?}={:?} ({})",
            cluster.namespace,
            cluster.name,
            condition.condition_type,
            condition.status,
            condition.reason
        );
    }
}

/// Run the full pipeline against an in-memory store whose tasks complete straight away.
pub async fn simulate(loaded: &Loaded) -> HandledResult<()> {
    if loaded.verbose {
        loaded.spec.print_summary();
    }

    let store = Arc::new(MemoryStore::completing());
    store.seed_cluster(&loaded.spec, &loaded.node_addresses);

    let dry_run = Arc::new(DryRun);
    let provisioner = Provisioner::new(
        store.clone(),
        store.clone(),
        dry_run.clone(),
        dry_run.clone(),
        dry_run,
        loaded.settings.clone(),
    );

    let report = provisioner
        .run(
            &loaded.spec,
            &loaded.node_addresses,
            CancellationToken::new(),
        )
        .await
        .handle_err(|e| eprintln!("Provisioning failed: {e}"))?;

    let stages: Vec<String> = provisioner
        .stage_history()
        .iter()
        .map(|s| s.to_string())
        .collect();
    println!("stages: {}", stages.join(" -> "));
    println!("format tasks: {}", report.plan.len());
    for name in store.task_names() {
        println!("  {name}");
    }
    println!("physical pool: {}", report.physical_pool);
    println!("logical pool: {}", report.logical_pool);

    Ok(())
}
