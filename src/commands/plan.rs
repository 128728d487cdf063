// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde::Serialize;

use crate::{
    chunkserver::DeviceConfigRecord,
    commands::{Handle, HandledResult, Loaded},
    planner::Planner,
    store::memory::MemoryStore,
};

#[derive(Serialize)]
struct PlanOutput<'a> {
    chunkserver: &'a [DeviceConfigRecord],
}

/// Run the planner against an in-memory store seeded from the inventory, and print the resulting
/// chunkserver configuration records.
pub async fn plan(loaded: &Loaded) -> HandledResult<()> {
    if loaded.verbose {
        loaded.spec.print_summary();
    }

    let store = MemoryStore::new();
    store.seed_cluster(&loaded.spec, &loaded.node_addresses);

    let planner = Planner::new(&store, &store, loaded.settings.deletion);
    let plan = planner
        .plan(&loaded.spec, &loaded.node_addresses)
        .await
        .handle_err(|e| eprintln!("Planning failed: {e}"))?;

    eprintln!(
        "{} format tasks planned: {}",
        plan.len(),
        plan.task_names().join(", ")
    );

    let output = toml::to_string_pretty(&PlanOutput {
        chunkserver: &plan.configs,
    })
    .handle_err(|e| eprintln!("Could not serialize plan: {e}"))?;
    println!("{output}");

    Ok(())
}
