// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod barrier;
pub mod chunkserver;
pub mod commands;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod spec;
pub mod store;
pub mod task;
pub mod test_env;

pub fn default_config_path() -> String {
    match std::env::var("CHUNKPROV_CONFIG") {
        Ok(conf) => conf,
        Err(_) => "/etc/chunkprov/cluster.toml".to_string(),
    }
}
