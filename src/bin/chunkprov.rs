// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use chunkprov_lib::commands::{self, Cli};

/// The chunkprov binary checks a cluster config and dry-runs chunkserver provisioning.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("CHUNKPROV_LOG", "warn"))
        .init();

    let args = Cli::parse();

    if commands::main(&args).is_err() {
        std::process::exit(1);
    }
}
