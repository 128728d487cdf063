// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod plan;
pub mod simulate;
pub mod validate;

use std::collections::BTreeMap;

use clap::{Parser, Subcommand};

use crate::{
    config::Config,
    spec::{ClusterSpec, Settings},
};

/// An error that has already been reported (normally to stderr) at the point where it happened.
/// Callers only pass it upwards; `main()` turns it into a nonzero exit status.
///
/// Build one with `handle_err()`, which runs the reporting code and discards the original error.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub fn handled_error() -> HandledResult<()> {
    HandledResult::Err(HandledError {})
}

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Report the error with `handler`, then mark it as handled.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the cluster configuration and print a summary of it.
    Validate,
    /// Submit the format tasks against an in-memory store and print the chunkserver configs.
    Plan,
    /// Run the whole provisioning pipeline against in-memory collaborators.
    Simulate,
}

/// Everything a command needs from the config file.
pub struct Loaded {
    pub spec: ClusterSpec,
    pub verbose: bool,
    pub settings: Settings,
    pub node_addresses: BTreeMap<String, String>,
}

fn load(cli: &Cli) -> HandledResult<Loaded> {
    let config = Config::from_path(cli.config.as_deref())
        .handle_err(|e| eprintln!("Could not load cluster config: {e}"))?;

    Ok(Loaded {
        spec: ClusterSpec::from_config(&config),
        verbose: cli.verbose,
        settings: Settings::from_config(&config.provision),
        node_addresses: config
            .inventory
            .map(|inventory| inventory.node_addresses)
            .unwrap_or_default(),
    })
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    let loaded = load(cli)?;

    if let Commands::Validate = cli.command {
        return validate::validate(&loaded);
    }

    let rt = tokio::runtime::Runtime::new()
        .handle_err(|e| eprintln!("Error launching tokio runtime: {e}"))?;

    rt.block_on(async {
        match &cli.command {
            Commands::Plan => plan::plan(&loaded).await,
            Commands::Simulate => simulate::simulate(&loaded).await,
            Commands::Validate => unreachable!(),
        }
    })
}
