// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::commands::{handled_error, HandledResult, Loaded};

pub fn validate(loaded: &Loaded) -> HandledResult<()> {
    if let Err(e) = loaded.spec.validate() {
        eprintln!("{e}");
        return handled_error();
    }

    loaded.spec.print_summary();

    for node in loaded.spec.node_names() {
        if !loaded.node_addresses.contains_key(node) {
            println!("note: no inventory address for node {node}");
        }
    }

    Ok(())
}
