// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

use crate::orchestrator::Stage;

/// A failure reported by an external collaborator (pool creation, service launch, ...). The core
/// never inspects these, it only attaches context about which stage produced them.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// The kind of object a store operation was acting on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectKind {
    Task,
    ConfigObject,
    Node,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ObjectKind::Task => "task",
                ObjectKind::ConfigObject => "config object",
                ObjectKind::Node => "node",
            }
        )
    }
}

/// Errors returned by a `TaskStore` or `NodeDirectory` implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: ObjectKind,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: ObjectKind,
        namespace: String,
        name: String,
    },

    /// Any other failure talking to the backend, for example a timeout or a refused connection.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

/// Everything that can go wrong during a provisioning run.
///
/// Only some of these ever reach the caller of `Provisioner::run()`: per-device submission errors
/// are contained by the planner, and a stuck deletion is downgraded to a warning inside
/// `delete_task()`.
#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    /// The cluster specification is invalid or incomplete. Raised before any store call.
    #[error("invalid cluster specification: {0}")]
    Configuration(String),

    /// A lookup or fetch against the task or config store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Creating the task for a single device failed.
    #[error("failed to create task {name}: {source}")]
    Submission {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Removing a previous instance of a task failed, so no replacement was created.
    #[error("failed to remove task {name}: {source}")]
    Deletion {
        name: String,
        #[source]
        source: StoreError,
    },

    /// The endpoints of a service the chunkservers depend on could not be read.
    #[error("failed to get {service} endpoints from config object {object}: {source}")]
    UpstreamAddress {
        service: &'static str,
        object: String,
        #[source]
        source: StoreError,
    },

    /// The format barrier did not release within its deadline (or a status fetch failed, or the
    /// wait was cancelled).
    #[error("format tasks did not complete within {deadline_secs}s")]
    BarrierTimeout { deadline_secs: u64 },

    /// A downstream collaborator failed during one of the pipeline stages.
    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: CollaboratorError,
    },
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
