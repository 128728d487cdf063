// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The provisioning pipeline: plan, wait for formatting, then hand over to the pool and service
//! collaborators.

use std::{collections::BTreeMap, fmt, sync::Arc, sync::Mutex};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    log::{error, info},
    tokio_util::sync::CancellationToken,
};

use crate::{
    barrier::{self, BarrierConfig},
    chunkserver::DeviceConfigRecord,
    error::{CollaboratorError, ProvisionError, Result},
    planner::{Planner, ProvisionPlan},
    spec::{ClusterRef, ClusterSpec, Settings},
    store::{NodeDirectory, TaskStore},
};

/// The stages of a provisioning run, in the order they are entered. `Failed` can follow any
/// stage; `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidateSpec,
    Provisioning,
    AwaitFormat,
    CreatePhysicalPool,
    StartServices,
    CreateLogicalPool,
    Ready,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Stage::ValidateSpec => "ValidateSpec",
                Stage::Provisioning => "Provisioning",
                Stage::AwaitFormat => "AwaitFormat",
                Stage::CreatePhysicalPool => "CreatePhysicalPool",
                Stage::StartServices => "StartServices",
                Stage::CreateLogicalPool => "CreateLogicalPool",
                Stage::Ready => "Ready",
                Stage::Failed => "Failed",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Physical,
    Logical,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Physical => write!(f, "physical"),
            PoolKind::Logical => write!(f, "logical"),
        }
    }
}

/// Identifier of a storage pool, as returned by the pool collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolId(pub String);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    FormatedReady,
    ChunkServerReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

pub const REASON_FORMATTING: &str = "FormatingChunkfilePool";
pub const REASON_FORMAT_SUCCEEDED: &str = "FormatChunkfilePoolSucceeded";
pub const REASON_CLUSTER_CREATED: &str = "ChunkServerClusterCreated";

/// An externally observed status condition of the cluster resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
    ) -> Self {
        Condition {
            condition_type,
            status,
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: Utc::now(),
        }
    }
}

#[async_trait]
pub trait PoolCreator: Send + Sync {
    async fn create_pool(
        &self,
        kind: PoolKind,
        node_addresses: &BTreeMap<String, String>,
    ) -> std::result::Result<PoolId, CollaboratorError>;
}

#[async_trait]
pub trait ServiceLauncher: Send + Sync {
    /// Start a chunkserver for every record, returning once all of them are ready or one failed.
    async fn start_services(
        &self,
        configs: &[DeviceConfigRecord],
    ) -> std::result::Result<(), CollaboratorError>;
}

/// Receives condition updates. Updates are fire-and-forget; nothing is ever read back.
#[async_trait]
pub trait ConditionSink: Send + Sync {
    async fn update_condition(&self, cluster: &ClusterRef, condition: Condition);
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionReport {
    pub plan: ProvisionPlan,
    pub physical_pool: PoolId,
    pub logical_pool: PoolId,
}

pub struct Provisioner {
    store: Arc<dyn TaskStore>,
    nodes: Arc<dyn NodeDirectory>,
    pools: Arc<dyn PoolCreator>,
    launcher: Arc<dyn ServiceLauncher>,
    conditions: Arc<dyn ConditionSink>,
    settings: Settings,
    /// Every stage entered so far; the last one is the current stage.
    stages: Mutex<Vec<Stage>>,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        nodes: Arc<dyn NodeDirectory>,
        pools: Arc<dyn PoolCreator>,
        launcher: Arc<dyn ServiceLauncher>,
        conditions: Arc<dyn ConditionSink>,
        settings: Settings,
    ) -> Self {
        Provisioner {
            store,
            nodes,
            pools,
            launcher,
            conditions,
            settings,
            stages: Mutex::new(vec![Stage::ValidateSpec]),
        }
    }

    pub fn stage(&self) -> Stage {
        *self
            .stages
            .lock()
            .unwrap()
            .last()
            .unwrap_or(&Stage::ValidateSpec)
    }

    /// The stages entered during the last run, in order.
    pub fn stage_history(&self) -> Vec<Stage> {
        self.stages.lock().unwrap().clone()
    }

    fn enter(&self, stage: Stage) {
        info!("entering stage {stage}");
        self.stages.lock().unwrap().push(stage);
    }

    fn stage_error(&self, source: CollaboratorError) -> ProvisionError {
        ProvisionError::Stage {
            stage: self.stage(),
            source,
        }
    }

    /// Run the whole pipeline once. Stages only ever move forward; the first error moves the run
    /// to `Stage::Failed` and is returned as-is. Tasks that were already created are left in place.
    pub async fn run(
        &self,
        spec: &ClusterSpec,
        node_addresses: &BTreeMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<ProvisionReport> {
        *self.stages.lock().unwrap() = vec![Stage::ValidateSpec];

        let result = self.run_stages(spec, node_addresses, cancel).await;
        if let Err(e) = &result {
            error!(
                "provisioning of cluster {}/{} failed in stage {}: {e}",
                spec.namespace(),
                spec.cluster.name,
                self.stage()
            );
            self.enter(Stage::Failed);
        }
        result
    }

    async fn run_stages(
        &self,
        spec: &ClusterSpec,
        node_addresses: &BTreeMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<ProvisionReport> {
        spec.validate()?;

        self.enter(Stage::Provisioning);
        let planner = Planner::new(
            self.store.as_ref(),
            self.nodes.as_ref(),
            self.settings.deletion,
        );
        let plan = planner.plan(spec, node_addresses).await?;
        info!("submitted {} format tasks", plan.len());

        self.enter(Stage::AwaitFormat);
        self.conditions
            .update_condition(
                &spec.cluster,
                Condition::new(
                    ConditionType::FormatedReady,
                    ConditionStatus::True,
                    REASON_FORMATTING,
                    "Formating chunkfilepool",
                ),
            )
            .await;

        let config = BarrierConfig {
            interval: self.settings.format_poll_interval,
            deadline: self.settings.format_deadline,
        };
        let rx = barrier::spawn_watcher(
            Arc::clone(&self.store),
            spec.namespace(),
            plan.task_names(),
            config,
            cancel,
        );
        if !barrier::released(rx).await {
            return Err(ProvisionError::BarrierTimeout {
                deadline_secs: config.deadline.as_secs(),
            });
        }
        self.conditions
            .update_condition(
                &spec.cluster,
                Condition::new(
                    ConditionType::FormatedReady,
                    ConditionStatus::True,
                    REASON_FORMAT_SUCCEEDED,
                    "Formating chunkfilepool successed",
                ),
            )
            .await;

        self.enter(Stage::CreatePhysicalPool);
        let physical_pool = self
            .pools
            .create_pool(PoolKind::Physical, node_addresses)
            .await
            .map_err(|e| self.stage_error(e))?;
        info!("created physical pool {physical_pool}");

        self.enter(Stage::StartServices);
        self.launcher
            .start_services(&plan.configs)
            .await
            .map_err(|e| self.stage_error(e))?;

        self.enter(Stage::CreateLogicalPool);
        let logical_pool = self
            .pools
            .create_pool(PoolKind::Logical, node_addresses)
            .await
            .map_err(|e| self.stage_error(e))?;
        info!("created logical pool {logical_pool}");

        self.enter(Stage::Ready);
        self.conditions
            .update_condition(
                &spec.cluster,
                Condition::new(
                    ConditionType::ChunkServerReady,
                    ConditionStatus::True,
                    REASON_CLUSTER_CREATED,
                    "Chunkserver cluster has been created",
                ),
            )
            .await;

        Ok(ProvisionReport {
            plan,
            physical_pool,
            logical_pool,
        })
    }
}
