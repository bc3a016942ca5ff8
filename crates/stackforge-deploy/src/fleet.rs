//! Fleet actions
//!
//! Bulk operations on the scaling groups and CDN distributions of a
//! stack. Every group or distribution is handled on its own task; all
//! tasks are joined before the action returns.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::client::{CdnClient, GroupState, Invalidation, OrchestrationClient, ScalingClient};
use crate::config::FleetConfig;
use crate::error::{DeployError, Result};
use crate::resources::{Distribution, Invalidatable, ManagedResource, Scalable, ScalingGroup};

/// Result of recycling one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecycleReport {
    pub group: String,
    pub replaced: usize,
}

/// Result of invalidating one distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationReport {
    pub distribution: String,
    pub aliases: Vec<String>,
    pub invalidation: Invalidation,
}

/// Fleet action runner
pub struct Fleet {
    orchestrator: Arc<dyn OrchestrationClient>,
    scaling: Arc<dyn ScalingClient>,
    cdn: Arc<dyn CdnClient>,
    config: FleetConfig,
}

impl Fleet {
    pub fn new(
        orchestrator: Arc<dyn OrchestrationClient>,
        scaling: Arc<dyn ScalingClient>,
        cdn: Arc<dyn CdnClient>,
    ) -> Self {
        Self::with_config(orchestrator, scaling, cdn, FleetConfig::default())
    }

    pub fn with_config(
        orchestrator: Arc<dyn OrchestrationClient>,
        scaling: Arc<dyn ScalingClient>,
        cdn: Arc<dyn CdnClient>,
        config: FleetConfig,
    ) -> Self {
        Self {
            orchestrator,
            scaling,
            cdn,
            config,
        }
    }

    /// Resources of a stack, classified.
    pub async fn resources(&self, stack: &str) -> Result<Vec<ManagedResource>> {
        let resources = self
            .orchestrator
            .list_resources(stack)
            .await
            .map_err(|e| DeployError::from_service(e, stack))?;
        Ok(resources.into_iter().map(ManagedResource::classify).collect())
    }

    /// Scaling groups of a stack.
    pub async fn scaling_groups(&self, stack: &str) -> Result<Vec<ScalingGroup>> {
        Ok(self
            .resources(stack)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                ManagedResource::ScalingGroup(g) => Some(g),
                _ => None,
            })
            .collect())
    }

    /// CDN distributions of a stack.
    pub async fn distributions(&self, stack: &str) -> Result<Vec<Distribution>> {
        Ok(self
            .resources(stack)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                ManagedResource::Distribution(d) => Some(d),
                _ => None,
            })
            .collect())
    }

    /// Scale every group of the stack, or only the one named `group`
    /// (logical id or group name).
    #[instrument(skip(self))]
    pub async fn scale(
        &self,
        stack: &str,
        group: Option<&str>,
        desired: i32,
    ) -> Result<Vec<GroupState>> {
        let groups = self.select_groups(stack, group).await?;
        let poll = self.config.scale_poll;
        let mut tasks = JoinSet::new();
        for g in groups {
            let client = Arc::clone(&self.scaling);
            tasks.spawn(async move { g.scale_to(client.as_ref(), desired, poll).await });
        }
        join_tasks(tasks).await
    }

    /// Replace every instance of every selected group.
    #[instrument(skip(self))]
    pub async fn recycle(&self, stack: &str, group: Option<&str>) -> Result<Vec<RecycleReport>> {
        let groups = self.select_groups(stack, group).await?;
        let poll = self.config.recycle_poll;
        let mut tasks = JoinSet::new();
        for g in groups {
            let client = Arc::clone(&self.scaling);
            tasks.spawn(async move {
                let replaced = g.recycle(client.as_ref(), poll).await?;
                Ok(RecycleReport {
                    group: g.logical_id,
                    replaced,
                })
            });
        }
        join_tasks(tasks).await
    }

    /// Invalidate all cached content of every distribution of the stack.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, stack: &str) -> Result<Vec<InvalidationReport>> {
        let distributions = self.distributions(stack).await?;
        if distributions.is_empty() {
            return Err(DeployError::Fleet(
                "No valid CloudFront distributions found".into(),
            ));
        }

        let poll = self.config.invalidation_poll;
        let reference = Utc::now().format("%Y-%m-%d %H:%M:%S %z").to_string();
        let paths = vec!["/*".to_string()];
        let mut tasks = JoinSet::new();
        for d in distributions {
            let client = Arc::clone(&self.cdn);
            let reference = format!("{reference} {}", d.id);
            let paths = paths.clone();
            tasks.spawn(async move {
                let aliases = client.aliases(&d.id).await.unwrap_or_else(|err| {
                    warn!(distribution = %d.id, error = %err, "Could not read aliases");
                    Vec::new()
                });
                info!(distribution = %d.id, aliases = ?aliases, "Invalidating");
                let invalidation = d
                    .invalidate(client.as_ref(), &paths, &reference, poll)
                    .await?;
                Ok(InvalidationReport {
                    distribution: d.id,
                    aliases,
                    invalidation,
                })
            });
        }
        join_tasks(tasks).await
    }

    async fn select_groups(&self, stack: &str, group: Option<&str>) -> Result<Vec<ScalingGroup>> {
        let groups = self.scaling_groups(stack).await?;
        let selected: Vec<ScalingGroup> = match group {
            Some(wanted) => groups
                .into_iter()
                .filter(|g| g.logical_id == wanted || g.name == wanted)
                .collect(),
            None => groups,
        };
        if selected.is_empty() {
            return Err(DeployError::Fleet(match group {
                Some(wanted) => format!("Scaling group {wanted} not found in stack {stack}"),
                None => format!("No scaling groups found in stack {stack}"),
            }));
        }
        Ok(selected)
    }
}

/// Join every task; the first failure is returned once all have ended.
async fn join_tasks<T: 'static>(mut tasks: JoinSet<Result<T>>) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(tasks.len());
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(value)) => results.push(value),
            Ok(Err(err)) => {
                failure.get_or_insert(err);
            }
            Err(err) => {
                failure.get_or_insert(DeployError::Fleet(format!("Fleet task failed: {err}")));
            }
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(results),
    }
}
