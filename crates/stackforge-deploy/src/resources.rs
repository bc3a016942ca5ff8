//! Resource adapters
//!
//! Stack resources are plain records. Those the fleet actions can act on
//! are wrapped in small adapter types chosen by the record's resource
//! type, each implementing a fixed capability trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackforge_types::{resource_types, StackResource};
use tracing::info;

use crate::client::{CdnClient, GroupState, Invalidation, ScalingClient};
use crate::error::{DeployError, Result};

/// A stack resource classified by type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagedResource {
    ScalingGroup(ScalingGroup),
    Distribution(Distribution),
    Other(StackResource),
}

impl ManagedResource {
    /// Classify a resource record. Resources without a physical id yet
    /// are never adapted.
    pub fn classify(resource: StackResource) -> Self {
        let physical = match resource.physical_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return ManagedResource::Other(resource),
        };
        match resource.resource_type.as_str() {
            resource_types::AUTO_SCALING_GROUP => ManagedResource::ScalingGroup(ScalingGroup {
                logical_id: resource.logical_id,
                name: physical,
            }),
            resource_types::CLOUDFRONT_DISTRIBUTION => {
                ManagedResource::Distribution(Distribution {
                    logical_id: resource.logical_id,
                    id: physical,
                })
            }
            _ => ManagedResource::Other(resource),
        }
    }

    pub fn logical_id(&self) -> &str {
        match self {
            ManagedResource::ScalingGroup(g) => &g.logical_id,
            ManagedResource::Distribution(d) => &d.logical_id,
            ManagedResource::Other(r) => &r.logical_id,
        }
    }
}

/// Capability of resources whose instance count can be changed.
#[async_trait]
pub trait Scalable: Send + Sync {
    /// Set the desired capacity and wait until exactly that many
    /// instances are in service and no other instances remain.
    async fn scale_to(
        &self,
        client: &dyn ScalingClient,
        desired: i32,
        poll: Duration,
    ) -> Result<GroupState>;

    /// Replace every instance, one at a time. Returns how many were
    /// replaced.
    async fn recycle(&self, client: &dyn ScalingClient, poll: Duration) -> Result<usize>;
}

/// Capability of resources that cache content.
#[async_trait]
pub trait Invalidatable: Send + Sync {
    /// Invalidate `paths` and wait while the invalidation is in progress.
    async fn invalidate(
        &self,
        client: &dyn CdnClient,
        paths: &[String],
        caller_reference: &str,
        poll: Duration,
    ) -> Result<Invalidation>;
}

/// Auto scaling group owned by a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingGroup {
    pub logical_id: String,
    /// Group name (physical id).
    pub name: String,
}

impl ScalingGroup {
    async fn wait_settled(
        &self,
        client: &dyn ScalingClient,
        size: usize,
        poll: Duration,
    ) -> Result<GroupState> {
        let mut last = String::new();
        loop {
            let state = client
                .describe_group(&self.name)
                .await
                .map_err(|e| scaling_error(&self.name, e))?;
            if state.is_settled_at(size) {
                return Ok(state);
            }
            let description = state.describe();
            if description != last {
                info!(group = %self.logical_id, state = %description, target = size, "Waiting for instances");
                last = description;
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn set_capacity(&self, client: &dyn ScalingClient, desired: i32) -> Result<()> {
        client
            .set_desired_capacity(&self.name, desired)
            .await
            .map_err(|e| scaling_error(&self.name, e))
    }
}

#[async_trait]
impl Scalable for ScalingGroup {
    async fn scale_to(
        &self,
        client: &dyn ScalingClient,
        desired: i32,
        poll: Duration,
    ) -> Result<GroupState> {
        if desired < 0 {
            return Err(DeployError::Validation(format!(
                "Desired capacity must not be negative, got {desired}"
            )));
        }
        info!(group = %self.logical_id, desired, "Setting desired capacity");
        self.set_capacity(client, desired).await?;
        self.wait_settled(client, desired as usize, poll).await
    }

    async fn recycle(&self, client: &dyn ScalingClient, poll: Duration) -> Result<usize> {
        let current = client
            .describe_group(&self.name)
            .await
            .map_err(|e| scaling_error(&self.name, e))?
            .instances
            .len();
        let size = current as i32;
        for round in 1..=current {
            info!(group = %self.logical_id, round, of = current, "Replacing instance");
            self.set_capacity(client, size + 1).await?;
            self.wait_settled(client, current + 1, poll).await?;
            self.set_capacity(client, size).await?;
            self.wait_settled(client, current, poll).await?;
        }
        Ok(current)
    }
}

/// CDN distribution owned by a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub logical_id: String,
    /// Distribution id (physical id).
    pub id: String,
}

#[async_trait]
impl Invalidatable for Distribution {
    async fn invalidate(
        &self,
        client: &dyn CdnClient,
        paths: &[String],
        caller_reference: &str,
        poll: Duration,
    ) -> Result<Invalidation> {
        let mut invalidation = client
            .create_invalidation(&self.id, paths, caller_reference)
            .await
            .map_err(|e| cdn_error(&self.id, e))?;
        info!(distribution = %self.id, invalidation = %invalidation.id, "Invalidation created");
        while invalidation.is_in_progress() {
            tokio::time::sleep(poll).await;
            invalidation = client
                .get_invalidation(&self.id, &invalidation.id)
                .await
                .map_err(|e| cdn_error(&self.id, e))?;
        }
        Ok(invalidation)
    }
}

fn scaling_error(group: &str, err: crate::error::ServiceError) -> DeployError {
    DeployError::Fleet(format!("Scaling group {group}: {err}"))
}

fn cdn_error(distribution: &str, err: crate::error::ServiceError) -> DeployError {
    DeployError::Fleet(format!("Distribution {distribution}: {err}"))
}
