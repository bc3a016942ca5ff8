//! Service client seams
//!
//! The engine talks to three services: the orchestration service (stacks,
//! events, resources), the scaling service and the CDN. Each is a trait so
//! that the engine runs the same against AWS and against the in-memory
//! fakes in [`crate::memory`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackforge_types::{ParameterBindings, StackEvent, StackOutput, StackResource, StackSummary};
use std::collections::BTreeMap;

use crate::error::ServiceError;

type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Create or update request. Templates are always submitted by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRequest {
    pub name: String,
    pub template_url: String,
    pub parameters: ParameterBindings,
}

/// One page of events, newest first.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<StackEvent>,
    pub next_token: Option<String>,
}

/// Orchestration service operations
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Describe a stack by name or id. `None` when it does not exist.
    async fn describe_stack(&self, stack: &str) -> ServiceResult<Option<StackSummary>>;

    /// List live stacks.
    async fn list_stacks(&self) -> ServiceResult<Vec<StackSummary>>;

    /// Create a stack; failures leave the stack in place for inspection.
    async fn create_stack(&self, request: &StackRequest) -> ServiceResult<String>;

    /// Update an existing stack.
    async fn update_stack(&self, request: &StackRequest) -> ServiceResult<String>;

    async fn delete_stack(&self, stack: &str) -> ServiceResult<()>;

    /// List events of a stack, newest first, one page at a time.
    async fn list_events(&self, stack: &str, next_token: Option<&str>)
        -> ServiceResult<EventPage>;

    async fn list_resources(&self, stack: &str) -> ServiceResult<Vec<StackResource>>;

    async fn outputs(&self, stack: &str) -> ServiceResult<Vec<StackOutput>>;
}

/// Instance inside a scaling group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    pub id: String,
    pub lifecycle_state: String,
}

/// Snapshot of a scaling group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub name: String,
    pub desired_capacity: i32,
    pub instances: Vec<InstanceState>,
}

impl GroupState {
    pub const IN_SERVICE: &'static str = "InService";

    /// Instance counts per lifecycle state.
    pub fn state_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for instance in &self.instances {
            *counts.entry(instance.lifecycle_state.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Human readable summary, e.g. `2 InService, 1 Pending`.
    pub fn describe(&self) -> String {
        if self.instances.is_empty() {
            return "no instances".to_string();
        }
        self.state_counts()
            .iter()
            .map(|(state, count)| format!("{count} {state}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Exactly `size` instances in service and nothing else.
    pub fn is_settled_at(&self, size: usize) -> bool {
        self.instances.len() == size
            && self
                .instances
                .iter()
                .all(|i| i.lifecycle_state == Self::IN_SERVICE)
    }
}

/// Scaling service operations
#[async_trait]
pub trait ScalingClient: Send + Sync {
    async fn describe_group(&self, name: &str) -> ServiceResult<GroupState>;

    async fn set_desired_capacity(&self, name: &str, desired: i32) -> ServiceResult<()>;
}

/// Cache invalidation handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    pub id: String,
    pub status: String,
}

impl Invalidation {
    pub const IN_PROGRESS: &'static str = "InProgress";

    pub fn is_in_progress(&self) -> bool {
        self.status == Self::IN_PROGRESS
    }
}

/// CDN operations
#[async_trait]
pub trait CdnClient: Send + Sync {
    /// Domain aliases served by a distribution.
    async fn aliases(&self, distribution: &str) -> ServiceResult<Vec<String>>;

    async fn create_invalidation(
        &self,
        distribution: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> ServiceResult<Invalidation>;

    async fn get_invalidation(&self, distribution: &str, id: &str) -> ServiceResult<Invalidation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(states: &[&str]) -> GroupState {
        GroupState {
            name: "web".into(),
            desired_capacity: states.len() as i32,
            instances: states
                .iter()
                .enumerate()
                .map(|(i, s)| InstanceState {
                    id: format!("i-{i}"),
                    lifecycle_state: s.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_settled_requires_all_in_service() {
        assert!(group(&["InService", "InService"]).is_settled_at(2));
        assert!(!group(&["InService", "Pending"]).is_settled_at(2));
        assert!(!group(&["InService"]).is_settled_at(2));
        assert!(group(&[]).is_settled_at(0));
    }

    #[test]
    fn test_describe_counts_states() {
        let g = group(&["InService", "Pending", "InService"]);
        assert_eq!(g.describe(), "2 InService, 1 Pending");
        assert_eq!(group(&[]).describe(), "no instances");
    }
}
