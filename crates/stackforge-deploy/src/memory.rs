//! In-memory service implementations
//!
//! Scriptable stand-ins for the orchestration, scaling and CDN services,
//! suitable for development and testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use stackforge_types::{StackEvent, StackOutput, StackResource, StackSummary};

use crate::client::{
    CdnClient, EventPage, GroupState, InstanceState, Invalidation, OrchestrationClient,
    ScalingClient, StackRequest,
};
use crate::error::ServiceError;

type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Mutating call received by [`InMemoryOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    Create(StackRequest),
    Update(StackRequest),
    Delete(String),
}

#[derive(Debug, Default)]
struct EventStream {
    /// Oldest first.
    visible: Vec<StackEvent>,
    /// Batches released one per first-page listing.
    pending: VecDeque<Vec<StackEvent>>,
}

/// In-memory orchestration service
///
/// Event streams are keyed by whatever reference the caller lists them
/// with (stack name for the root, physical id for nested stacks).
pub struct InMemoryOrchestrator {
    stacks: DashMap<String, StackSummary>,
    streams: DashMap<String, EventStream>,
    resources: DashMap<String, Vec<StackResource>>,
    outputs: DashMap<String, Vec<StackOutput>>,
    failures: DashMap<String, VecDeque<ServiceError>>,
    requests: Mutex<Vec<RecordedRequest>>,
    page_size: usize,
    no_changes: AtomicBool,
    event_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self {
            stacks: DashMap::new(),
            streams: DashMap::new(),
            resources: DashMap::new(),
            outputs: DashMap::new(),
            failures: DashMap::new(),
            requests: Mutex::new(Vec::new()),
            page_size: 100,
            no_changes: AtomicBool::new(false),
            event_calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Limit the number of events per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Register an existing stack.
    pub fn add_stack(&self, summary: StackSummary) {
        self.stacks.insert(summary.name.clone(), summary);
    }

    /// Make events visible immediately (pre-existing history).
    pub fn push_events(&self, stack: &str, events: Vec<StackEvent>) {
        self.streams
            .entry(stack.to_string())
            .or_default()
            .visible
            .extend(events);
    }

    /// Queue batches; each first-page listing of `stack` releases one.
    pub fn script_events(&self, stack: &str, batches: Vec<Vec<StackEvent>>) {
        self.streams
            .entry(stack.to_string())
            .or_default()
            .pending
            .extend(batches);
    }

    /// Fail the next event listing of `stack` with `error`.
    pub fn fail_next(&self, stack: &str, error: ServiceError) {
        self.failures
            .entry(stack.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn set_resources(&self, stack: &str, resources: Vec<StackResource>) {
        self.resources.insert(stack.to_string(), resources);
    }

    pub fn set_outputs(&self, stack: &str, outputs: Vec<StackOutput>) {
        self.outputs.insert(stack.to_string(), outputs);
    }

    /// Reject updates as having nothing to change.
    pub fn reject_updates_as_unchanged(&self, reject: bool) {
        self.no_changes.store(reject, Ordering::SeqCst);
    }

    /// Mutating requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of event listing calls made.
    pub fn event_calls(&self) -> usize {
        self.event_calls.load(Ordering::SeqCst)
    }

    fn record(&self, request: RecordedRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }

    fn find(&self, stack: &str) -> Option<StackSummary> {
        if let Some(summary) = self.stacks.get(stack) {
            return Some(summary.clone());
        }
        self.stacks
            .iter()
            .find(|entry| entry.id.as_deref() == Some(stack))
            .map(|entry| entry.clone())
    }

    fn missing(stack: &str) -> ServiceError {
        ServiceError::Validation(format!("Stack with id {stack} does not exist"))
    }
}

impl Default for InMemoryOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrchestrationClient for InMemoryOrchestrator {
    async fn describe_stack(&self, stack: &str) -> ServiceResult<Option<StackSummary>> {
        Ok(self.find(stack))
    }

    async fn list_stacks(&self) -> ServiceResult<Vec<StackSummary>> {
        let mut stacks: Vec<StackSummary> = self.stacks.iter().map(|s| s.clone()).collect();
        stacks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stacks)
    }

    async fn create_stack(&self, request: &StackRequest) -> ServiceResult<String> {
        if self.stacks.contains_key(&request.name) {
            return Err(ServiceError::Validation(format!(
                "Stack [{}] already exists",
                request.name
            )));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!(
            "arn:aws:cloudformation:us-east-1:000000000000:stack/{}/{n}",
            request.name
        );
        self.stacks.insert(
            request.name.clone(),
            StackSummary {
                name: request.name.clone(),
                id: Some(id.clone()),
                status: "CREATE_IN_PROGRESS".into(),
                status_reason: None,
            },
        );
        self.record(RecordedRequest::Create(request.clone()));
        Ok(id)
    }

    async fn update_stack(&self, request: &StackRequest) -> ServiceResult<String> {
        let Some(mut summary) = self.stacks.get_mut(&request.name) else {
            return Err(Self::missing(&request.name));
        };
        if self.no_changes.load(Ordering::SeqCst) {
            return Err(ServiceError::Validation(
                "No updates are to be performed.".into(),
            ));
        }
        summary.status = "UPDATE_IN_PROGRESS".into();
        let id = summary.id.clone().unwrap_or_else(|| request.name.clone());
        drop(summary);
        self.record(RecordedRequest::Update(request.clone()));
        Ok(id)
    }

    async fn delete_stack(&self, stack: &str) -> ServiceResult<()> {
        if let Some(summary) = self.find(stack) {
            self.stacks.remove(&summary.name);
        }
        self.record(RecordedRequest::Delete(stack.to_string()));
        Ok(())
    }

    async fn list_events(
        &self,
        stack: &str,
        next_token: Option<&str>,
    ) -> ServiceResult<EventPage> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(mut queue) = self.failures.get_mut(stack) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }

        let Some(mut stream) = self.streams.get_mut(stack) else {
            return match self.find(stack) {
                Some(_) => Ok(EventPage::default()),
                None => Err(Self::missing(stack)),
            };
        };

        if next_token.is_none() {
            if let Some(batch) = stream.pending.pop_front() {
                stream.visible.extend(batch);
            }
        }

        let offset: usize = next_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let events: Vec<StackEvent> = stream
            .visible
            .iter()
            .rev()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let end = offset + events.len();
        let next_token = (end < stream.visible.len()).then(|| end.to_string());

        Ok(EventPage { events, next_token })
    }

    async fn list_resources(&self, stack: &str) -> ServiceResult<Vec<StackResource>> {
        match self.resources.get(stack) {
            Some(resources) => Ok(resources.clone()),
            None if self.find(stack).is_some() => Ok(Vec::new()),
            None => Err(Self::missing(stack)),
        }
    }

    async fn outputs(&self, stack: &str) -> ServiceResult<Vec<StackOutput>> {
        match self.outputs.get(stack) {
            Some(outputs) => Ok(outputs.clone()),
            None if self.find(stack).is_some() => Ok(Vec::new()),
            None => Err(Self::missing(stack)),
        }
    }
}

/// In-memory scaling service
///
/// New instances start `Pending` and removed ones `Terminating`; each
/// describe call returns the current state and then moves every instance
/// one step along.
pub struct InMemoryScaling {
    groups: DashMap<String, GroupState>,
    history: Mutex<Vec<(String, i32)>>,
    next_id: AtomicUsize,
}

impl InMemoryScaling {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
            history: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Add a group with `size` instances in service.
    pub fn add_group(&self, name: &str, size: usize) {
        let instances = (0..size).map(|_| self.instance("InService")).collect();
        self.groups.insert(
            name.to_string(),
            GroupState {
                name: name.to_string(),
                desired_capacity: size as i32,
                instances,
            },
        );
    }

    /// Desired capacity changes received so far.
    pub fn capacity_history(&self) -> Vec<(String, i32)> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    pub fn instance_ids(&self, name: &str) -> Vec<String> {
        self.groups
            .get(name)
            .map(|g| g.instances.iter().map(|i| i.id.clone()).collect())
            .unwrap_or_default()
    }

    fn instance(&self, state: &str) -> InstanceState {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        InstanceState {
            id: format!("i-{n:08x}"),
            lifecycle_state: state.to_string(),
        }
    }

    fn not_found(name: &str) -> ServiceError {
        ServiceError::Validation(format!("AutoScalingGroup name not found - {name}"))
    }
}

impl Default for InMemoryScaling {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScalingClient for InMemoryScaling {
    async fn describe_group(&self, name: &str) -> ServiceResult<GroupState> {
        let mut group = self.groups.get_mut(name).ok_or_else(|| Self::not_found(name))?;
        let snapshot = group.clone();
        group.instances.retain(|i| i.lifecycle_state != "Terminating");
        for instance in group.instances.iter_mut() {
            if instance.lifecycle_state == "Pending" {
                instance.lifecycle_state = GroupState::IN_SERVICE.to_string();
            }
        }
        Ok(snapshot)
    }

    async fn set_desired_capacity(&self, name: &str, desired: i32) -> ServiceResult<()> {
        let mut group = self.groups.get_mut(name).ok_or_else(|| Self::not_found(name))?;
        group.desired_capacity = desired;
        let target = desired.max(0) as usize;
        let live = group
            .instances
            .iter()
            .filter(|i| i.lifecycle_state != "Terminating")
            .count();
        if target > live {
            for _ in live..target {
                let instance = self.instance("Pending");
                group.instances.push(instance);
            }
        } else {
            let mut excess = live - target;
            for instance in group.instances.iter_mut() {
                if excess == 0 {
                    break;
                }
                if instance.lifecycle_state != "Terminating" {
                    instance.lifecycle_state = "Terminating".into();
                    excess -= 1;
                }
            }
        }
        drop(group);
        if let Ok(mut history) = self.history.lock() {
            history.push((name.to_string(), desired));
        }
        Ok(())
    }
}

/// In-memory CDN
///
/// Invalidations stay `InProgress` for a configurable number of status
/// checks.
pub struct InMemoryCdn {
    distributions: DashMap<String, Vec<String>>,
    invalidations: DashMap<String, usize>,
    created: Mutex<Vec<(String, Vec<String>)>>,
    polls_until_complete: usize,
    next_id: AtomicUsize,
}

impl InMemoryCdn {
    pub fn new(polls_until_complete: usize) -> Self {
        Self {
            distributions: DashMap::new(),
            invalidations: DashMap::new(),
            created: Mutex::new(Vec::new()),
            polls_until_complete,
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn add_distribution(&self, id: &str, aliases: &[&str]) {
        self.distributions.insert(
            id.to_string(),
            aliases.iter().map(|a| a.to_string()).collect(),
        );
    }

    /// Invalidations created so far, as (distribution, paths).
    pub fn created(&self) -> Vec<(String, Vec<String>)> {
        self.created
            .lock()
            .map(|created| created.clone())
            .unwrap_or_default()
    }

    fn check(&self, distribution: &str) -> ServiceResult<()> {
        if self.distributions.contains_key(distribution) {
            Ok(())
        } else {
            Err(ServiceError::Other(format!(
                "NoSuchDistribution: {distribution}"
            )))
        }
    }
}

impl Default for InMemoryCdn {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl CdnClient for InMemoryCdn {
    async fn aliases(&self, distribution: &str) -> ServiceResult<Vec<String>> {
        self.check(distribution)?;
        Ok(self
            .distributions
            .get(distribution)
            .map(|a| a.clone())
            .unwrap_or_default())
    }

    async fn create_invalidation(
        &self,
        distribution: &str,
        paths: &[String],
        _caller_reference: &str,
    ) -> ServiceResult<Invalidation> {
        self.check(distribution)?;
        let id = format!("I{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.invalidations.insert(id.clone(), self.polls_until_complete);
        if let Ok(mut created) = self.created.lock() {
            created.push((distribution.to_string(), paths.to_vec()));
        }
        Ok(Invalidation {
            id,
            status: Invalidation::IN_PROGRESS.into(),
        })
    }

    async fn get_invalidation(&self, distribution: &str, id: &str) -> ServiceResult<Invalidation> {
        self.check(distribution)?;
        let mut remaining = self
            .invalidations
            .get_mut(id)
            .ok_or_else(|| ServiceError::Other(format!("NoSuchInvalidation: {id}")))?;
        let status = if *remaining == 0 {
            "Completed"
        } else {
            *remaining -= 1;
            Invalidation::IN_PROGRESS
        };
        Ok(Invalidation {
            id: id.to_string(),
            status: status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(id: &str) -> StackEvent {
        StackEvent {
            event_id: id.into(),
            stack_id: "arn:stack/web/1".into(),
            stack_name: "web".into(),
            timestamp: Utc::now(),
            resource_type: "AWS::EC2::Subnet".into(),
            logical_id: "Subnet".into(),
            physical_id: None,
            status: "CREATE_IN_PROGRESS".into(),
            status_reason: None,
        }
    }

    #[tokio::test]
    async fn test_event_pages_newest_first() {
        let orchestrator = InMemoryOrchestrator::new().with_page_size(2);
        orchestrator.push_events("web", vec![event("e1"), event("e2"), event("e3")]);

        let first = orchestrator.list_events("web", None).await.unwrap();
        let ids: Vec<_> = first.events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["e3", "e2"]);

        let token = first.next_token.unwrap();
        let second = orchestrator.list_events("web", Some(&token)).await.unwrap();
        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0].event_id, "e1");
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_unknown_stack_is_not_found() {
        let orchestrator = InMemoryOrchestrator::new();
        let err = orchestrator.list_events("ghost", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_scaling_instances_settle_after_describe() {
        let scaling = InMemoryScaling::new();
        scaling.add_group("web", 1);
        scaling.set_desired_capacity("web", 2).await.unwrap();

        let first = scaling.describe_group("web").await.unwrap();
        assert!(!first.is_settled_at(2));
        let second = scaling.describe_group("web").await.unwrap();
        assert!(second.is_settled_at(2));
    }

    #[tokio::test]
    async fn test_invalidation_completes_after_polls() {
        let cdn = InMemoryCdn::new(1);
        cdn.add_distribution("E1", &["www.example.com"]);
        let inv = cdn
            .create_invalidation("E1", &["/*".to_string()], "ref")
            .await
            .unwrap();
        assert!(inv.is_in_progress());
        assert!(cdn.get_invalidation("E1", &inv.id).await.unwrap().is_in_progress());
        assert!(!cdn.get_invalidation("E1", &inv.id).await.unwrap().is_in_progress());
    }
}
