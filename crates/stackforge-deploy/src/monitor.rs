//! Stack event monitor
//!
//! Follows the event stream of one stack and of every nested stack found
//! while doing so. Each round lists events of all known streams
//! concurrently, stops paging a stream at the first event already seen,
//! and hands the new events to an [`EventSink`] in chronological order.
//! The loop ends when the root stack's own newest event carries a
//! terminal status.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use stackforge_types::{is_failed_outcome, is_terminal_status, StackEvent};
use tracing::{debug, info, instrument, warn};

use crate::client::{EventPage, OrchestrationClient};
use crate::config::MonitorConfig;
use crate::error::{DeployError, Result, ServiceError};
use crate::sink::{EventSink, NullSink};

/// How a monitoring run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorOutcome {
    /// The root stack reached a successful terminal status.
    Completed { status: String },
    /// The root stack ended failed or rolled back.
    Failed { status: String },
    /// Monitoring was interrupted before the stack settled.
    Interrupted,
}

impl MonitorOutcome {
    fn from_status(status: String) -> Self {
        if is_failed_outcome(&status) {
            MonitorOutcome::Failed { status }
        } else {
            MonitorOutcome::Completed { status }
        }
    }

    /// Whether the caller should report success.
    pub fn is_success(&self) -> bool {
        !matches!(self, MonitorOutcome::Failed { .. })
    }
}

/// Event monitor for one root stack.
///
/// The seen-event set and nested stack map belong to this instance only.
pub struct EventMonitor {
    client: Arc<dyn OrchestrationClient>,
    stack: String,
    config: MonitorConfig,
    seen: HashSet<String>,
    /// Nested stack physical id -> logical name in its parent.
    nested: HashMap<String, String>,
    last_call: HashMap<String, Instant>,
}

impl EventMonitor {
    /// Monitor `stack`, given by name or by id.
    pub fn new(client: Arc<dyn OrchestrationClient>, stack: impl Into<String>) -> Self {
        Self::with_config(client, stack, MonitorConfig::default())
    }

    pub fn with_config(
        client: Arc<dyn OrchestrationClient>,
        stack: impl Into<String>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            client,
            stack: stack.into(),
            config,
            seen: HashSet::new(),
            nested: HashMap::new(),
            last_call: HashMap::new(),
        }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Nested stacks discovered so far, as (physical id, logical name).
    pub fn nested_stacks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nested.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Mark every existing event as seen without emitting anything.
    ///
    /// Rounds are repeated until no further nested stack shows up, so
    /// that nested stacks created before monitoring started are followed
    /// too.
    #[instrument(skip(self), fields(stack = %self.stack))]
    pub async fn prime(&mut self) -> Result<()> {
        let mut sink = NullSink;
        loop {
            let known = self.nested.len();
            self.round(None, &mut sink).await?;
            if self.nested.len() == known {
                break;
            }
        }
        debug!(seen = self.seen.len(), nested = self.nested.len(), "Primed event history");
        Ok(())
    }

    /// Poll until the root stack reaches a terminal status.
    pub async fn run(
        &mut self,
        since: Option<DateTime<Utc>>,
        sink: &mut dyn EventSink,
    ) -> Result<MonitorOutcome> {
        self.run_until(since, sink, std::future::pending()).await
    }

    /// Poll until the root stack reaches a terminal status or `shutdown`
    /// resolves, whichever comes first.
    ///
    /// Events older than `since` are recorded as seen but not emitted,
    /// and do not end the loop.
    #[instrument(skip(self, sink, shutdown), fields(stack = %self.stack))]
    pub async fn run_until<F>(
        &mut self,
        since: Option<DateTime<Utc>>,
        sink: &mut dyn EventSink,
        shutdown: F,
    ) -> Result<MonitorOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Monitoring interrupted");
                    return Ok(MonitorOutcome::Interrupted);
                }
                round = self.round(since, &mut *sink) => {
                    if let Some(status) = round? {
                        info!(status = %status, "Stack reached terminal status");
                        return Ok(MonitorOutcome::from_status(status));
                    }
                }
            }
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Monitoring interrupted");
                    return Ok(MonitorOutcome::Interrupted);
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// One polling round over the root and all known nested streams.
    ///
    /// Returns the terminal status of the root stack if its newest
    /// visible self-event carries one.
    async fn round(
        &mut self,
        since: Option<DateTime<Utc>>,
        sink: &mut dyn EventSink,
    ) -> Result<Option<String>> {
        let mut targets = vec![self.stack.clone()];
        targets.extend(self.nested.keys().cloned());

        let now = Instant::now();
        let waits: Vec<Duration> = targets.iter().map(|t| self.pace_wait(t, now)).collect();
        let results = join_all(
            targets
                .iter()
                .zip(waits)
                .map(|(target, wait)| self.fetch_new(target, wait)),
        )
        .await;

        let finished = Instant::now();
        for target in &targets {
            self.last_call.insert(target.clone(), finished);
        }

        let mut latest_root: Option<String> = None;
        for (target, result) in targets.iter().zip(results) {
            let from_root = *target == self.stack;
            let events = match result {
                Ok(events) => events,
                Err(err) if err.is_not_found() && !from_root => {
                    debug!(nested = %target, "Nested stack not available yet");
                    continue;
                }
                Err(err) => return Err(DeployError::from_service(err, &self.stack)),
            };

            for event in events {
                if !self.seen.insert(event.event_id.clone()) {
                    continue;
                }
                self.discover(&event);

                if since.is_some_and(|cutoff| event.timestamp < cutoff) {
                    continue;
                }
                let prefix = self.nested.get(&event.stack_id).map(String::as_str);
                sink.emit(&event, prefix);

                if from_root && is_self_event(&event) {
                    latest_root = Some(event.status.clone());
                }
            }
        }

        Ok(latest_root.filter(|status| is_terminal_status(status)))
    }

    fn pace_wait(&self, target: &str, now: Instant) -> Duration {
        self.last_call
            .get(target)
            .map(|last| {
                self.config
                    .pace_interval
                    .saturating_sub(now.saturating_duration_since(*last))
            })
            .unwrap_or(Duration::ZERO)
    }

    fn discover(&mut self, event: &StackEvent) {
        if !event.is_stack_resource() || event.logical_id == self.stack || is_self_event(event) {
            return;
        }
        let Some(physical) = event.physical_id.as_deref().filter(|p| !p.is_empty()) else {
            return;
        };
        self.nested
            .entry(physical.to_string())
            .or_insert_with(|| {
                debug!(nested = %event.logical_id, physical = %physical, "Discovered nested stack");
                event.logical_id.clone()
            });
    }

    /// New events of one stream, oldest first.
    ///
    /// Follow-up pages of the same stream are paced like separate calls.
    async fn fetch_new(
        &self,
        target: &str,
        wait: Duration,
    ) -> std::result::Result<Vec<StackEvent>, ServiceError> {
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        let mut fresh = Vec::new();
        let mut token: Option<String> = None;
        'pages: loop {
            let page = self.list_page(target, token.as_deref()).await?;
            for event in page.events {
                if self.seen.contains(&event.event_id) {
                    break 'pages;
                }
                fresh.push(event);
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
            if !self.config.pace_interval.is_zero() {
                tokio::time::sleep(self.config.pace_interval).await;
            }
        }
        fresh.reverse();
        Ok(fresh)
    }

    async fn list_page(
        &self,
        target: &str,
        token: Option<&str>,
    ) -> std::result::Result<EventPage, ServiceError> {
        let mut timeouts = 0u32;
        loop {
            match self.client.list_events(target, token).await {
                Ok(page) => return Ok(page),
                Err(ServiceError::Throttled(msg)) => {
                    debug!(stack = %target, reason = %msg, "Throttled, retrying");
                    tokio::time::sleep(self.config.throttle_delay).await;
                }
                Err(ServiceError::Network(msg)) => {
                    timeouts += 1;
                    if timeouts > self.config.max_timeouts {
                        return Err(ServiceError::Network(msg));
                    }
                    warn!(stack = %target, attempt = timeouts, reason = %msg, "Network error, retrying");
                    tokio::time::sleep(self.config.throttle_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// The event a stack emits about itself.
fn is_self_event(event: &StackEvent) -> bool {
    event.is_stack_resource() && event.physical_id.as_deref() == Some(event.stack_id.as_str())
}
