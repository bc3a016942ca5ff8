//! Stackforge Deployment Engine
//!
//! Submits compiled templates to the orchestration service and follows
//! the resulting deployment to completion.
//!
//! ## Components
//!
//! - [`DeploymentController`]: create-or-update decision, template upload,
//!   service error translation
//! - [`EventMonitor`]: polls the event stream of a stack and of every
//!   nested stack discovered along the way, deduplicates events and
//!   detects when the root stack reaches a terminal status
//! - [`Fleet`]: bulk actions on stack resources (scaling groups, CDN
//!   distributions), fanned out one task per resource
//!
//! ## Architectural Boundaries
//!
//! All service access goes through the [`OrchestrationClient`],
//! [`ScalingClient`] and [`CdnClient`] traits. In-memory implementations
//! live in [`memory`]; AWS implementations live in `stackforge-aws`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod fleet;
pub mod memory;
pub mod monitor;
pub mod resources;
pub mod sink;

// Re-exports
pub use client::{
    CdnClient, EventPage, GroupState, InstanceState, Invalidation, OrchestrationClient,
    ScalingClient, StackRequest,
};
pub use config::{FleetConfig, MonitorConfig};
pub use controller::{DeployAction, DeployOutcome, DeploymentController};
pub use error::{DeployError, Result, ServiceError};
pub use fleet::{Fleet, InvalidationReport, RecycleReport};
pub use memory::{InMemoryCdn, InMemoryOrchestrator, InMemoryScaling, RecordedRequest};
pub use monitor::{EventMonitor, MonitorOutcome};
pub use resources::{Distribution, Invalidatable, ManagedResource, Scalable, ScalingGroup};
pub use sink::{format_event, ConsoleSink, EventSink, NullSink, RecordingSink};
