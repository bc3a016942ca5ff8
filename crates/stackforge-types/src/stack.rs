//! Records returned by the orchestration service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource type strings the engine treats specially.
pub mod resource_types {
    pub const STACK: &str = "AWS::CloudFormation::Stack";
    pub const LAMBDA_FUNCTION: &str = "AWS::Lambda::Function";
    pub const LAUNCH_CONFIGURATION: &str = "AWS::AutoScaling::LaunchConfiguration";
    pub const LAUNCH_TEMPLATE: &str = "AWS::EC2::LaunchTemplate";
    pub const AUTO_SCALING_GROUP: &str = "AWS::AutoScaling::AutoScalingGroup";
    pub const CLOUDFRONT_DISTRIBUTION: &str = "AWS::CloudFront::Distribution";
}

/// Whether a status string ends a stack operation.
pub fn is_terminal_status(status: &str) -> bool {
    status.ends_with("_COMPLETE") || status.ends_with("_FAILED")
}

/// Whether a terminal status means the operation did not succeed.
pub fn is_failed_outcome(status: &str) -> bool {
    status.ends_with("_FAILED") || status.contains("ROLLBACK")
}

/// One status transition of one resource within one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    /// Globally unique event id.
    pub event_id: String,
    /// Id (ARN) of the stack that produced the event.
    pub stack_id: String,
    /// Name of the stack that produced the event.
    pub stack_name: String,
    pub timestamp: DateTime<Utc>,
    pub resource_type: String,
    pub logical_id: String,
    pub physical_id: Option<String>,
    pub status: String,
    pub status_reason: Option<String>,
}

impl StackEvent {
    /// Whether the event describes a stack resource (root or nested).
    pub fn is_stack_resource(&self) -> bool {
        self.resource_type == resource_types::STACK
    }

    /// Whether the event's status ends an operation.
    pub fn is_terminal(&self) -> bool {
        is_terminal_status(&self.status)
    }

    /// Whether the event's status is a failure.
    pub fn is_failure(&self) -> bool {
        self.status.contains("_FAILED")
    }
}

/// Stack listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSummary {
    pub name: String,
    pub id: Option<String>,
    pub status: String,
    pub status_reason: Option<String>,
}

/// Resource owned by a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResource {
    pub logical_id: String,
    pub physical_id: Option<String>,
    pub resource_type: String,
    pub status: String,
}

/// Stack output value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}
