//! Auto Scaling client

use async_trait::async_trait;
use aws_sdk_autoscaling::types::AutoScalingGroup;
use aws_sdk_autoscaling::Client;
use stackforge_deploy::{GroupState, InstanceState, ScalingClient, ServiceError};

use crate::shape::{classify, count, items, text_or_empty};

type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Auto Scaling implementation of [`ScalingClient`].
#[derive(Debug, Clone)]
pub struct AutoScalingClient {
    client: Client,
}

impl AutoScalingClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn group_state(group: &AutoScalingGroup) -> GroupState {
    GroupState {
        name: text_or_empty(group.auto_scaling_group_name()),
        desired_capacity: count(group.desired_capacity()).unwrap_or(0),
        instances: items(group.instances())
            .iter()
            .map(|instance| InstanceState {
                id: text_or_empty(instance.instance_id()),
                lifecycle_state: text_or_empty(instance.lifecycle_state()),
            })
            .collect(),
    }
}

#[async_trait]
impl ScalingClient for AutoScalingClient {
    async fn describe_group(&self, name: &str) -> ServiceResult<GroupState> {
        let out = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(name)
            .send()
            .await
            .map_err(classify)?;
        items(out.auto_scaling_groups())
            .first()
            .map(group_state)
            .ok_or_else(|| {
                ServiceError::Validation(format!("AutoScalingGroup name not found - {name}"))
            })
    }

    async fn set_desired_capacity(&self, name: &str, desired: i32) -> ServiceResult<()> {
        self.client
            .set_desired_capacity()
            .auto_scaling_group_name(name)
            .desired_capacity(desired)
            .honor_cooldown(false)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}
