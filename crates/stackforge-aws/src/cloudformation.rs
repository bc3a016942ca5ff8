//! CloudFormation orchestration client

use async_trait::async_trait;
use aws_sdk_cloudformation::types::{
    Capability, OnFailure, Output, Parameter, Stack, StackEvent as SdkEvent,
    StackResourceSummary, StackSummary as SdkSummary,
};
use aws_sdk_cloudformation::Client;
use stackforge_deploy::{EventPage, OrchestrationClient, ServiceError, StackRequest};
use stackforge_types::{ParameterBindings, StackEvent, StackOutput, StackResource, StackSummary};
use tracing::debug;

use crate::shape::{classify, items, stamp, text, text_or_empty};

type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// CloudFormation implementation of [`OrchestrationClient`].
#[derive(Debug, Clone)]
pub struct CloudFormationClient {
    client: Client,
}

impl CloudFormationClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn describe(&self, stack: &str) -> ServiceResult<Option<Stack>> {
        match self.client.describe_stacks().stack_name(stack).send().await {
            Ok(out) => Ok(items(out.stacks()).first().cloned()),
            Err(err) => {
                let err = classify(err);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }
}

fn parameters(bindings: &ParameterBindings) -> Vec<Parameter> {
    bindings
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn summary(stack: &Stack) -> StackSummary {
    StackSummary {
        name: text_or_empty(stack.stack_name()),
        id: text(stack.stack_id()),
        status: text_or_empty(stack.stack_status()),
        status_reason: text(stack.stack_status_reason()),
    }
}

fn listed(stack: &SdkSummary) -> StackSummary {
    StackSummary {
        name: text_or_empty(stack.stack_name()),
        id: text(stack.stack_id()),
        status: text_or_empty(stack.stack_status()),
        status_reason: text(stack.stack_status_reason()),
    }
}

fn event(event: &SdkEvent) -> StackEvent {
    StackEvent {
        event_id: text_or_empty(event.event_id()),
        stack_id: text_or_empty(event.stack_id()),
        stack_name: text_or_empty(event.stack_name()),
        timestamp: stamp(event.timestamp()),
        resource_type: text_or_empty(event.resource_type()),
        logical_id: text_or_empty(event.logical_resource_id()),
        physical_id: text(event.physical_resource_id()),
        status: text_or_empty(event.resource_status()),
        status_reason: text(event.resource_status_reason()),
    }
}

fn resource(resource: &StackResourceSummary) -> StackResource {
    StackResource {
        logical_id: text_or_empty(resource.logical_resource_id()),
        physical_id: text(resource.physical_resource_id()),
        resource_type: text_or_empty(resource.resource_type()),
        status: text_or_empty(resource.resource_status()),
    }
}

fn output(output: &Output) -> StackOutput {
    StackOutput {
        key: text_or_empty(output.output_key()),
        value: text_or_empty(output.output_value()),
        description: text(output.description()),
    }
}

fn missing(stack: &str) -> ServiceError {
    ServiceError::Validation(format!("Stack with id {stack} does not exist"))
}

#[async_trait]
impl OrchestrationClient for CloudFormationClient {
    async fn describe_stack(&self, stack: &str) -> ServiceResult<Option<StackSummary>> {
        Ok(self.describe(stack).await?.as_ref().map(summary))
    }

    async fn list_stacks(&self) -> ServiceResult<Vec<StackSummary>> {
        let mut stacks = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .client
                .list_stacks()
                .set_next_token(token.take())
                .send()
                .await
                .map_err(classify)?;
            stacks.extend(
                items(out.stack_summaries())
                    .iter()
                    .filter(|s| text(s.stack_status()).as_deref() != Some("DELETE_COMPLETE"))
                    .map(listed),
            );
            match out.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(stacks)
    }

    async fn create_stack(&self, request: &StackRequest) -> ServiceResult<String> {
        debug!(stack = %request.name, url = %request.template_url, "CreateStack");
        let out = self
            .client
            .create_stack()
            .stack_name(&request.name)
            .template_url(&request.template_url)
            .set_parameters(Some(parameters(&request.parameters)))
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .on_failure(OnFailure::DoNothing)
            .send()
            .await
            .map_err(classify)?;
        Ok(text(out.stack_id()).unwrap_or_else(|| request.name.clone()))
    }

    async fn update_stack(&self, request: &StackRequest) -> ServiceResult<String> {
        debug!(stack = %request.name, url = %request.template_url, "UpdateStack");
        let out = self
            .client
            .update_stack()
            .stack_name(&request.name)
            .template_url(&request.template_url)
            .set_parameters(Some(parameters(&request.parameters)))
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
            .map_err(classify)?;
        Ok(text(out.stack_id()).unwrap_or_else(|| request.name.clone()))
    }

    async fn delete_stack(&self, stack: &str) -> ServiceResult<()> {
        self.client
            .delete_stack()
            .stack_name(stack)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_events(
        &self,
        stack: &str,
        next_token: Option<&str>,
    ) -> ServiceResult<EventPage> {
        let out = self
            .client
            .describe_stack_events()
            .stack_name(stack)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(classify)?;
        Ok(EventPage {
            events: items(out.stack_events()).iter().map(event).collect(),
            next_token: out.next_token().map(str::to_string),
        })
    }

    async fn list_resources(&self, stack: &str) -> ServiceResult<Vec<StackResource>> {
        let mut resources = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .client
                .list_stack_resources()
                .stack_name(stack)
                .set_next_token(token.take())
                .send()
                .await
                .map_err(classify)?;
            resources.extend(items(out.stack_resource_summaries()).iter().map(resource));
            match out.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }

    async fn outputs(&self, stack: &str) -> ServiceResult<Vec<StackOutput>> {
        let described = self.describe(stack).await?.ok_or_else(|| missing(stack))?;
        Ok(items(described.outputs()).iter().map(output).collect())
    }
}
