//! Deployment controller
//!
//! Decides between creating and updating a stack, uploads the compiled
//! template and submits it by reference.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stackforge_compiler::Compiler;
use stackforge_store::{artifact_name, ArtifactStore};
use stackforge_types::{ParameterBindings, StackOutput, StackResource, StackSummary};
use tracing::{info, instrument};

use crate::client::{OrchestrationClient, StackRequest};
use crate::error::{DeployError, Result};

/// What a deploy call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployAction {
    Created,
    Updated,
    /// The service reported nothing to update.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOutcome {
    pub action: DeployAction,
    /// Stack id, when the service returned one.
    pub stack_id: Option<String>,
    /// Where the submitted template was stored.
    pub template_url: String,
}

/// Deployment controller
pub struct DeploymentController {
    client: Arc<dyn OrchestrationClient>,
    compiler: Arc<Compiler>,
}

impl DeploymentController {
    pub fn new(client: Arc<dyn OrchestrationClient>, compiler: Arc<Compiler>) -> Self {
        Self { client, compiler }
    }

    pub fn client(&self) -> &Arc<dyn OrchestrationClient> {
        &self.client
    }

    fn store(&self) -> &ArtifactStore {
        self.compiler.store()
    }

    /// Compile the template at `path` against `bindings` and deploy it.
    #[instrument(skip(self, path, bindings), fields(path = %path.display()))]
    pub async fn deploy_template(
        &self,
        stack: &str,
        path: &Path,
        bindings: &ParameterBindings,
    ) -> Result<DeployOutcome> {
        let template = self.compiler.compile_to_yaml(path, Some(bindings)).await?;
        self.deploy(stack, &template, bindings).await
    }

    /// Deploy compiled template text as `stack`.
    ///
    /// New stacks are created without automatic rollback so that a failed
    /// stack stays around for inspection.
    #[instrument(skip(self, template, bindings), fields(size = template.len()))]
    pub async fn deploy(
        &self,
        stack: &str,
        template: &str,
        bindings: &ParameterBindings,
    ) -> Result<DeployOutcome> {
        let locator = self
            .store()
            .upload(&artifact_name("yaml"), template.as_bytes(), "text/yaml", false)
            .await?;
        let request = StackRequest {
            name: stack.to_string(),
            template_url: locator.url.clone(),
            parameters: bindings.clone(),
        };

        if self.exists(stack).await? {
            info!(stack = %stack, "Updating existing stack");
            match self.client.update_stack(&request).await {
                Ok(id) => Ok(DeployOutcome {
                    action: DeployAction::Updated,
                    stack_id: Some(id),
                    template_url: locator.url,
                }),
                Err(err) if err.is_no_op_update() => {
                    info!(stack = %stack, "No changes to deploy");
                    Ok(DeployOutcome {
                        action: DeployAction::Unchanged,
                        stack_id: None,
                        template_url: locator.url,
                    })
                }
                Err(err) => Err(DeployError::from_service(err, stack)),
            }
        } else {
            info!(stack = %stack, "Creating stack");
            let id = self
                .client
                .create_stack(&request)
                .await
                .map_err(|e| DeployError::from_service(e, stack))?;
            Ok(DeployOutcome {
                action: DeployAction::Created,
                stack_id: Some(id),
                template_url: locator.url,
            })
        }
    }

    pub async fn exists(&self, stack: &str) -> Result<bool> {
        Ok(self.describe(stack).await?.is_some())
    }

    pub async fn describe(&self, stack: &str) -> Result<Option<StackSummary>> {
        self.client
            .describe_stack(stack)
            .await
            .map_err(|e| DeployError::from_service(e, stack))
    }

    /// Describe a stack that must exist.
    pub async fn status(&self, stack: &str) -> Result<StackSummary> {
        self.describe(stack)
            .await?
            .ok_or_else(|| DeployError::NotFound {
                stack: stack.to_string(),
            })
    }

    pub async fn list(&self) -> Result<Vec<StackSummary>> {
        self.client
            .list_stacks()
            .await
            .map_err(|e| DeployError::from_service(e, "*"))
    }

    /// Delete a stack. Returns its id, which stays valid for event
    /// listing after the name is gone.
    #[instrument(skip(self))]
    pub async fn delete(&self, stack: &str) -> Result<String> {
        let summary = self.status(stack).await?;
        info!(stack = %stack, "Deleting stack");
        self.client
            .delete_stack(stack)
            .await
            .map_err(|e| DeployError::from_service(e, stack))?;
        Ok(summary.id.unwrap_or_else(|| stack.to_string()))
    }

    pub async fn resources(&self, stack: &str) -> Result<Vec<StackResource>> {
        self.client
            .list_resources(stack)
            .await
            .map_err(|e| DeployError::from_service(e, stack))
    }

    pub async fn outputs(&self, stack: &str) -> Result<Vec<StackOutput>> {
        self.client
            .outputs(stack)
            .await
            .map_err(|e| DeployError::from_service(e, stack))
    }
}
