//! Explicit AWS context
//!
//! Region, profile and SDK configuration are resolved once and every
//! client is built from the same context.

use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_cloudformation::config::Region;
use stackforge_store::StoreConfig;
use tracing::debug;

use crate::autoscaling::AutoScalingClient;
use crate::cloudformation::CloudFormationClient;
use crate::cloudfront::CloudFrontClient;
use crate::s3::S3Backend;

/// Resolved AWS settings shared by all clients.
#[derive(Clone)]
pub struct AwsContext {
    region: String,
    profile: String,
    sdk: Arc<SdkConfig>,
}

impl AwsContext {
    /// Load SDK configuration for `region` using credentials of `profile`.
    pub async fn load(region: impl Into<String>, profile: impl Into<String>) -> Self {
        let region = region.into();
        let profile = profile.into();
        debug!(region = %region, profile = %profile, "Loading AWS configuration");
        let sdk = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .profile_name(&profile)
            .load()
            .await;
        Self {
            region,
            profile,
            sdk: Arc::new(sdk),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk
    }

    pub fn cloudformation(&self) -> CloudFormationClient {
        CloudFormationClient::new(aws_sdk_cloudformation::Client::new(&self.sdk))
    }

    /// Artifact backend. The bucket is looked up or created on first use.
    pub fn s3(&self, config: StoreConfig) -> S3Backend {
        S3Backend::new(aws_sdk_s3::Client::new(&self.sdk), &self.region, config)
    }

    pub fn autoscaling(&self) -> AutoScalingClient {
        AutoScalingClient::new(aws_sdk_autoscaling::Client::new(&self.sdk))
    }

    pub fn cloudfront(&self) -> CloudFrontClient {
        CloudFrontClient::new(aws_sdk_cloudfront::Client::new(&self.sdk))
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}
