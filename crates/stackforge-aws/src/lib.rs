//! Stackforge AWS bindings
//!
//! Implements the engine's service seams on top of the AWS SDK:
//!
//! - [`CloudFormationClient`]: `OrchestrationClient`
//! - [`S3Backend`]: `BlobBackend`, with lazy per-region bucket provisioning
//! - [`AutoScalingClient`]: `ScalingClient`
//! - [`CloudFrontClient`]: `CdnClient`
//!
//! Every client is built from one [`AwsContext`], resolved once at start
//! and passed explicitly.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod autoscaling;
pub mod cloudformation;
pub mod cloudfront;
pub mod context;
pub mod s3;
mod shape;

// Re-exports
pub use autoscaling::AutoScalingClient;
pub use cloudformation::CloudFormationClient;
pub use cloudfront::CloudFrontClient;
pub use context::AwsContext;
pub use s3::S3Backend;
