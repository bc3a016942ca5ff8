//! CloudFront client

use async_trait::async_trait;
use aws_sdk_cloudfront::types::{Invalidation as SdkInvalidation, InvalidationBatch, Paths};
use aws_sdk_cloudfront::Client;
use stackforge_deploy::{CdnClient, Invalidation, ServiceError};

use crate::shape::{classify, items, nested, text_or_empty};

type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// CloudFront implementation of [`CdnClient`].
#[derive(Debug, Clone)]
pub struct CloudFrontClient {
    client: Client,
}

impl CloudFrontClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn invalidation(inv: Option<&SdkInvalidation>, distribution: &str) -> ServiceResult<Invalidation> {
    let inv = inv.ok_or_else(|| {
        ServiceError::Other(format!("No invalidation returned for {distribution}"))
    })?;
    Ok(Invalidation {
        id: text_or_empty(inv.id()),
        status: text_or_empty(inv.status()),
    })
}

#[async_trait]
impl CdnClient for CloudFrontClient {
    async fn aliases(&self, distribution: &str) -> ServiceResult<Vec<String>> {
        let out = self
            .client
            .get_distribution()
            .id(distribution)
            .send()
            .await
            .map_err(classify)?;
        let aliases = nested(out.distribution())
            .and_then(|d| nested(d.distribution_config()))
            .and_then(|config| nested(config.aliases()))
            .map(|aliases| items(aliases.items()).to_vec())
            .unwrap_or_default();
        Ok(aliases)
    }

    async fn create_invalidation(
        &self,
        distribution: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> ServiceResult<Invalidation> {
        let paths = Paths::builder()
            .quantity(paths.len() as i32)
            .set_items(Some(paths.to_vec()))
            .build()
            .map_err(|e| ServiceError::Other(e.to_string()))?;
        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(caller_reference)
            .build()
            .map_err(|e| ServiceError::Other(e.to_string()))?;
        let out = self
            .client
            .create_invalidation()
            .distribution_id(distribution)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(classify)?;
        invalidation(nested(out.invalidation()), distribution)
    }

    async fn get_invalidation(&self, distribution: &str, id: &str) -> ServiceResult<Invalidation> {
        let out = self
            .client
            .get_invalidation()
            .distribution_id(distribution)
            .id(id)
            .send()
            .await
            .map_err(classify)?;
        invalidation(nested(out.invalidation()), distribution)
    }
}
