//! S3 artifact backend
//!
//! Artifacts go to one bucket per region named
//! `<bucket_prefix>-<random key>-<region>`. An existing bucket matching the
//! pattern is reused; otherwise one is created on first use.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl, StorageClass,
};
use aws_sdk_s3::Client;
use rand::Rng;
use regex::Regex;
use stackforge_store::{BlobBackend, BlobObject, Locator, Result, StoreConfig, StoreError};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::shape::{describe, items, nested, text};

const KEY_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const OWNER_ENFORCED: &str = "BucketOwnerEnforced";

#[derive(Debug, Clone)]
struct Bucket {
    name: String,
    /// Objects may carry a public-read ACL.
    acl_allowed: bool,
}

/// S3 implementation of [`BlobBackend`].
#[derive(Debug)]
pub struct S3Backend {
    client: Client,
    region: String,
    config: StoreConfig,
    bucket: OnceCell<Bucket>,
}

impl S3Backend {
    pub fn new(client: Client, region: impl Into<String>, config: StoreConfig) -> Self {
        Self {
            client,
            region: region.into(),
            config,
            bucket: OnceCell::new(),
        }
    }

    async fn bucket(&self) -> Result<&Bucket> {
        self.bucket.get_or_try_init(|| self.provision()).await
    }

    async fn provision(&self) -> Result<Bucket> {
        let listed = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| StoreError::Provisioning(describe(e)))?;
        let names: Vec<String> = items(listed.buckets())
            .iter()
            .filter_map(|b| text(b.name()))
            .collect();

        let name = match matching_bucket(&names, &self.config.bucket_prefix, &self.region)? {
            Some(existing) => {
                debug!(bucket = %existing, "Using existing artifact bucket");
                existing
            }
            None => self.create_bucket().await?,
        };
        let acl_allowed = self.acl_allowed(&name).await;
        Ok(Bucket { name, acl_allowed })
    }

    async fn create_bucket(&self) -> Result<String> {
        let name = format!(
            "{}-{}-{}",
            self.config.bucket_prefix,
            random_key(self.config.bucket_key_length),
            self.region
        );
        let mut request = self.client.create_bucket().bucket(&name);
        // us-east-1 rejects an explicit location constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| StoreError::Provisioning(describe(e)))?;
        info!(bucket = %name, "Created artifact bucket");
        Ok(name)
    }

    /// Buckets enforcing owner ownership reject object ACLs.
    async fn acl_allowed(&self, bucket: &str) -> bool {
        match self
            .client
            .get_bucket_ownership_controls()
            .bucket(bucket)
            .send()
            .await
        {
            Ok(out) => !nested(out.ownership_controls())
                .map(|controls| {
                    items(controls.rules())
                        .iter()
                        .any(|rule| text(rule.object_ownership()).as_deref() == Some(OWNER_ENFORCED))
                })
                .unwrap_or(false),
            // No ownership controls configured
            Err(_) => true,
        }
    }

    fn locator(&self, bucket: &str, key: &str) -> Locator {
        Locator {
            bucket: bucket.to_string(),
            key: key.to_string(),
            url: object_url(bucket, &self.region, key),
        }
    }
}

/// Public URL of an object.
pub fn object_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
}

fn matching_bucket(names: &[String], prefix: &str, region: &str) -> Result<Option<String>> {
    let pattern = Regex::new(&format!(
        r"^{}-(\w+)-{}$",
        regex::escape(prefix),
        regex::escape(region)
    ))
    .map_err(|e| StoreError::Provisioning(e.to_string()))?;
    Ok(names.iter().find(|n| pattern.is_match(n)).cloned())
}

fn random_key(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| KEY_CHARSET[rng.gen_range(0..KEY_CHARSET.len())] as char)
        .collect()
}

#[async_trait]
impl BlobBackend for S3Backend {
    async fn find(&self, prefix: &str) -> Result<Option<Locator>> {
        let bucket = self.bucket().await?;
        let out = self
            .client
            .list_objects_v2()
            .bucket(&bucket.name)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| StoreError::Backend(describe(e)))?;
        Ok(items(out.contents())
            .first()
            .and_then(|object| text(object.key()))
            .map(|key| self.locator(&bucket.name, &key)))
    }

    async fn put(&self, object: BlobObject) -> Result<Locator> {
        let bucket = self.bucket().await?;
        let mut request = self
            .client
            .put_object()
            .bucket(&bucket.name)
            .key(&object.key)
            .body(ByteStream::from(object.body.to_vec()))
            .content_type(&object.content_type)
            .set_content_encoding(object.content_encoding.clone())
            .content_disposition("attachment")
            .storage_class(StorageClass::ReducedRedundancy);
        if bucket.acl_allowed {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }
        request
            .send()
            .await
            .map_err(|e| StoreError::Backend(describe(e)))?;
        Ok(self.locator(&bucket.name, &object.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_bucket_matched_by_region() {
        let names = vec![
            "cf-templates-abc123-us-east-1".to_string(),
            "cf-templates-xyz789-eu-west-1".to_string(),
            "unrelated".to_string(),
        ];
        assert_eq!(
            matching_bucket(&names, "cf-templates", "eu-west-1").unwrap(),
            Some("cf-templates-xyz789-eu-west-1".to_string())
        );
        assert_eq!(matching_bucket(&names, "cf-templates", "ap-south-1").unwrap(), None);
    }

    #[test]
    fn test_random_key_shape() {
        let key = random_key(12);
        assert_eq!(key.len(), 12);
        assert!(key.bytes().all(|b| KEY_CHARSET.contains(&b)));
    }

    #[test]
    fn test_object_url() {
        assert_eq!(
            object_url("cf-templates-abc-us-west-1", "us-west-1", "cf-compiled/a/bc/abc/x.yaml"),
            "https://cf-templates-abc-us-west-1.s3.us-west-1.amazonaws.com/cf-compiled/a/bc/abc/x.yaml"
        );
    }
}
