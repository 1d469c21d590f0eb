//! # S3 media store
//!
//! `ObjectStore` backed by an S3 bucket. The returned URL is the configured
//! public base joined with the object key; access control on the bucket is
//! outside this adapter.

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use domains::{ObjectStore, StoreError};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible storage (MinIO, LocalStack).
    pub endpoint: Option<String>,
    /// Prefix of the URL handed back to clients, e.g. `https://bucket.s3.amazonaws.com`.
    pub public_base_url: String,
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    /// Resolves credentials from the default provider chain.
    pub async fn new(options: S3Options) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::from_client(
            Client::from_conf(builder.build()),
            options.bucket,
            options.public_base_url,
        )
    }

    pub fn from_client(client: Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &mime::Mime,
    ) -> Result<String, StoreError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type.as_ref())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::unavailable(format!("s3 put {key}: {}", DisplayErrorContext(&e))))?;

        debug!(key, bytes = size, bucket = %self.bucket, "media stored in s3");
        Ok(self.object_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> Client {
        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        Client::from_conf(conf)
    }

    #[test]
    fn url_joins_base_and_key() {
        let store = S3ObjectStore::from_client(
            offline_client(),
            "media".into(),
            "https://media.example.com/".into(),
        );
        assert_eq!(store.object_url("abc"), "https://media.example.com/abc");
    }
}
