use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Parameters of one list call
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page as returned by the store, before any folder projection
#[derive(Debug, Clone, Default)]
pub struct RawListing {
    pub objects: Vec<RawObject>,
    pub common_prefixes: Vec<String>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_page(&self, bucket: &str, request: ListRequest) -> Result<RawListing>;
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream>;
    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
    async fn copy_object(&self, bucket: &str, source_key: &str, dest_key: &str) -> Result<()>;
    /// `false` for missing keys and for keys the store rejects as malformed
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;
    /// Zero-byte object whose key ends in the delimiter
    async fn create_folder_marker(&self, bucket: &str, key: &str) -> Result<()>;

    async fn list_buckets(&self) -> Result<Vec<String>>;
    async fn create_bucket(&self, bucket: &str) -> Result<()>;
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
    async fn is_bucket_empty(&self, bucket: &str) -> Result<bool> {
        let page = self
            .list_page(
                bucket,
                ListRequest {
                    max_keys: Some(1),
                    ..Default::default()
                },
            )
            .await?;
        Ok(page.objects.is_empty() && page.common_prefixes.is_empty())
    }
}

/// HEAD statuses that mean "nothing usable lives here"
pub fn is_absent_status(status: u16) -> bool {
    status == 404 || status == 400
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(&self, bucket: &str, request: ListRequest) -> Result<RawListing> {
        let res = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(request.prefix)
            .set_delimiter(request.delimiter)
            .set_continuation_token(request.continuation_token)
            .set_max_keys(request.max_keys)
            .send()
            .await?;

        let objects = res
            .contents()
            .iter()
            .filter_map(|object| {
                Some(RawObject {
                    key: object.key()?.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        let common_prefixes = res
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix().map(str::to_string))
            .collect();

        let next_token = if res.is_truncated().unwrap_or(false) {
            res.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(RawListing {
            objects,
            common_prefixes,
            next_token,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        let res = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(res.body)
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let content_length = data.len() as i64;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(content_length)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn copy_object(&self, bucket: &str, source_key: &str, dest_key: &str) -> Result<()> {
        let copy_source = format!(
            "{}/{}",
            bucket,
            utf8_percent_encode(source_key, COPY_SOURCE_ENCODE_SET)
        );
        let res = self
            .client
            .copy_object()
            .bucket(bucket)
            .copy_source(copy_source)
            .key(dest_key)
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 copy_object failed: source={}/{}, dest={}, error={:?}",
                bucket,
                source_key,
                dest_key,
                e
            );
            return Err(e.into());
        }
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        if key.is_empty() {
            return Ok(false);
        }

        let res = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                if status.is_some_and(is_absent_status) {
                    tracing::debug!("HEAD {} answered {:?}, treating as absent", key, status);
                    return Ok(false);
                }
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }

    async fn create_folder_marker(&self, bucket: &str, key: &str) -> Result<()> {
        let key = crate::utils::keys::normalize_prefix(key);
        self.put_object(bucket, &key, Vec::new()).await
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let res = self.client.list_buckets().send().await?;
        Ok(res
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.client.create_bucket().bucket(bucket).send().await?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.client.delete_bucket().bucket(bucket).send().await?;
        Ok(())
    }
}
