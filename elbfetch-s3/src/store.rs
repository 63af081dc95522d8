// Copyright 2025 Elbfetch Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! [`ObjectStore`] implementation on the AWS SDK.

use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::Object;
use aws_sdk_s3::Client as S3Client;
use elbfetch_core::store::{ObjectStore, StorageObject, StoreError};
use std::future::Future;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Keys returned per `ListObjectsV2` page at most.
pub const MAX_PAGE_KEYS: usize = 1000;

/// How a failed S3 call is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The bucket or key does not exist
    NotFound,
    /// Throttling or a transient service/network fault
    Retryable,
    /// Anything else (authorization, configuration, ...)
    Fatal,
}

/// Classifies an S3 error code.
#[must_use]
pub fn classify_code(code: Option<&str>) -> ErrorClass {
    match code {
        Some("NoSuchBucket" | "NoSuchKey" | "NotFound") => ErrorClass::NotFound,
        Some(
            "SlowDown" | "ServiceUnavailable" | "InternalError" | "RequestTimeout"
            | "Throttling" | "ThrottlingException",
        ) => ErrorClass::Retryable,
        _ => ErrorClass::Fatal,
    }
}

/// Converts an SDK error into a [`StoreError`].
///
/// `resource` names what was missing for [`StoreError::NotFound`]: the
/// bucket for listings, the key for downloads.
pub fn classify_s3_error<E, R>(resource: &str, error: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let class = match &error {
        // Network/connection errors
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorClass::Retryable,
        SdkError::ServiceError(service_err) => classify_code(service_err.err().code()),
        _ => ErrorClass::Fatal,
    };

    match class {
        ErrorClass::NotFound => {
            let message = error
                .as_service_error()
                .and_then(|e| e.message())
                .unwrap_or("resource does not exist")
                .to_string();
            StoreError::not_found(resource, message)
        }
        ErrorClass::Retryable => StoreError::transfer(error, true),
        ErrorClass::Fatal => StoreError::transfer(error, false),
    }
}

fn to_chrono(time: &aws_sdk_s3::primitives::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

/// Converts a listed object, skipping entries without key, size or time.
fn to_storage_object(object: &Object) -> Option<StorageObject> {
    let (Some(key), Some(size), Some(modified)) =
        (object.key(), object.size(), object.last_modified())
    else {
        return None;
    };
    let Some(last_modified) = to_chrono(modified) else {
        warn!(key, "Skipping object with out-of-range last-modified time");
        return None;
    };
    Some(StorageObject::new(
        key,
        last_modified,
        u64::try_from(size).unwrap_or(0),
    ))
}

/// One `ListObjectsV2` response.
#[derive(Debug)]
struct ListPage {
    objects: Vec<StorageObject>,
    /// Set only while the listing is truncated
    next_token: Option<String>,
}

/// Returns the token to continue with, if the listing is truncated.
fn continuation_token(is_truncated: Option<bool>, token: Option<&str>) -> Option<String> {
    match token {
        Some(token) if is_truncated == Some(true) => Some(token.to_string()),
        _ => None,
    }
}

/// Requests pages until `max_keys` objects are collected or the listing ends.
///
/// `fetch_page` receives the continuation token and the page size to ask for.
async fn collect_pages<F, Fut>(
    max_keys: usize,
    mut fetch_page: F,
) -> Result<Vec<StorageObject>, StoreError>
where
    F: FnMut(Option<String>, usize) -> Fut,
    Fut: Future<Output = Result<ListPage, StoreError>>,
{
    let mut objects = Vec::new();
    let mut continuation = None;

    while objects.len() < max_keys {
        let page_size = (max_keys - objects.len()).min(MAX_PAGE_KEYS);
        let page = fetch_page(continuation.take(), page_size).await?;
        objects.extend(page.objects);

        match page.next_token {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }
    objects.truncate(max_keys);

    Ok(objects)
}

async fn list_page(
    client: &S3Client,
    bucket: &str,
    prefix: &str,
    continuation: Option<String>,
    page_size: usize,
) -> Result<ListPage, StoreError> {
    let response = client
        .list_objects_v2()
        .bucket(bucket)
        .prefix(prefix)
        .max_keys(i32::try_from(page_size).unwrap_or(i32::MAX))
        .set_continuation_token(continuation)
        .send()
        .await
        .map_err(|e| classify_s3_error(bucket, e))?;

    Ok(ListPage {
        objects: response.contents().iter().filter_map(to_storage_object).collect(),
        next_token: continuation_token(
            response.is_truncated(),
            response.next_continuation_token(),
        ),
    })
}

/// Access-log bucket reader backed by AWS S3 (or an S3-compatible service).
///
/// # Examples
///
/// ```rust,no_run
/// use elbfetch_s3::{S3Config, S3ObjectStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = S3Config::builder().region("us-east-1").build()?;
/// let store = S3ObjectStore::new(config).await;
/// let account = store.account_id().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    sdk_config: SdkConfig,
    config: S3Config,
}

impl S3ObjectStore {
    /// Creates a store, loading credentials from the default provider chain
    /// (or the configured profile).
    pub async fn new(config: S3Config) -> Self {
        info!(region = %config.region, "Initializing S3 client");

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(profile) = &config.profile_name {
            debug!(profile = %profile, "Using shared credentials profile");
            loader = loader.profile_name(profile);
        }

        // LocalStack, MinIO, ...
        if let Some(endpoint_url) = &config.endpoint_url {
            debug!(endpoint = %endpoint_url, "Using custom S3 endpoint");
            loader = loader.endpoint_url(endpoint_url);
        }

        let sdk_config = loader.load().await;

        // Transport-level attempts within one request; failed operations
        // are never retried by the caller.
        let retry_config = aws_sdk_s3::config::retry::RetryConfig::standard()
            .with_max_attempts(config.max_retries);
        let mut s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).retry_config(retry_config);
        if config.force_path_style {
            debug!("Using path-style S3 addressing");
            s3_config_builder = s3_config_builder.force_path_style(true);
        }
        let client = S3Client::from_conf(s3_config_builder.build());

        Self {
            client,
            sdk_config,
            config,
        }
    }

    /// Returns the configuration this store was built from.
    #[must_use]
    pub const fn config(&self) -> &S3Config {
        &self.config
    }

    /// Looks up the account of the calling credentials through STS.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transfer`] if the call fails or returns no account.
    pub async fn account_id(&self) -> Result<String, StoreError> {
        let sts = aws_sdk_sts::Client::new(&self.sdk_config);
        let identity = sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| StoreError::transfer(e, false))?;

        let account = identity.account().ok_or_else(|| {
            StoreError::transfer_msg("GetCallerIdentity returned no account", false)
        })?;
        debug!(account, "Resolved caller account");
        Ok(account.to_string())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
    ) -> Result<Vec<StorageObject>, StoreError> {
        let client = &self.client;
        let objects = collect_pages(max_keys, move |continuation, page_size| {
            list_page(client, bucket, prefix, continuation, page_size)
        })
        .await?;

        debug!(prefix, objects = objects.len(), "Listed S3 objects");
        Ok(objects)
    }

    async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_s3_error(key, e))?;

        let mut body = response.body;
        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StoreError::transfer(e, true))?
        {
            sink.write_all(&chunk)
                .await
                .map_err(|e| StoreError::transfer(e, false))?;
            written += chunk.len() as u64;
        }
        sink.flush().await.map_err(|e| StoreError::transfer(e, false))?;

        Ok(written)
    }
}
