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

//! Object store abstraction.
//!
//! The [`ObjectStore`] trait is the only seam between the retrieval logic and
//! the storage service. It exposes the two calls a run needs:
//!
//! - [`ObjectStore::list`]: one bounded listing under a key prefix
//! - [`ObjectStore::fetch`]: stream one object's bytes into a writer
//!
//! Both fail with a [`StoreError`] that distinguishes a missing bucket
//! ([`StoreError::NotFound`]) from everything else ([`StoreError::Transfer`]).
//!
//! The AWS implementation lives in the `elbfetch-s3` crate. This module ships
//! [`MemoryObjectStore`] for tests and local experiments.
//!
//! # Example
//!
//! ```rust
//! use elbfetch_core::store::{MemoryObjectStore, ObjectStore};
//! use chrono::{TimeZone, Utc};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryObjectStore::new().with_object(
//!     "logs",
//!     "alb/2023/01/01/obj_a_b_c_d.log.gz",
//!     Utc.with_ymd_and_hms(2023, 1, 1, 0, 10, 0).unwrap(),
//!     b"payload".to_vec(),
//! );
//!
//! let objects = store.list("logs", "alb/2023/01/01", 100).await?;
//! assert_eq!(objects.len(), 1);
//! assert_eq!(objects[0].size_bytes, 7);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Snapshot of one object returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    /// Full object key
    pub key: String,
    /// Last-modified time reported by the store
    pub last_modified: DateTime<Utc>,
    /// Object size in bytes
    pub size_bytes: u64,
}

impl StorageObject {
    /// Creates a new object snapshot.
    #[must_use]
    pub fn new(key: impl Into<String>, last_modified: DateTime<Utc>, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            last_modified,
            size_bytes,
        }
    }
}

/// Errors reported by an [`ObjectStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The named bucket (or object) does not exist.
    #[error("resource not found: {resource}: {message}")]
    NotFound {
        /// Bucket or key that was missing
        resource: String,
        /// Message reported by the store
        message: String,
    },

    /// Any other failure of a list or fetch call.
    #[error("{message}")]
    Transfer {
        /// Human-readable error message
        message: String,
        /// Whether the store considers the failure transient.
        ///
        /// Runs never retry; this is reported in logs only.
        retryable: bool,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates a transfer error from any error type.
    #[must_use]
    pub fn transfer(
        source: impl std::error::Error + Send + Sync + 'static,
        retryable: bool,
    ) -> Self {
        Self::Transfer {
            message: source.to_string(),
            retryable,
            source: Some(Box::new(source)),
        }
    }

    /// Creates a transfer error with a custom message.
    #[must_use]
    pub fn transfer_msg(message: impl Into<String>, retryable: bool) -> Self {
        Self::Transfer {
            message: message.into(),
            retryable,
            source: None,
        }
    }

    /// Returns whether the store flagged this failure as transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound { .. } => false,
            Self::Transfer { retryable, .. } => *retryable,
        }
    }
}

/// Storage backend holding access-log objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists at most `max_keys` objects under `prefix` in `bucket`.
    ///
    /// The cap is absolute: objects beyond it are never returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the bucket does not exist and
    /// [`StoreError::Transfer`] for any other failure.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
    ) -> Result<Vec<StorageObject>, StoreError>;

    /// Streams the object at `key` into `sink`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the bucket or key does not exist
    /// and [`StoreError::Transfer`] for any other failure, including errors
    /// writing to `sink`.
    async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone)]
struct MemoryObject {
    meta: StorageObject,
    body: Arc<Vec<u8>>,
}

/// In-memory object store.
///
/// Buckets exist only once an object has been added to them (or they were
/// created with [`MemoryObjectStore::with_bucket`]); listing any other bucket
/// fails with [`StoreError::NotFound`], matching S3's `NoSuchBucket`.
/// Every listed prefix is recorded for inspection.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: HashMap<String, Vec<MemoryObject>>,
    listed_prefixes: Mutex<Vec<String>>,
    fetched_keys: Mutex<Vec<String>>,
    fail_lists: bool,
    fail_fetches: bool,
}

impl MemoryObjectStore {
    /// Creates an empty store with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.entry(bucket.into()).or_default();
        self
    }

    /// Adds an object, creating its bucket if needed.
    #[must_use]
    pub fn with_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        last_modified: DateTime<Utc>,
        body: Vec<u8>,
    ) -> Self {
        self.insert_object(bucket, key, last_modified, body);
        self
    }

    /// Configures the store to fail every listing with a transfer error.
    #[must_use]
    pub const fn with_list_failures(mut self) -> Self {
        self.fail_lists = true;
        self
    }

    /// Configures the store to fail every fetch with a transfer error.
    #[must_use]
    pub const fn with_fetch_failures(mut self) -> Self {
        self.fail_fetches = true;
        self
    }

    /// Adds an object, creating its bucket if needed.
    pub fn insert_object(
        &mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        last_modified: DateTime<Utc>,
        body: Vec<u8>,
    ) {
        let meta = StorageObject::new(key, last_modified, body.len() as u64);
        let objects = self.buckets.entry(bucket.into()).or_default();
        objects.retain(|o| o.meta.key != meta.key);
        objects.push(MemoryObject {
            meta,
            body: Arc::new(body),
        });
    }

    /// Returns every prefix listed so far, in call order.
    pub async fn listed_prefixes(&self) -> Vec<String> {
        self.listed_prefixes.lock().await.clone()
    }

    /// Returns every key fetched so far, in call order.
    pub async fn fetched_keys(&self) -> Vec<String> {
        self.fetched_keys.lock().await.clone()
    }

    fn bucket(&self, bucket: &str) -> Result<&[MemoryObject], StoreError> {
        self.buckets
            .get(bucket)
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::not_found(bucket, "The specified bucket does not exist"))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
    ) -> Result<Vec<StorageObject>, StoreError> {
        self.listed_prefixes.lock().await.push(prefix.to_string());

        let objects = self.bucket(bucket)?;
        if self.fail_lists {
            return Err(StoreError::transfer_msg("Simulated listing failure", true));
        }

        let mut matching: Vec<StorageObject> = objects
            .iter()
            .filter(|o| o.meta.key.starts_with(prefix))
            .map(|o| o.meta.clone())
            .collect();
        // S3 lists keys in lexicographic order
        matching.sort_by(|a, b| a.key.cmp(&b.key));
        matching.truncate(max_keys);

        Ok(matching)
    }

    async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, StoreError> {
        self.fetched_keys.lock().await.push(key.to_string());

        let objects = self.bucket(bucket)?;
        if self.fail_fetches {
            return Err(StoreError::transfer_msg("Simulated download failure", true));
        }

        let object = objects
            .iter()
            .find(|o| o.meta.key == key)
            .ok_or_else(|| StoreError::not_found(key, "The specified key does not exist"))?;

        sink.write_all(&object.body)
            .await
            .map_err(|e| StoreError::transfer(e, false))?;
        sink.flush().await.map_err(|e| StoreError::transfer(e, false))?;

        Ok(object.body.len() as u64)
    }
}
