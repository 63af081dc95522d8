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

//! Integration tests for the S3 object store using LocalStack.
//!
//! These tests require LocalStack to be running:
//!
//! ```bash
//! docker run -d -p 4566:4566 localstack/localstack
//! ```
//!
//! Then run the tests with dummy credentials:
//!
//! ```bash
//! AWS_ACCESS_KEY_ID=test AWS_SECRET_ACCESS_KEY=test \
//!     cargo test --package elbfetch-s3 --test s3_integration_test -- --ignored
//! ```

use aws_sdk_s3::primitives::ByteStream;
use elbfetch_core::store::{ObjectStore, StoreError};
use elbfetch_s3::{S3Config, S3ObjectStore};
use std::env;

const PREFIX: &str = "alb/AWSLogs/123456789012/elasticloadbalancing/us-east-1/2023/01/01";

/// Helper to check if LocalStack is available
fn is_localstack_available() -> bool {
    env::var("LOCALSTACK_ENDPOINT").is_ok() || env::var("CI").is_err()
}

/// Helper to get LocalStack endpoint
fn get_localstack_endpoint() -> String {
    env::var("LOCALSTACK_ENDPOINT").unwrap_or_else(|_| "http://localhost:4566".to_string())
}

async fn store() -> S3ObjectStore {
    let config = S3Config::builder()
        .region("us-east-1")
        .endpoint_url(get_localstack_endpoint())
        .force_path_style(true) // Required for LocalStack
        .build()
        .expect("Failed to build config");

    S3ObjectStore::new(config).await
}

/// Raw client for fixture setup.
async fn admin_client() -> aws_sdk_s3::Client {
    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new("us-east-1"))
        .endpoint_url(get_localstack_endpoint())
        .load()
        .await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}

/// Creates a fresh bucket holding `count` objects under [`PREFIX`].
async fn seeded_bucket(client: &aws_sdk_s3::Client, count: usize) -> String {
    let bucket = format!("elbfetch-it-{}", chrono::Utc::now().timestamp_micros());
    client
        .create_bucket()
        .bucket(&bucket)
        .send()
        .await
        .expect("Failed to create bucket");

    for i in 0..count {
        client
            .put_object()
            .bucket(&bucket)
            .key(format!("{PREFIX}/object-{i:05}.log"))
            .body(ByteStream::from(format!("line {i}\n").into_bytes()))
            .send()
            .await
            .expect("Failed to put object");
    }
    bucket
}

#[tokio::test]
#[ignore] // Requires LocalStack running
async fn test_s3_list_follows_continuation_tokens() {
    if !is_localstack_available() {
        eprintln!("Skipping test: LocalStack not available");
        return;
    }

    let bucket = seeded_bucket(&admin_client().await, 1005).await;
    let store = store().await;

    let all = store.list(&bucket, PREFIX, 10240).await.expect("Failed to list");
    assert_eq!(all.len(), 1005);
    assert_eq!(all[1004].key, format!("{PREFIX}/object-01004.log"));

    // Cap falls inside the second page
    let capped = store.list(&bucket, PREFIX, 1003).await.expect("Failed to list");
    assert_eq!(capped.len(), 1003);
}

#[tokio::test]
#[ignore] // Requires LocalStack running
async fn test_s3_missing_bucket_is_not_found() {
    if !is_localstack_available() {
        return;
    }

    let store = store().await;
    let err = store
        .list("elbfetch-it-does-not-exist", PREFIX, 10)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
#[ignore] // Requires LocalStack running
async fn test_s3_fetch_streams_body() {
    if !is_localstack_available() {
        return;
    }

    let bucket = seeded_bucket(&admin_client().await, 1).await;
    let store = store().await;

    let mut sink: Vec<u8> = Vec::new();
    let written = store
        .fetch(&bucket, &format!("{PREFIX}/object-00000.log"), &mut sink)
        .await
        .expect("Failed to fetch");

    assert_eq!(written, 7);
    assert_eq!(sink, b"line 0\n");
}
