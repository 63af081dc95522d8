//! Elbfetch S3 - AWS backend for access-log retrieval
//!
//! Implements [`elbfetch_core::store::ObjectStore`] on the AWS SDK for Rust.
//! Works with AWS S3 and S3-compatible services (MinIO, LocalStack).
//!
//! # Features
//!
//! - **Paginated listing**: follows `ListObjectsV2` continuation tokens up to
//!   the caller's key limit
//! - **Streaming downloads**: object bodies are written to the caller's sink
//!   chunk by chunk
//! - **Error classification**: `NoSuchBucket` and `NoSuchKey` become
//!   [`StoreError::NotFound`](elbfetch_core::store::StoreError::NotFound)
//! - **Account lookup**: STS `GetCallerIdentity` for the log key layout
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use elbfetch_core::store::ObjectStore;
//! use elbfetch_s3::{S3Config, S3ObjectStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = S3Config::builder()
//!         .region("us-east-1")
//!         .build()?;
//!
//!     let store = S3ObjectStore::new(config).await;
//!     let objects = store.list("my-alb-logs", "prod/AWSLogs/", 100).await?;
//!     println!("{} objects", objects.len());
//!     Ok(())
//! }
//! ```

pub mod config;
mod store;

pub use config::{S3Config, S3ConfigBuilder, S3ConfigError};
pub use store::{classify_code, classify_s3_error, ErrorClass, S3ObjectStore, MAX_PAGE_KEYS};
