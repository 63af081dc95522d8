//! Elbfetch Core - time-windowed retrieval of load-balancer access logs
//!
//! This crate selects the access-log objects a load balancer delivered to
//! object storage during a time window and materializes their contents
//! locally, either as one file per source or as a single chronologically
//! merged stream.
//!
//! # Key Components
//!
//! - **Windows and prefixes**: [`window`] derives one listing prefix per UTC day
//! - **Storage**: [`store`] defines the [`ObjectStore`](store::ObjectStore) seam
//!   and an in-memory implementation
//! - **Catalog**: [`catalog`] lists, filters and orders candidate objects
//! - **Formats**: [`format`] decodes objects and names their destinations
//! - **Pipeline**: [`pipeline`] downloads, decodes and routes each object
//! - **Configuration**: [`config`] validates a run up front
//!
//! The AWS backend lives in `elbfetch-s3`; the command-line tool in `elbfetch-cli`.
//!
//! # Example
//!
//! ```rust
//! use elbfetch_core::window::{LogLocation, TimeWindow};
//! use chrono::{TimeZone, Utc};
//!
//! let location = LogLocation::new("prod/alb", "123456789012", "us-east-1");
//! let window = TimeWindow::new(
//!     Utc.with_ymd_and_hms(2023, 1, 1, 23, 30, 0).unwrap(),
//!     Utc.with_ymd_and_hms(2023, 1, 2, 0, 30, 0).unwrap(),
//! )
//! .unwrap();
//!
//! let prefixes = location.prefixes(&window);
//! assert_eq!(prefixes.len(), 2);
//! ```

pub mod catalog;
pub mod config;
pub mod entry;
pub mod error;
pub mod format;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod window;

pub use catalog::ObjectCatalog;
pub use config::{OutputMode, RunConfig};
pub use error::RetrievalError;
pub use format::LogFormat;
pub use pipeline::{RetrievalPipeline, RetrievalSummary};
pub use store::{ObjectStore, StorageObject, StoreError};
pub use window::TimeWindow;
