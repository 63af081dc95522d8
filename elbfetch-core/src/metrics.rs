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

//! Metrics instrumentation for retrieval runs.
//!
//! Recorded through the `metrics` facade, so any exporter (Prometheus,
//! StatsD, ...) can be installed by the embedding application. Without a
//! recorder every call is a no-op.
//!
//! # Naming Conventions
//!
//! - Prefixed with `elbfetch_`
//! - Unit suffix (`_bytes`, `_seconds`) on histograms
//! - Counters end with `_total`
//!
//! Labels are limited to low-cardinality values: the log format and an
//! [`ErrorCategory`]. Object keys and prefixes are never used as labels.
//!
//! # Example
//!
//! ```rust
//! use elbfetch_core::metrics;
//!
//! metrics::init_metrics();
//! metrics::increment_prefixes_listed(2);
//! metrics::record_object_download_bytes(1024);
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Metric name prefix for all elbfetch metrics.
#[doc(hidden)]
pub const METRIC_PREFIX: &str = "elbfetch";

/// Total number of day prefixes listed.
///
/// Type: Counter
#[doc(hidden)]
pub const PREFIXES_LISTED_TOTAL: &str = "elbfetch_prefixes_listed_total";

/// Total number of objects that survived the time-window filter.
///
/// Type: Counter
#[doc(hidden)]
pub const OBJECTS_SELECTED_TOTAL: &str = "elbfetch_objects_selected_total";

/// Total number of objects fully retrieved.
///
/// Type: Counter
/// Labels: format
#[doc(hidden)]
pub const OBJECTS_RETRIEVED_TOTAL: &str = "elbfetch_objects_retrieved_total";

/// Total number of log lines emitted in merged-stream mode.
///
/// Type: Counter
const ENTRIES_EMITTED_TOTAL: &str = "elbfetch_entries_emitted_total";

/// Total number of run-aborting errors.
///
/// Type: Counter
/// Labels: error_type
const ERRORS_TOTAL: &str = "elbfetch_errors_total";

/// Bytes downloaded per object.
///
/// Type: Histogram
/// Unit: bytes
#[doc(hidden)]
pub const OBJECT_DOWNLOAD_BYTES: &str = "elbfetch_object_download_bytes";

/// Decoded bytes written per object.
///
/// Type: Histogram
/// Unit: bytes
const OBJECT_WRITTEN_BYTES: &str = "elbfetch_object_written_bytes";

/// Time taken to download, decode and route one object.
///
/// Type: Histogram
/// Labels: format
/// Unit: seconds
#[doc(hidden)]
pub const OBJECT_DURATION_SECONDS: &str = "elbfetch_object_duration_seconds";

/// Initializes metric descriptions.
///
/// Call once at startup, before recording.
pub fn init_metrics() {
    describe_counter!(PREFIXES_LISTED_TOTAL, "Total number of day prefixes listed");
    describe_counter!(
        OBJECTS_SELECTED_TOTAL,
        "Total number of objects inside the requested time window"
    );
    describe_counter!(
        OBJECTS_RETRIEVED_TOTAL,
        "Total number of objects downloaded, decoded and written"
    );
    describe_counter!(
        ENTRIES_EMITTED_TOTAL,
        "Total number of log lines emitted on the merged stream"
    );
    describe_counter!(ERRORS_TOTAL, "Total number of errors that aborted a run");

    describe_histogram!(
        OBJECT_DOWNLOAD_BYTES,
        metrics::Unit::Bytes,
        "Size of each downloaded object"
    );
    describe_histogram!(
        OBJECT_WRITTEN_BYTES,
        metrics::Unit::Bytes,
        "Decoded bytes written for each object"
    );
    describe_histogram!(
        OBJECT_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time taken to retrieve one object end to end"
    );
}

/// Increments the number of listed prefixes.
pub fn increment_prefixes_listed(count: usize) {
    counter!(PREFIXES_LISTED_TOTAL).increment(count as u64);
}

/// Increments the number of selected objects.
pub fn increment_objects_selected(count: usize) {
    counter!(OBJECTS_SELECTED_TOTAL).increment(count as u64);
}

/// Increments the number of retrieved objects for a log format.
///
/// # Examples
///
/// ```rust
/// use elbfetch_core::metrics;
///
/// metrics::increment_objects_retrieved("alb");
/// ```
pub fn increment_objects_retrieved(format: &'static str) {
    counter!(OBJECTS_RETRIEVED_TOTAL, "format" => format).increment(1);
}

/// Increments the number of lines emitted on the merged stream.
pub fn increment_entries_emitted(count: usize) {
    counter!(ENTRIES_EMITTED_TOTAL).increment(count as u64);
}

/// Increments the error counter.
///
/// # Examples
///
/// ```rust
/// use elbfetch_core::metrics::{self, ErrorCategory};
///
/// metrics::increment_errors(ErrorCategory::Transfer);
/// ```
pub fn increment_errors(category: ErrorCategory) {
    counter!(ERRORS_TOTAL, "error_type" => category.as_str()).increment(1);
}

/// Records the size of one downloaded object.
pub fn record_object_download_bytes(bytes: u64) {
    histogram!(OBJECT_DOWNLOAD_BYTES).record(bytes as f64);
}

/// Records the decoded bytes written for one object.
pub fn record_object_written_bytes(bytes: u64) {
    histogram!(OBJECT_WRITTEN_BYTES).record(bytes as f64);
}

/// Records the end-to-end duration of one object.
pub fn record_object_duration(duration: Duration, format: &str) {
    histogram!(OBJECT_DURATION_SECONDS, "format" => format.to_string())
        .record(duration.as_secs_f64());
}

/// Error categories for metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration rejected before any call
    Validation,
    /// Bucket missing
    NotFound,
    /// List or fetch failure
    Transfer,
    /// Decompression or line parsing failure
    Decode,
    /// Destination write failure
    Write,
    /// Nothing selected
    EmptySelection,
}

impl ErrorCategory {
    /// Returns the category as a static string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::NotFound => "not_found_error",
            Self::Transfer => "transfer_error",
            Self::Decode => "decode_error",
            Self::Write => "write_error",
            Self::EmptySelection => "empty_selection",
        }
    }
}

/// Records the elapsed time through a callback when dropped.
///
/// # Examples
///
/// ```rust
/// use elbfetch_core::metrics::{self, Timer};
///
/// {
///     let _timer = Timer::new("alb", |duration, format| {
///         metrics::record_object_duration(duration, format);
///     });
///     // ... retrieve one object ...
/// }
/// ```
pub struct Timer<F>
where
    F: FnOnce(Duration, &str),
{
    start: std::time::Instant,
    label: String,
    record_fn: Option<F>,
}

impl<F> Timer<F>
where
    F: FnOnce(Duration, &str),
{
    /// Starts a timer.
    pub fn new(label: impl Into<String>, record_fn: F) -> Self {
        Self {
            start: std::time::Instant::now(),
            label: label.into(),
            record_fn: Some(record_fn),
        }
    }
}

impl<F> Drop for Timer<F>
where
    F: FnOnce(Duration, &str),
{
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        if let Some(record_fn) = self.record_fn.take() {
            record_fn(duration, &self.label);
        }
    }
}
