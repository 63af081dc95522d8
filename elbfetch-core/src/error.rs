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

//! Error taxonomy for a retrieval run.
//!
//! Every failure below the run boundary is wrapped into a [`RetrievalError`]
//! carrying the operation, object key or path involved. Nothing is retried:
//! the first error aborts the run, and files already written by earlier
//! objects are left in place.
//!
//! | Variant | Raised when |
//! |---|---|
//! | [`RetrievalError::Validation`] | configuration rejected before any network call |
//! | [`RetrievalError::NotFound`] | the bucket does not exist |
//! | [`RetrievalError::Transfer`] | a list or fetch call failed for any other reason |
//! | [`RetrievalError::Decode`] | gzip framing absent or corrupt |
//! | [`RetrievalError::Write`] | a destination could not be opened or written |
//! | [`RetrievalError::EmptySelection`] | the filtered catalog is empty |
//! | [`RetrievalError::InvalidKey`] | an object key does not follow the log key grammar |
//! | [`RetrievalError::MalformedEntry`] | a merged-stream line has no parsable timestamp |

use crate::metrics::ErrorCategory;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a retrieval run.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Invalid run configuration.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message
        message: String,
        /// Offending parameter, if applicable
        parameter: Option<String>,
    },

    /// The named storage container does not exist.
    #[error("s3 bucket not found: {bucket}: {message}")]
    NotFound {
        /// Bucket name
        bucket: String,
        /// Message reported by the store
        message: String,
    },

    /// A listing or fetch call failed.
    #[error("failed to {operation} {target}: {source}")]
    Transfer {
        /// Operation name ("list" or "download")
        operation: &'static str,
        /// Prefix or key the operation was issued for
        target: String,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// The downloaded object could not be decoded.
    #[error("failed to decode {key}: {message}")]
    Decode {
        /// Object key
        key: String,
        /// Human-readable error message, including remediation hints
        message: String,
        /// Underlying I/O error
        #[source]
        source: Option<std::io::Error>,
    },

    /// A destination file could not be opened or written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Destination path, or `<stdout>` for the merged stream
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No object survived the time-window filter.
    #[error("No S3 objects selected, maybe invalid values in parameters")]
    EmptySelection,

    /// An object key does not follow the access-log key grammar.
    #[error("unexpected object key {key}: {reason}")]
    InvalidKey {
        /// Object key
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// A decoded log line has no parsable request timestamp.
    #[error("failed to parse line {line_number} of {key}: {reason}")]
    MalformedEntry {
        /// Object key the line came from
        key: String,
        /// 1-based line number within the decoded object
        line_number: usize,
        /// Parse failure description
        reason: String,
    },
}

impl RetrievalError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>, parameter: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            parameter: parameter.map(str::to_string),
        }
    }

    /// Wraps a store error raised while listing `prefix`.
    ///
    /// A missing bucket is surfaced as [`RetrievalError::NotFound`]; anything
    /// else becomes a [`RetrievalError::Transfer`].
    #[must_use]
    pub fn listing(bucket: &str, prefix: &str, source: StoreError) -> Self {
        match source {
            StoreError::NotFound { message, .. } => Self::NotFound {
                bucket: bucket.to_string(),
                message,
            },
            other => Self::Transfer {
                operation: "list",
                target: prefix.to_string(),
                source: other,
            },
        }
    }

    /// Wraps a store error raised while downloading `key`.
    #[must_use]
    pub fn download(key: &str, source: StoreError) -> Self {
        Self::Transfer {
            operation: "download",
            target: key.to_string(),
            source,
        }
    }

    /// Creates a write error for `path`.
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Returns whether this is the "nothing selected" outcome rather than a fault.
    #[must_use]
    pub const fn is_empty_selection(&self) -> bool {
        matches!(self, Self::EmptySelection)
    }

    /// Returns the metrics label category for this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } | Self::InvalidKey { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Transfer { .. } => ErrorCategory::Transfer,
            Self::Decode { .. } | Self::MalformedEntry { .. } => ErrorCategory::Decode,
            Self::Write { .. } => ErrorCategory::Write,
            Self::EmptySelection => ErrorCategory::EmptySelection,
        }
    }
}
