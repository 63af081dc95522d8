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

//! Run configuration.
//!
//! A [`RunConfig`] is assembled once through [`RunConfigBuilder`] and is
//! immutable afterwards. `build()` performs every check up front, so the
//! catalog and pipeline never see an inconsistent combination:
//!
//! - bucket and log root are non-empty
//! - the account id is twelve digits
//! - the region looks like an AWS region (`us-east-1`, `us-gov-west-1`, ...)
//! - the key limit is positive
//! - exactly one output mode is chosen, and merged-stream output is not
//!   combined with preserved gzip
//!
//! # Example
//!
//! ```rust
//! use elbfetch_core::config::{OutputMode, RunConfig};
//! use elbfetch_core::format::LogFormat;
//! use elbfetch_core::window::TimeWindow;
//! use chrono::{Duration, Utc};
//!
//! let end = Utc::now();
//! let config = RunConfig::builder()
//!     .bucket("my-alb-logs")
//!     .log_root("prod/alb")
//!     .account_id("123456789012")
//!     .region("us-east-1")
//!     .window(TimeWindow::new(end - Duration::minutes(10), end).unwrap())
//!     .format(LogFormat::EmbeddedGzip)
//!     .output(OutputMode::files("/tmp/alb"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.max_keys(), 10240);
//! ```

use crate::error::RetrievalError;
use crate::format::LogFormat;
use crate::window::{LogLocation, TimeWindow};
use regex::Regex;

/// Default cap on keys listed per day prefix.
pub const DEFAULT_MAX_KEYS: usize = 10240;

/// AWS region grammar: `{area}[-gov|-iso..]-{direction}-{n}`.
const REGION_PATTERN: &str = r"^[a-z]{2}(-gov|-iso[a-z]?)?-[a-z]+-\d{1,2}$";

/// Where decoded objects go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// One file per destination, named from `prefix` and the object key.
    ///
    /// `prefix` is a path plus basename, e.g. `/tmp/alb` produces
    /// `/tmp/alb_10.0.0.1.log`.
    Files {
        /// Output path prefix
        prefix: String,
    },

    /// Every line of every object, sorted by request time, on one stream.
    MergedStream,
}

impl OutputMode {
    /// Creates file output under `prefix`.
    #[must_use]
    pub fn files(prefix: impl Into<String>) -> Self {
        Self::Files {
            prefix: prefix.into(),
        }
    }

    /// Resolves the `-o` / `-stdout` pair into a mode.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Validation`] unless exactly one is given.
    pub fn from_flags(output_prefix: Option<&str>, stdout: bool) -> Result<Self, RetrievalError> {
        match (output_prefix.filter(|p| !p.is_empty()), stdout) {
            (Some(prefix), false) => Ok(Self::files(prefix)),
            (None, true) => Ok(Self::MergedStream),
            (None, false) => Err(RetrievalError::validation(
                "You should set either -o or -stdout",
                Some("output"),
            )),
            (Some(_), true) => Err(RetrievalError::validation(
                "You can only set either -o or -stdout",
                Some("output"),
            )),
        }
    }

    /// Returns whether this is merged-stream output.
    #[must_use]
    pub const fn is_merged(&self) -> bool {
        matches!(self, Self::MergedStream)
    }
}

/// Validated configuration of one retrieval run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    bucket: String,
    location: LogLocation,
    window: TimeWindow,
    max_keys: usize,
    format: LogFormat,
    output: OutputMode,
}

impl RunConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Returns the bucket holding the logs.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the routing facts for prefix derivation.
    #[must_use]
    pub const fn location(&self) -> &LogLocation {
        &self.location
    }

    /// Returns the time window.
    #[must_use]
    pub const fn window(&self) -> &TimeWindow {
        &self.window
    }

    /// Returns the per-prefix listing cap.
    #[must_use]
    pub const fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Returns the log format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Returns the output mode.
    #[must_use]
    pub const fn output(&self) -> &OutputMode {
        &self.output
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    bucket: Option<String>,
    log_root: Option<String>,
    account_id: Option<String>,
    region: Option<String>,
    window: Option<TimeWindow>,
    max_keys: Option<usize>,
    format: Option<LogFormat>,
    output: Option<OutputMode>,
}

impl RunConfigBuilder {
    /// Sets the bucket (required).
    #[must_use]
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the log root prefix configured on the load balancer (required).
    #[must_use]
    pub fn log_root(mut self, root: impl Into<String>) -> Self {
        self.log_root = Some(root.into());
        self
    }

    /// Sets the account id (required).
    #[must_use]
    pub fn account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Sets the region (required).
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the time window (required).
    #[must_use]
    pub const fn window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Sets the per-prefix listing cap (default: 10240).
    #[must_use]
    pub const fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Sets the log format (default: [`LogFormat::EmbeddedGzip`]).
    #[must_use]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets the output mode (required).
    #[must_use]
    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = Some(output);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Validation`] naming the first invalid or
    /// missing parameter.
    pub fn build(self) -> Result<RunConfig, RetrievalError> {
        let bucket = required(self.bucket, "bucket")?;
        let log_root = required(self.log_root, "log_root")?;
        if log_root.trim_matches('/').is_empty() {
            return Err(RetrievalError::validation(
                "log_root cannot be empty",
                Some("log_root"),
            ));
        }

        let account_id = required(self.account_id, "account_id")?;
        if account_id.len() != 12 || !account_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RetrievalError::validation(
                format!("account_id must be 12 digits, got {account_id:?}"),
                Some("account_id"),
            ));
        }

        let region = required(self.region, "region")?;
        validate_region(&region)?;

        let window = self
            .window
            .ok_or_else(|| RetrievalError::validation("window is required", Some("window")))?;

        let max_keys = self.max_keys.unwrap_or(DEFAULT_MAX_KEYS);
        if max_keys == 0 {
            return Err(RetrievalError::validation(
                "max_keys must be greater than zero",
                Some("max_keys"),
            ));
        }

        let format = self.format.unwrap_or_default();
        let output = self
            .output
            .ok_or_else(|| RetrievalError::validation("output is required", Some("output")))?;
        if let OutputMode::Files { prefix } = &output {
            if prefix.is_empty() {
                return Err(RetrievalError::validation(
                    "output prefix cannot be empty",
                    Some("output"),
                ));
            }
        }
        if output.is_merged() && format == LogFormat::PreservedGzip {
            return Err(RetrievalError::validation(
                "need to set -o to use with -gz",
                Some("output"),
            ));
        }

        Ok(RunConfig {
            bucket,
            location: LogLocation::new(log_root, account_id, region),
            window,
            max_keys,
            format,
            output,
        })
    }
}

fn required(value: Option<String>, parameter: &str) -> Result<String, RetrievalError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(RetrievalError::validation(
            format!("{parameter} cannot be empty"),
            Some(parameter),
        )),
        None => Err(RetrievalError::validation(
            format!("{parameter} is required"),
            Some(parameter),
        )),
    }
}

/// Checks that `region` follows the AWS region naming grammar.
///
/// # Errors
///
/// Returns [`RetrievalError::Validation`] if it does not.
pub fn validate_region(region: &str) -> Result<(), RetrievalError> {
    let pattern = Regex::new(REGION_PATTERN).map_err(|e| {
        RetrievalError::validation(format!("invalid region pattern: {e}"), Some("region"))
    })?;
    if pattern.is_match(region) {
        Ok(())
    } else {
        Err(RetrievalError::validation(
            format!("Invalid Region set ({region}), expected a name like us-east-1"),
            Some("region"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 1, 1, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn builder() -> RunConfigBuilder {
        RunConfig::builder()
            .bucket("logs")
            .log_root("alb/")
            .account_id("123456789012")
            .region("ap-northeast-1")
            .window(window())
            .output(OutputMode::files("/tmp/alb"))
    }

    fn parameter_of(err: RetrievalError) -> Option<String> {
        match err {
            RetrievalError::Validation { parameter, .. } => parameter,
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_build_with_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.bucket(), "logs");
        assert_eq!(config.location().root(), "alb");
        assert_eq!(config.max_keys(), DEFAULT_MAX_KEYS);
        assert_eq!(config.format(), LogFormat::EmbeddedGzip);
        assert_eq!(config.output(), &OutputMode::files("/tmp/alb"));
    }

    #[test]
    fn test_missing_bucket() {
        let err = RunConfig::builder()
            .log_root("alb")
            .account_id("123456789012")
            .region("us-east-1")
            .window(window())
            .output(OutputMode::MergedStream)
            .build()
            .unwrap_err();
        assert_eq!(parameter_of(err).as_deref(), Some("bucket"));
    }

    #[test]
    fn test_empty_values_rejected() {
        let err = builder().bucket("").build().unwrap_err();
        assert_eq!(parameter_of(err).as_deref(), Some("bucket"));

        let err = builder().log_root("/").build().unwrap_err();
        assert_eq!(parameter_of(err).as_deref(), Some("log_root"));

        let err = builder().output(OutputMode::files("")).build().unwrap_err();
        assert_eq!(parameter_of(err).as_deref(), Some("output"));
    }

    #[test]
    fn test_account_id_must_be_twelve_digits() {
        let err = builder().account_id("12345").build().unwrap_err();
        assert_eq!(parameter_of(err).as_deref(), Some("account_id"));

        let err = builder().account_id("12345678901a").build().unwrap_err();
        assert_eq!(parameter_of(err).as_deref(), Some("account_id"));
    }

    #[test]
    fn test_region_validation() {
        for ok in ["us-east-1", "eu-central-2", "us-gov-west-1", "ap-southeast-4"] {
            assert!(validate_region(ok).is_ok(), "{ok}");
        }
        for bad in ["", "useast1", "us-east", "US-EAST-1", "mars-north-1"] {
            assert!(validate_region(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_zero_max_keys_rejected() {
        let err = builder().max_keys(0).build().unwrap_err();
        assert_eq!(parameter_of(err).as_deref(), Some("max_keys"));
    }

    #[test]
    fn test_merged_stream_rejects_preserved_gzip() {
        let err = builder()
            .output(OutputMode::MergedStream)
            .format(LogFormat::PreservedGzip)
            .build()
            .unwrap_err();
        assert_eq!(parameter_of(err).as_deref(), Some("output"));

        assert!(builder()
            .output(OutputMode::MergedStream)
            .format(LogFormat::AlternateText)
            .build()
            .is_ok());
    }

    #[test]
    fn test_output_mode_from_flags() {
        assert_eq!(
            OutputMode::from_flags(Some("/tmp/x"), false).unwrap(),
            OutputMode::files("/tmp/x")
        );
        assert_eq!(
            OutputMode::from_flags(None, true).unwrap(),
            OutputMode::MergedStream
        );
        assert!(OutputMode::from_flags(None, false).is_err());
        assert!(OutputMode::from_flags(Some(""), false).is_err());
        assert!(OutputMode::from_flags(Some("/tmp/x"), true).is_err());
    }
}
