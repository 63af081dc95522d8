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

//! S3 client configuration.
//!
//! Credentials are never part of this configuration: they come from the
//! default AWS provider chain, optionally pinned to a named profile from the
//! shared credentials file.

use thiserror::Error;

/// Default SDK-level attempts per request.
///
/// The SDK retries throttling and transient network faults inside a single
/// list or fetch call. Once a call returns an error the run aborts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Errors raised while building an [`S3Config`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum S3ConfigError {
    /// A required field was not set.
    #[error("{0} is required")]
    Missing(&'static str),

    /// A field was set to an empty string.
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// The endpoint URL has no http(s) scheme.
    #[error("endpoint_url must start with http:// or https://, got {0}")]
    InvalidEndpoint(String),

    /// Zero retries leaves the SDK without a single attempt.
    #[error("max_retries must be at least 1")]
    InvalidRetries,
}

/// Configuration for [`S3ObjectStore`](crate::S3ObjectStore).
///
/// # Examples
///
/// ```rust
/// use elbfetch_s3::S3Config;
///
/// let config = S3Config::builder()
///     .region("ap-northeast-1")
///     .profile_name("default")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    /// AWS region (required).
    pub region: String,

    /// Custom endpoint URL for S3-compatible storage (e.g., MinIO, LocalStack).
    pub endpoint_url: Option<String>,

    /// Whether to use path-style addressing (default: false).
    ///
    /// Required for: LocalStack, MinIO
    pub force_path_style: bool,

    /// Shared-credentials profile to load instead of the default chain.
    pub profile_name: Option<String>,

    /// Maximum attempts per S3 request, including the first (default: 3).
    ///
    /// Attempts are made by the SDK within one call. Set to 1 to disable
    /// transport-level retries entirely.
    pub max_retries: u32,
}

impl S3Config {
    /// Creates a new builder for `S3Config`.
    #[must_use]
    pub fn builder() -> S3ConfigBuilder {
        S3ConfigBuilder::default()
    }
}

/// Builder for [`S3Config`].
#[derive(Debug, Default)]
pub struct S3ConfigBuilder {
    region: Option<String>,
    endpoint_url: Option<String>,
    force_path_style: Option<bool>,
    profile_name: Option<String>,
    max_retries: Option<u32>,
}

impl S3ConfigBuilder {
    /// Sets the AWS region (required).
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets a custom endpoint URL.
    #[must_use]
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Forces path-style addressing.
    #[must_use]
    pub const fn force_path_style(mut self, force: bool) -> Self {
        self.force_path_style = Some(force);
        self
    }

    /// Loads credentials from the named shared-credentials profile.
    #[must_use]
    pub fn profile_name(mut self, profile: impl Into<String>) -> Self {
        self.profile_name = Some(profile.into());
        self
    }

    /// Sets the maximum attempts per request.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Builds the `S3Config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the region is missing or empty, the endpoint has
    /// no http(s) scheme, the profile name is empty, or `max_retries` is zero.
    pub fn build(self) -> Result<S3Config, S3ConfigError> {
        let region = self.region.ok_or(S3ConfigError::Missing("region"))?;
        if region.is_empty() {
            return Err(S3ConfigError::Empty("region"));
        }

        if let Some(url) = &self.endpoint_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(S3ConfigError::InvalidEndpoint(url.clone()));
            }
        }

        if self.profile_name.as_deref() == Some("") {
            return Err(S3ConfigError::Empty("profile_name"));
        }

        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        if max_retries == 0 {
            return Err(S3ConfigError::InvalidRetries);
        }

        Ok(S3Config {
            region,
            endpoint_url: self.endpoint_url,
            force_path_style: self.force_path_style.unwrap_or(false),
            profile_name: self.profile_name,
            max_retries,
        })
    }
}
