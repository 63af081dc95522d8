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

//! Access-log formats and object key grammar.
//!
//! A [`LogFormat`] decides two things for every downloaded object: how its
//! bytes are decoded, and which local file they are routed to.
//!
//! | Format | Decode | Destination | Open mode |
//! |---|---|---|---|
//! | [`LogFormat::EmbeddedGzip`] (ALB) | gunzip | `{prefix}_{address}.log` | append |
//! | [`LogFormat::PreservedGzip`] (ALB, `--gz`) | none | `{prefix}_{suffix}` | truncate |
//! | [`LogFormat::AlternateText`] (classic ELB) | none | `{prefix}_{address}.log` | append |
//!
//! Address-keyed destinations accumulate one running log per load-balancer
//! node. Preserved gzip objects map one-to-one onto files, since appending
//! gzip members would interleave compressed streams.
//!
//! # Key grammar
//!
//! Log objects are named
//!
//! ```text
//! {account}_elasticloadbalancing_{region}_{load-balancer}_{yyyymmddThhmmZ}_{address}_{tail}
//! ```
//!
//! where `tail` is a random string plus `.log.gz` (ALB) or `.log` (ELB).
//! [`LogObjectKey`] reads the last four `_`-separated tokens of the file name.

use crate::error::RetrievalError;
use flate2::bufread::MultiGzDecoder;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Gzip member magic bytes (RFC 1952).
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Log format of the objects being retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Application Load Balancer logs, gunzipped on retrieval.
    #[default]
    EmbeddedGzip,

    /// Application Load Balancer logs, kept gzip-compressed.
    PreservedGzip,

    /// Classic Load Balancer logs, stored as plain text.
    AlternateText,
}

impl LogFormat {
    /// Selects a format from the `--elb` and `--gz` switches.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Validation`] when both switches are set.
    pub fn from_flags(elb: bool, preserve_gzip: bool) -> Result<Self, RetrievalError> {
        match (elb, preserve_gzip) {
            (true, true) => Err(RetrievalError::validation(
                "-elb can't use with -gz",
                Some("format"),
            )),
            (true, false) => Ok(Self::AlternateText),
            (false, true) => Ok(Self::PreservedGzip),
            (false, false) => Ok(Self::EmbeddedGzip),
        }
    }

    /// Returns a short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EmbeddedGzip => "alb",
            Self::PreservedGzip => "alb-gzip",
            Self::AlternateText => "elb",
        }
    }

    /// Returns whether retrieval decompresses the objects.
    #[must_use]
    pub const fn decompresses(&self) -> bool {
        matches!(self, Self::EmbeddedGzip)
    }

    /// Returns whether destination files are appended to rather than truncated.
    #[must_use]
    pub const fn appends(&self) -> bool {
        !matches!(self, Self::PreservedGzip)
    }

    /// Returns the whitespace-separated field holding the request timestamp.
    #[must_use]
    pub const fn timestamp_field(&self) -> usize {
        match self {
            Self::EmbeddedGzip | Self::PreservedGzip => 1,
            Self::AlternateText => 0,
        }
    }

    /// Opens a decoded stream over a downloaded scratch file.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Decode`] if the file cannot be read or, for
    /// [`LogFormat::EmbeddedGzip`], does not start with a gzip header.
    pub fn decode(
        &self,
        scratch: &Path,
        key: &str,
    ) -> Result<Box<dyn Read + Send>, RetrievalError> {
        let file = File::open(scratch).map_err(|e| RetrievalError::Decode {
            key: key.to_string(),
            message: format!("failed to read tmpfile {}", scratch.display()),
            source: Some(e),
        })?;
        let mut reader = BufReader::new(file);

        match self {
            Self::EmbeddedGzip => {
                let head = reader.fill_buf().map_err(|e| RetrievalError::Decode {
                    key: key.to_string(),
                    message: "failed to extract gzip".to_string(),
                    source: Some(e),
                })?;
                if !head.is_empty() && !head.starts_with(&GZIP_MAGIC) {
                    return Err(RetrievalError::Decode {
                        key: key.to_string(),
                        message: "failed to extract gzip, if downloading elb logs, use -elb option"
                            .to_string(),
                        source: None,
                    });
                }
                Ok(Box::new(MultiGzDecoder::new(reader)))
            }
            Self::PreservedGzip | Self::AlternateText => Ok(Box::new(reader)),
        }
    }

    /// Returns the destination path for `key` under `output_prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidKey`] if the key does not follow the
    /// log key grammar.
    pub fn destination_for(
        &self,
        output_prefix: &str,
        key: &str,
    ) -> Result<PathBuf, RetrievalError> {
        let parsed = LogObjectKey::parse(key)?;
        let path = match self {
            Self::EmbeddedGzip | Self::AlternateText => {
                format!("{}_{}.log", output_prefix, parsed.address())
            }
            Self::PreservedGzip => format!("{}_{}", output_prefix, parsed.suffix()),
        };
        Ok(PathBuf::from(path))
    }

    /// Opens a destination file with this format's append/truncate discipline.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Write`] if the file cannot be opened.
    pub fn open_destination(&self, path: &Path) -> Result<File, RetrievalError> {
        let mut options = OpenOptions::new();
        options.create(true).write(true);
        if self.appends() {
            options.append(true);
        } else {
            options.truncate(true);
        }
        options
            .open(path)
            .map_err(|e| RetrievalError::write(path, e))
    }
}

/// Structured view of an access-log object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogObjectKey<'a> {
    load_balancer: &'a str,
    interval: &'a str,
    address: &'a str,
    tail: &'a str,
}

impl<'a> LogObjectKey<'a> {
    /// Parses the file-name segment of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidKey`] if the file name has fewer than
    /// four `_`-separated tokens or any of them is empty.
    pub fn parse(key: &'a str) -> Result<Self, RetrievalError> {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        let mut tokens = file_name.rsplitn(5, '_');

        let mut next = |what: &str| {
            tokens
                .next()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| RetrievalError::InvalidKey {
                    key: key.to_string(),
                    reason: format!("missing {what} token"),
                })
        };

        let tail = next("tail")?;
        let address = next("address")?;
        let interval = next("interval")?;
        let load_balancer = next("load balancer")?;

        Ok(Self {
            load_balancer,
            interval,
            address,
            tail,
        })
    }

    /// Returns the load-balancer name token.
    #[must_use]
    pub const fn load_balancer(&self) -> &'a str {
        self.load_balancer
    }

    /// Returns the `yyyymmddThhmmZ` delivery interval token.
    #[must_use]
    pub const fn interval(&self) -> &'a str {
        self.interval
    }

    /// Returns the load-balancer node address (second-to-last token).
    #[must_use]
    pub const fn address(&self) -> &'a str {
        self.address
    }

    /// Returns the last token, random string plus extension.
    #[must_use]
    pub const fn tail(&self) -> &'a str {
        self.tail
    }

    /// Returns the last four tokens joined by `_`, unique per object.
    #[must_use]
    pub fn suffix(&self) -> String {
        [self.load_balancer, self.interval, self.address, self.tail].join("_")
    }
}
