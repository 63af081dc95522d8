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

//! One invocation: validate, select, confirm, retrieve.

use crate::prompt::{self, Decision};
use crate::time::WindowInput;
use crate::Cli;
use anyhow::{anyhow, Context, Result};
use chrono::Local;
use elbfetch_core::catalog::ObjectCatalog;
use elbfetch_core::config::{validate_region, OutputMode, RunConfig};
use elbfetch_core::format::LogFormat;
use elbfetch_core::pipeline::{self, RetrievalSummary};
use elbfetch_core::window::TimeWindow;
use elbfetch_s3::{S3Config, S3ObjectStore};
use std::io::{self, BufWriter};
use tracing::{debug, info};

/// Profile loaded by `--cred`.
const DEFAULT_PROFILE: &str = "default";

/// How an invocation ended without error.
#[derive(Debug)]
pub enum Outcome {
    /// Every selected object was retrieved
    Completed(RetrievalSummary),
    /// The user answered cancel at the prompt
    Canceled,
}

/// Flag checks that need no network access.
#[derive(Debug)]
pub struct Resolved {
    /// Selected log format
    pub format: LogFormat,
    /// Files or merged stream
    pub output: OutputMode,
    /// Time window
    pub window: TimeWindow,
    /// Validated region
    pub region: String,
}

/// Validates the flags in the order the tool reports problems.
///
/// # Errors
///
/// Returns the first invalid flag combination or value.
pub fn resolve(cli: &Cli) -> Result<Resolved> {
    let output = OutputMode::from_flags(cli.output.as_deref(), cli.stdout)?;
    let format = LogFormat::from_flags(cli.elb, cli.gz)?;

    let window = WindowInput {
        start: cli.start.as_deref(),
        end: cli.end.as_deref(),
        duration: cli.duration,
    }
    .resolve_now(cli.utc)?;

    let region = cli
        .region
        .clone()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| anyhow!("No AWS region set, use -r option or os variable AWS_REGION"))?;
    validate_region(&region)?;

    Ok(Resolved {
        format,
        output,
        window,
        region,
    })
}

/// Runs the tool.
///
/// # Errors
///
/// Returns any validation, listing, retrieval or terminal I/O failure.
/// An empty selection is reported as
/// [`RetrievalError::EmptySelection`](elbfetch_core::RetrievalError::EmptySelection).
pub async fn execute(cli: Cli) -> Result<Outcome> {
    let resolved = resolve(&cli)?;
    debug!(
        start = %resolved.window.start(),
        end = %resolved.window.end(),
        format = resolved.format.as_str(),
        "Resolved parameters"
    );

    let mut s3_config = S3Config::builder()
        .region(resolved.region.clone())
        .force_path_style(cli.path_style);
    if cli.cred {
        s3_config = s3_config.profile_name(DEFAULT_PROFILE);
    }
    if let Some(url) = &cli.endpoint_url {
        s3_config = s3_config.endpoint_url(url.clone());
    }
    let store = S3ObjectStore::new(s3_config.build()?).await;

    let account_id = match &cli.account_id {
        Some(id) => id.clone(),
        None => store
            .account_id()
            .await
            .context("failed to look up AWS account id")?,
    };

    let config = RunConfig::builder()
        .bucket(cli.bucket.clone())
        .log_root(cli.prefix.clone())
        .account_id(account_id)
        .region(resolved.region)
        .window(resolved.window)
        .max_keys(cli.max_keys)
        .format(resolved.format)
        .output(resolved.output)
        .build()?;

    let catalog = ObjectCatalog::select(&store, &config).await?;

    if !cli.is_forced() {
        let banner = prompt::render_banner(&catalog, config.format().decompresses(), &Local);
        let decision = prompt::confirm(&mut io::stdin().lock(), &mut io::stdout(), &banner)
            .context("failed to read confirmation")?;
        if decision == Decision::Cancel {
            println!("canceled.");
            return Ok(Outcome::Canceled);
        }
    }

    let mut sink = BufWriter::new(io::stdout());
    let summary = pipeline::retrieve(&store, &config, &catalog, &mut sink).await?;

    info!(
        objects = summary.objects,
        destinations = summary.destinations.len(),
        entries = summary.entries_emitted,
        "Download completed"
    );
    if !config.output().is_merged() {
        eprintln!("Download Completed.");
    }
    Ok(Outcome::Completed(summary))
}
