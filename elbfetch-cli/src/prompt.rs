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

//! Confirmation prompt shown before downloading.

use chrono::{DateTime, TimeZone, Utc};
use elbfetch_core::catalog::ObjectCatalog;
use std::fmt::{Display, Write as _};
use std::io::{self, BufRead, Write};

const BANNER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

const SI_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Answer to the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Proceed with the download
    Start,
    /// Abort the run
    Cancel,
}

/// Formats a byte count with SI units, e.g. `82 MB` or `1.5 kB`.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{bytes} B");
    }

    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < SI_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let rounded = (value * 10.0 + 0.5).floor() / 10.0;
    if rounded < 10.0 {
        format!("{rounded:.1} {}", SI_UNITS[unit])
    } else {
        format!("{rounded:.0} {}", SI_UNITS[unit])
    }
}

/// Renders the summary shown above the prompt.
///
/// Times are shown both in `local` and in UTC.
#[must_use]
pub fn render_banner<Tz>(catalog: &ObjectCatalog, decompress: bool, local: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let oldest = catalog.oldest_time().unwrap_or_default();
    let latest = catalog.latest_time().unwrap_or_default();
    let in_local = |t: DateTime<Utc>| t.with_timezone(local).format(BANNER_TIME_FORMAT).to_string();
    let in_utc = |t: DateTime<Utc>| t.format(BANNER_TIME_FORMAT).to_string();

    let mut banner = String::new();
    let _ = writeln!(
        banner,
        "From-To(Local)  : {}  -  {}",
        in_local(oldest),
        in_local(latest)
    );
    let _ = writeln!(
        banner,
        "From-To(UTC)    : {}  -  {}",
        in_utc(oldest),
        in_utc(latest)
    );
    let _ = writeln!(banner, "Download Size   : {}", format_bytes(catalog.total_bytes()));
    let _ = writeln!(banner, "Decompress Gzip : {decompress}");
    let _ = writeln!(banner, "S3 Objects      : {} objects", catalog.len());
    banner
}

/// Shows `banner` and reads answers from `input` until one is recognized.
///
/// Accepts `s`, `S`, `start`, `Start` and `c`, `C`, `cancel`, `Cancel`;
/// anything else shows the banner again. End of input counts as cancel.
///
/// # Errors
///
/// Returns any I/O error from `input` or `output`.
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    banner: &str,
) -> io::Result<Decision> {
    let mut line = String::new();
    loop {
        write!(output, "{banner}Start/Cancel>")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(Decision::Cancel);
        }

        match line.split_whitespace().next() {
            Some("s" | "S" | "start" | "Start") => return Ok(Decision::Start),
            Some("c" | "C" | "cancel" | "Cancel") => return Ok(Decision::Cancel),
            _ => {}
        }
    }
}
